//! Minimal dependency-injection container.
//!
//! A [`ServiceCollection`] is filled at startup and frozen into a
//! [`ServiceProvider`]. Singletons live as long as the provider. Scoped
//! services are instantiated at most once per [`ServiceScope`] and handed
//! their release hook when the scope is released.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&ServiceProvider) -> Instance + Send + Sync>;
type ReleaseHook = Arc<dyn Fn(&Instance) + Send + Sync>;

#[derive(Clone)]
struct ScopedRegistration {
    name: &'static str,
    factory: Factory,
    release: Option<ReleaseHook>,
}

/// Builder for a [`ServiceProvider`].
#[derive(Default)]
pub struct ServiceCollection {
    singletons: HashMap<TypeId, Instance>,
    scoped: HashMap<TypeId, ScopedRegistration>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a value shared by every scope.
    pub fn add_singleton<T>(mut self, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        self.singletons.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// Registers a service created once per scope.
    pub fn add_scoped<T, F>(mut self, factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> T + Send + Sync + 'static,
    {
        self.scoped.insert(
            TypeId::of::<T>(),
            ScopedRegistration {
                name: type_name::<T>(),
                factory: Arc::new(move |provider| Arc::new(factory(provider)) as Instance),
                release: None,
            },
        );
        self
    }

    /// Registers a scoped service with a hook run when its scope is released.
    pub fn add_scoped_with_release<T, F, R>(mut self, factory: F, release: R) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> T + Send + Sync + 'static,
        R: Fn(&T) + Send + Sync + 'static,
    {
        self.scoped.insert(
            TypeId::of::<T>(),
            ScopedRegistration {
                name: type_name::<T>(),
                factory: Arc::new(move |provider| Arc::new(factory(provider)) as Instance),
                release: Some(Arc::new(move |instance: &Instance| {
                    if let Some(value) = instance.downcast_ref::<T>() {
                        release(value);
                    }
                })),
            },
        );
        self
    }

    /// Freezes the collection.
    pub fn build(self) -> ServiceProvider {
        ServiceProvider {
            inner: Arc::new(ProviderInner {
                singletons: self.singletons,
                scoped: self.scoped,
                scopes_created: AtomicUsize::new(0),
            }),
        }
    }
}

struct ProviderInner {
    singletons: HashMap<TypeId, Instance>,
    scoped: HashMap<TypeId, ScopedRegistration>,
    scopes_created: AtomicUsize,
}

/// Root service provider. Cheap to clone.
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

impl ServiceProvider {
    /// A provider with nothing registered.
    pub fn empty() -> Self {
        ServiceCollection::new().build()
    }

    /// Resolves a singleton.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.inner
            .singletons
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    /// True if `T` is registered as a scoped service.
    pub fn has_scoped<T: 'static>(&self) -> bool {
        self.inner.scoped.contains_key(&TypeId::of::<T>())
    }

    /// Creates a new scope.
    pub fn create_scope(&self) -> ServiceScope {
        let n = self.inner.scopes_created.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(scope = n, "Service scope created");
        ServiceScope {
            root: self.clone(),
            instances: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        }
    }

    /// Number of scopes created from this provider so far.
    pub fn scopes_created(&self) -> usize {
        self.inner.scopes_created.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("singletons", &self.inner.singletons.len())
            .field("scoped", &self.inner.scoped.len())
            .field("scopes_created", &self.scopes_created())
            .finish()
    }
}

/// A request-lifetime set of scoped service instances.
pub struct ServiceScope {
    root: ServiceProvider,
    // Creation order is kept so release runs newest first.
    instances: Mutex<Vec<(TypeId, Instance)>>,
    released: AtomicBool,
}

impl ServiceScope {
    /// Resolves a scoped service (instantiating it on first use) or a singleton.
    ///
    /// Returns `None` once the scope has been released.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        if self.is_released() {
            return None;
        }

        let type_id = TypeId::of::<T>();
        let Some(registration) = self.root.inner.scoped.get(&type_id) else {
            return self.root.get::<T>();
        };

        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((_, instance)) = instances.iter().find(|(id, _)| *id == type_id) {
            return instance.clone().downcast::<T>().ok();
        }

        debug!(service = registration.name, "Instantiating scoped service");
        let instance = (registration.factory)(&self.root);
        instances.push((type_id, instance.clone()));
        instance.downcast::<T>().ok()
    }

    /// The root provider this scope was created from.
    pub fn root(&self) -> &ServiceProvider {
        &self.root
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Releases every scoped instance. Only the first call has an effect;
    /// it returns `true`, later calls return `false`.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }

        let instances = std::mem::take(&mut *self.instances.lock().unwrap_or_else(|e| e.into_inner()));
        for (type_id, instance) in instances.iter().rev() {
            if let Some(hook) = self
                .root
                .inner
                .scoped
                .get(type_id)
                .and_then(|registration| registration.release.as_ref())
            {
                hook(instance);
            }
        }
        debug!(released = instances.len(), "Service scope released");
        true
    }
}

impl Drop for ServiceScope {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceScope")
            .field("released", &self.is_released())
            .finish_non_exhaustive()
    }
}
