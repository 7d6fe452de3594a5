//! Service scope lifecycle tests.
//!
//! A scope is created only when a body asks for a service and is released
//! exactly once however the body ends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use commands_next::error::ErrorKind;
use commands_next::platform::MockPlatform;
use commands_next::services::{ServiceCollection, ServiceProvider};
use commands_next::{ArgType, Command, CommandContext, CommandHandler, Overload, Parameter};
use pretty_assertions::assert_eq;

use super::common::{framework, guild_message, seeded_platform};

/// A scoped resource whose release is counted.
struct Connection {
    id: usize,
}

fn counted_services(released: Arc<AtomicUsize>) -> ServiceProvider {
    let opened = Arc::new(AtomicUsize::new(0));
    ServiceCollection::new()
        .add_scoped_with_release(
            move |_| Connection {
                id: opened.fetch_add(1, Ordering::SeqCst),
            },
            move |_: &Connection| {
                released.fetch_add(1, Ordering::SeqCst);
            },
        )
        .build()
}

/// Opens the connection, then fails or panics depending on `mode`.
struct UsesConnection;

#[async_trait]
impl CommandHandler for UsesConnection {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let first = ctx.services().get::<Connection>().expect("connection registered");
        let second = ctx.services().get::<Connection>().expect("connection registered");
        assert_eq!(first.id, second.id);

        match ctx.args().str("mode") {
            Some("fail") => anyhow::bail!("query failed"),
            Some("panic") => panic!("connection dropped"),
            _ => Ok(()),
        }
    }
}

/// Releases its own scope before returning.
struct ReleasesEarly;

#[async_trait]
impl CommandHandler for ReleasesEarly {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        ctx.services().get::<Connection>().expect("connection registered");
        assert!(ctx.services().release());
        assert!(!ctx.services().release());
        assert!(ctx.services().get::<Connection>().is_none());
        assert!(ctx.services().scope().is_err());
        Ok(())
    }
}

/// Never touches services.
struct NoServices;

#[async_trait]
impl CommandHandler for NoServices {
    async fn execute(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
        Ok(())
    }
}

fn commands() -> Vec<Command> {
    vec![
        Command::new("db").overload(
            Overload::new(UsesConnection)
                .param(Parameter::new("mode", ArgType::String).optional()),
        ),
        Command::new("early").overload(Overload::new(ReleasesEarly)),
        Command::new("plain").overload(
            Overload::new(NoServices).param(Parameter::new("n", ArgType::Integer)),
        ),
    ]
}

async fn run(content: &str) -> (Option<ErrorKind>, usize, usize) {
    let released = Arc::new(AtomicUsize::new(0));
    let services = counted_services(released.clone());
    let commands = framework(
        seeded_platform(MockPlatform::new()),
        commands(),
        services.clone(),
    );

    let outcome = commands.dispatch(guild_message(content)).await;
    let kind = outcome.failure().map(|f| f.error.kind());
    (kind, services.scopes_created(), released.load(Ordering::SeqCst))
}

#[tokio::test]
async fn test_scope_released_once_on_success() {
    let (kind, created, released) = run("!db").await;
    assert_eq!(kind, None);
    assert_eq!(created, 1);
    assert_eq!(released, 1);
}

#[tokio::test]
async fn test_scope_released_once_on_body_error() {
    let (kind, created, released) = run("!db fail").await;
    assert_eq!(kind, Some(ErrorKind::CommandExecutionFault));
    assert_eq!(created, 1);
    assert_eq!(released, 1);
}

#[tokio::test]
async fn test_scope_released_once_on_panic() {
    let (kind, created, released) = run("!db panic").await;
    assert_eq!(kind, Some(ErrorKind::CommandExecutionFault));
    assert_eq!(created, 1);
    assert_eq!(released, 1);
}

#[tokio::test]
async fn test_early_release_is_not_repeated() {
    let (kind, created, released) = run("!early").await;
    assert_eq!(kind, None);
    assert_eq!(created, 1);
    assert_eq!(released, 1);
}

#[tokio::test]
async fn test_no_scope_without_service_access() {
    let (kind, created, released) = run("!plain 3").await;
    assert_eq!(kind, None);
    assert_eq!(created, 0);
    assert_eq!(released, 0);
}

#[tokio::test]
async fn test_no_scope_when_resolution_fails() {
    let (kind, created, released) = run("!plain three").await;
    assert_eq!(kind, Some(ErrorKind::NoMatchingOverload));
    assert_eq!(created, 0);
    assert_eq!(released, 0);
}
