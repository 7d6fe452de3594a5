//! Per-invocation execution context.
//!
//! [`MessageContext`] is what is known from the message alone and exists
//! before overload resolution, so converters can consult it. Once an overload
//! has bound, [`ContextBuilder`] wraps it into a [`CommandContext`] together
//! with the resolved command, the arguments and a lazily created service scope.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::OnceCell;
use tracing::debug;

use super::converters::ArgValue;
use super::definitions::{Command, CommandRegistry, Overload};
use super::resolver::Resolution;
use super::tokenizer::Tokens;
use crate::config::CommandsConfig;
use crate::entities::{Channel, Embed, Guild, Member, Message, MessageBuilder, User};
use crate::error::{CommandError, PlatformError};
use crate::platform::Client;
use crate::services::{ServiceProvider, ServiceScope};

/// The message-derived part of an invocation.
pub struct MessageContext {
    client: Client,
    message: Message,
    member: OnceCell<Result<Option<Member>, PlatformError>>,
    member_resolutions: AtomicUsize,
}

impl MessageContext {
    pub fn new(client: Client, message: Message) -> Self {
        Self {
            client,
            message,
            member: OnceCell::new(),
            member_resolutions: AtomicUsize::new(0),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn channel(&self) -> &Channel {
        &self.message.channel
    }

    /// `None` for direct messages.
    pub fn guild(&self) -> Option<&Guild> {
        self.message.guild()
    }

    pub fn user(&self) -> &User {
        &self.message.author
    }

    /// The author as a guild member. `Ok(None)` in direct messages.
    ///
    /// Resolved on first call (member cache first, remote fetch on miss) and
    /// memoized for the lifetime of the context, failures included.
    pub async fn member(&self) -> Result<Option<Member>, PlatformError> {
        self.member
            .get_or_init(|| async {
                self.member_resolutions.fetch_add(1, Ordering::SeqCst);
                match self.guild() {
                    Some(guild) => self.client.get_member(guild.id, self.user().id).await,
                    None => Ok(None),
                }
            })
            .await
            .clone()
    }

    /// How many times member resolution actually ran (0 or 1).
    pub fn member_resolutions(&self) -> usize {
        self.member_resolutions.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MessageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageContext")
            .field("message", &self.message.id)
            .field("channel", &self.message.channel.id)
            .field("user", &self.message.author.id)
            .finish()
    }
}

/// Arguments bound to an overload's parameters, in parameter order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    values: Vec<(String, ArgValue)>,
}

impl BoundArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ArgValue::as_i64)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ArgValue::as_f64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ArgValue::as_bool)
    }

    pub fn user(&self, name: &str) -> Option<&User> {
        self.get(name).and_then(ArgValue::as_user)
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.get(name).and_then(ArgValue::as_member)
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.get(name).and_then(ArgValue::as_channel)
    }

    pub fn custom<T: Send + Sync + 'static>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(|value| value.downcast::<T>())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }
}

/// Lazily created dependency scope of one invocation.
///
/// The scope is created on first access and released exactly once, either by
/// [`ServiceContext::release`] or when the context is dropped.
pub struct ServiceContext {
    provider: ServiceProvider,
    scope: OnceLock<ServiceScope>,
    released: AtomicBool,
}

impl ServiceContext {
    pub fn new(provider: ServiceProvider) -> Self {
        Self {
            provider,
            scope: OnceLock::new(),
            released: AtomicBool::new(false),
        }
    }

    /// The root provider.
    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// The invocation's scope, created on first call.
    pub fn scope(&self) -> Result<&ServiceScope, CommandError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(CommandError::precondition(
                "service scope accessed after the invocation ended",
            ));
        }
        Ok(self.scope.get_or_init(|| self.provider.create_scope()))
    }

    /// Resolves a service through the invocation's scope.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.scope().ok()?.get::<T>()
    }

    /// Whether a scope has been created.
    pub fn is_initialized(&self) -> bool {
        self.scope.get().is_some()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Ends the invocation's use of services. Returns `true` if this call
    /// released a created scope; repeated calls are no-ops.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        match self.scope.get() {
            Some(scope) => scope.release(),
            None => false,
        }
    }
}

impl Drop for ServiceContext {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("initialized", &self.is_initialized())
            .field("released", &self.is_released())
            .finish()
    }
}

/// Inputs for building a [`CommandContext`].
pub struct ContextBuilder {
    pub message: MessageContext,
    pub registry: Arc<CommandRegistry>,
    pub config: Arc<CommandsConfig>,
    pub command: Arc<Command>,
    pub resolution: Resolution,
    pub tokens: Tokens,
    pub prefix: String,
    pub services: ServiceProvider,
}

impl ContextBuilder {
    /// Validates the pairing of command, overload and arguments and builds
    /// the context. Member resolution and scope creation stay deferred.
    pub fn build(self) -> Result<CommandContext, CommandError> {
        let registered = self.registry.find(self.command.name()).ok_or_else(|| {
            CommandError::precondition(format!(
                "command `{}` is not registered",
                self.command.name()
            ))
        })?;
        if !Arc::ptr_eq(registered, &self.command) {
            return Err(CommandError::precondition(format!(
                "command `{}` does not match the registered definition",
                self.command.name()
            )));
        }

        let overload = self
            .command
            .overloads()
            .get(self.resolution.overload)
            .ok_or_else(|| {
                CommandError::precondition(format!(
                    "command `{}` has no overload #{}",
                    self.command.name(),
                    self.resolution.overload
                ))
            })?;

        for (name, _) in self.resolution.arguments.iter() {
            if !overload.parameters().iter().any(|p| p.name == name) {
                return Err(CommandError::precondition(format!(
                    "argument `{name}` is not a parameter of `{}`",
                    overload.usage(self.command.name())
                )));
            }
        }
        if let Some(missing) = overload
            .parameters()
            .iter()
            .find(|p| p.is_required() && !self.resolution.arguments.contains(&p.name))
        {
            return Err(CommandError::precondition(format!(
                "required argument `{}` was not bound",
                missing.name
            )));
        }

        debug!(
            command = self.command.name(),
            overload = self.resolution.overload,
            "Execution context built"
        );

        Ok(CommandContext {
            raw_arguments: self.tokens.values(),
            raw_argument_string: self.tokens.raw().to_string(),
            message: self.message,
            registry: self.registry,
            config: self.config,
            command: self.command,
            overload: self.resolution.overload,
            arguments: self.resolution.arguments,
            prefix: self.prefix,
            services: ServiceContext::new(self.services),
        })
    }
}

/// Everything a command body can see about its invocation.
pub struct CommandContext {
    message: MessageContext,
    registry: Arc<CommandRegistry>,
    config: Arc<CommandsConfig>,
    command: Arc<Command>,
    overload: usize,
    raw_arguments: Vec<String>,
    raw_argument_string: String,
    prefix: String,
    arguments: BoundArguments,
    services: ServiceContext,
}

impl CommandContext {
    pub fn client(&self) -> &Client {
        self.message.client()
    }

    /// The message that triggered the invocation.
    pub fn message(&self) -> &Message {
        self.message.message()
    }

    pub fn channel(&self) -> &Channel {
        self.message.channel()
    }

    /// `None` for direct messages.
    pub fn guild(&self) -> Option<&Guild> {
        self.message.guild()
    }

    pub fn user(&self) -> &User {
        self.message.user()
    }

    /// The invoking member, resolved at most once. `Ok(None)` in direct messages.
    pub async fn member(&self) -> Result<Option<Member>, PlatformError> {
        self.message.member().await
    }

    pub fn message_context(&self) -> &MessageContext {
        &self.message
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn overload(&self) -> &Overload {
        // Index validated in ContextBuilder::build.
        &self.command.overloads()[self.overload]
    }

    pub fn overload_index(&self) -> usize {
        self.overload
    }

    /// Raw token values, quotes stripped.
    pub fn raw_arguments(&self) -> &[String] {
        &self.raw_arguments
    }

    /// The argument string as typed, after the command name.
    pub fn raw_argument_string(&self) -> &str {
        &self.raw_argument_string
    }

    /// The prefix used to invoke the command.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn args(&self) -> &BoundArguments {
        &self.arguments
    }

    pub fn services(&self) -> &ServiceContext {
        &self.services
    }

    /// All registered commands.
    pub fn commands(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CommandsConfig {
        &self.config
    }

    /// Replies with plain text in the invoking channel.
    pub async fn respond(&self, content: impl Into<String>) -> Result<Message, PlatformError> {
        self.respond_builder(MessageBuilder::new().content(content))
            .await
    }

    /// Replies with an embed.
    pub async fn respond_embed(&self, embed: Embed) -> Result<Message, PlatformError> {
        self.respond_builder(MessageBuilder::new().embed(embed)).await
    }

    /// Replies with text and an embed.
    pub async fn respond_with_embed(
        &self,
        content: impl Into<String>,
        embed: Embed,
    ) -> Result<Message, PlatformError> {
        self.respond_builder(MessageBuilder::new().content(content).embed(embed))
            .await
    }

    /// Replies with a fully configured message.
    pub async fn respond_builder(&self, builder: MessageBuilder) -> Result<Message, PlatformError> {
        self.client().send_message(self.channel().id, builder).await
    }

    /// Replies with a message configured by `configure`.
    pub async fn respond_with<F>(&self, configure: F) -> Result<Message, PlatformError>
    where
        F: FnOnce(MessageBuilder) -> MessageBuilder + Send,
    {
        self.respond_builder(configure(MessageBuilder::new())).await
    }

    /// Shows the typing indicator in the invoking channel.
    pub async fn trigger_typing(&self) -> Result<(), PlatformError> {
        self.client().trigger_typing(self.channel().id).await
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("command", &self.command.name())
            .field("overload", &self.overload)
            .field("prefix", &self.prefix)
            .field("raw_argument_string", &self.raw_argument_string)
            .field("message", &self.message)
            .field("services", &self.services)
            .finish()
    }
}
