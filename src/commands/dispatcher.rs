//! Command dispatch.
//!
//! [`CommandsNext`] takes a received message through the invocation stages:
//! prefix detection and tokenizing, command lookup and overload resolution,
//! context construction, and finally execution of the selected body. Every
//! failure is reported once, both in the returned [`DispatchOutcome`] and on
//! the event channel.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::context::{CommandContext, ContextBuilder, MessageContext};
use super::converters::{ArgType, ArgumentConverter, ConverterRegistry};
use super::definitions::{Command, CommandRegistry};
use super::help::help_command;
use super::resolver::resolve;
use super::tokenizer::{split_command_name, tokenize};
use crate::config::CommandsConfig;
use crate::entities::{Message, MessageBuilder, Snowflake};
use crate::error::{CommandError, RegistrationError};
use crate::events::GatewayEvent;
use crate::platform::Client;
use crate::services::ServiceProvider;

/// Capacity of the framework event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Stages of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationStage {
    Received,
    Tokenized,
    Resolved,
    ContextBuilt,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for InvocationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Tokenized => "tokenized",
            Self::Resolved => "resolved",
            Self::ContextBuilt => "context-built",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A failed invocation.
#[derive(Debug, Clone)]
pub struct CommandFailure {
    /// The stage that produced the error.
    pub stage: InvocationStage,
    /// Registered name of the command, when one was found.
    pub command: Option<String>,
    pub error: Arc<CommandError>,
}

/// Result of dispatching one message.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// The message was not addressed to the bot, or is filtered by config.
    Ignored,
    /// A command body ran to completion.
    Completed { command: String, overload: usize },
    Failed(CommandFailure),
}

impl DispatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn failure(&self) -> Option<&CommandFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Published on the framework event channel.
#[derive(Debug, Clone)]
pub enum CommandEvent {
    Executed {
        command: String,
        overload: usize,
        prefix: String,
        user_id: Snowflake,
    },
    Errored {
        command: Option<String>,
        stage: InvocationStage,
        error: Arc<CommandError>,
    },
}

/// Collects configuration, converters, commands and services.
pub struct CommandsNextBuilder {
    config: CommandsConfig,
    converters: ConverterRegistry,
    commands: Vec<Command>,
    services: ServiceProvider,
}

impl CommandsNextBuilder {
    pub fn new(config: CommandsConfig) -> Self {
        Self {
            config,
            converters: ConverterRegistry::with_defaults(),
            commands: Vec::new(),
            services: ServiceProvider::empty(),
        }
    }

    /// Registers a converter, replacing any existing one for `arg_type`.
    pub fn converter<C>(mut self, arg_type: ArgType, converter: C) -> Self
    where
        C: ArgumentConverter + 'static,
    {
        self.converters.register(arg_type, converter);
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn services(mut self, services: ServiceProvider) -> Self {
        self.services = services;
        self
    }

    /// Validates every command against the final converter set and freezes
    /// the registry.
    pub fn build(self, client: Client) -> Result<CommandsNext, RegistrationError> {
        self.config.check_prefixes()?;

        let mut registry = CommandRegistry::new(self.config.case_sensitive);
        if self.config.enable_default_help {
            registry.register(help_command(), &self.converters)?;
        }
        for command in self.commands {
            registry.register(command, &self.converters)?;
        }
        info!(commands = registry.len(), "Command registry built");

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(CommandsNext {
            inner: Arc::new(CommandsNextInner {
                client,
                config: Arc::new(self.config),
                registry: Arc::new(registry),
                converters: self.converters,
                services: self.services,
                events,
            }),
        })
    }
}

struct CommandsNextInner {
    client: Client,
    config: Arc<CommandsConfig>,
    registry: Arc<CommandRegistry>,
    converters: ConverterRegistry,
    services: ServiceProvider,
    events: broadcast::Sender<CommandEvent>,
}

/// The command framework. Cheap to clone.
#[derive(Clone)]
pub struct CommandsNext {
    inner: Arc<CommandsNextInner>,
}

impl CommandsNext {
    pub fn builder(config: CommandsConfig) -> CommandsNextBuilder {
        CommandsNextBuilder::new(config)
    }

    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    pub fn config(&self) -> &CommandsConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.inner.registry
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.inner.converters
    }

    pub fn services(&self) -> &ServiceProvider {
        &self.inner.services
    }

    /// Subscribes to executed and errored invocations.
    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.inner.events.subscribe()
    }

    /// Finds the prefix `content` starts with.
    ///
    /// Returns the prefix as written and the text after it. A bot mention is
    /// checked before the configured string prefixes.
    pub fn find_prefix<'a>(&self, content: &'a str) -> Option<(String, &'a str)> {
        if self.inner.config.enable_mention_prefix {
            let id = self.inner.client.current_user().id;
            for mention in [format!("<@{id}>"), format!("<@!{id}>")] {
                if let Some(rest) = content.strip_prefix(mention.as_str()) {
                    return Some((mention, rest.trim_start()));
                }
            }
        }

        self.inner
            .config
            .prefixes
            .iter()
            .find_map(|prefix| content.strip_prefix(prefix.as_str()).map(|rest| (prefix.clone(), rest)))
    }

    /// Handles a gateway event. Created messages are dispatched on their own
    /// task; every other event is ignored.
    pub fn handle_event(&self, event: GatewayEvent) -> Option<JoinHandle<DispatchOutcome>> {
        match event {
            GatewayEvent::MessageCreated(created) => Some(self.spawn_dispatch(created.message)),
            other => {
                debug!(event = other.name(), "Ignoring gateway event");
                None
            }
        }
    }

    /// Dispatches `message` on a new task.
    pub fn spawn_dispatch(&self, message: Message) -> JoinHandle<DispatchOutcome> {
        let this = self.clone();
        tokio::spawn(async move { this.dispatch(message).await })
    }

    /// Runs one invocation to completion.
    pub async fn dispatch(&self, message: Message) -> DispatchOutcome {
        let config = &self.inner.config;
        debug!(message_id = %message.id, stage = %InvocationStage::Received, "Dispatching message");

        if config.ignore_bots && message.author.bot {
            return DispatchOutcome::Ignored;
        }
        if !config.enable_dms && message.channel.is_direct() {
            return DispatchOutcome::Ignored;
        }

        let Some((prefix, rest)) = self.find_prefix(&message.content) else {
            return DispatchOutcome::Ignored;
        };
        let Some((name, arguments)) = split_command_name(rest) else {
            return DispatchOutcome::Ignored;
        };
        let name = name.to_string();
        let tokens = tokenize(arguments);
        debug!(command = %name, tokens = tokens.len(), stage = %InvocationStage::Tokenized, "Tokenized");

        let Some(command) = self.inner.registry.find(&name).cloned() else {
            self.send_unknown_notice(&message, &name).await;
            return self.fail(
                InvocationStage::Resolved,
                None,
                CommandError::unknown_command(name),
            );
        };

        let message_ctx = MessageContext::new(self.inner.client.clone(), message);
        let resolution = match resolve(&command, &tokens, &self.inner.converters, &message_ctx).await {
            Ok(resolution) => resolution,
            Err(failures) => {
                return self.fail(
                    InvocationStage::Resolved,
                    Some(command.name()),
                    CommandError::NoMatchingOverload {
                        command: command.name().to_string(),
                        failures,
                    },
                );
            }
        };
        debug!(
            command = command.name(),
            overload = resolution.overload,
            stage = %InvocationStage::Resolved,
            "Resolved"
        );

        let builder = ContextBuilder {
            message: message_ctx,
            registry: self.inner.registry.clone(),
            config: self.inner.config.clone(),
            command: command.clone(),
            resolution,
            tokens,
            prefix,
            services: self.inner.services.clone(),
        };
        let ctx = match builder.build() {
            Ok(ctx) => ctx,
            Err(e) => return self.fail(InvocationStage::ContextBuilt, Some(command.name()), e),
        };

        self.execute(ctx).await
    }

    async fn execute(&self, ctx: CommandContext) -> DispatchOutcome {
        let command = ctx.command().name().to_string();
        let overload = ctx.overload_index();
        let handler = ctx.overload().handler().clone();
        debug!(command = %command, overload, stage = %InvocationStage::Executing, "Executing");

        let result = AssertUnwindSafe(handler.execute(&ctx)).catch_unwind().await;

        // Runs whether the body returned, failed or panicked.
        if ctx.services().release() {
            debug!(command = %command, "Service scope released");
        }

        let fault = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(panic) => Some(anyhow::anyhow!("command panicked: {}", panic_message(&*panic))),
        };

        if let Some(source) = fault {
            return self.fail(
                InvocationStage::Executing,
                Some(command.as_str()),
                CommandError::execution(command.clone(), source),
            );
        }

        info!(
            command = %command,
            overload,
            user = %ctx.user().id,
            stage = %InvocationStage::Completed,
            "Command executed"
        );
        self.publish(CommandEvent::Executed {
            command: command.clone(),
            overload,
            prefix: ctx.prefix().to_string(),
            user_id: ctx.user().id,
        });
        DispatchOutcome::Completed { command, overload }
    }

    fn fail(
        &self,
        stage: InvocationStage,
        command: Option<&str>,
        error: CommandError,
    ) -> DispatchOutcome {
        match &error {
            CommandError::Precondition(_) => {
                error!(stage = %stage, command = ?command, "{}: {}", error.category(), error)
            }
            _ => warn!(stage = %stage, command = ?command, "{}", error.diagnostic()),
        }

        let failure = CommandFailure {
            stage,
            command: command.map(str::to_string),
            error: Arc::new(error),
        };
        self.publish(CommandEvent::Errored {
            command: failure.command.clone(),
            stage,
            error: failure.error.clone(),
        });
        DispatchOutcome::Failed(failure)
    }

    fn publish(&self, event: CommandEvent) {
        // No subscribers is not an error.
        let _ = self.inner.events.send(event);
    }

    async fn send_unknown_notice(&self, message: &Message, name: &str) {
        let Some(text) = self.inner.config.unknown_command_reply(name) else {
            return;
        };
        let reply = MessageBuilder::new().content(text).reply_to(message.id);
        if let Err(e) = self.inner.client.send_message(message.channel.id, reply).await {
            warn!(error = %e, "Failed to send unknown command notice");
        }
    }
}

impl fmt::Debug for CommandsNext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandsNext")
            .field("client", &self.inner.client)
            .field("config", &self.inner.config)
            .field("commands", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
