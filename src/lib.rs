//! commands-next - a command framework for chat bots.
//!
//! Turns chat messages such as `!ban @someone spamming a lot` into typed
//! invocations of registered command handlers: the message is tokenized, the
//! first overload whose parameters all convert is selected, and its body runs
//! with a per-invocation context and service scope.

pub mod commands;
pub mod config;
pub mod entities;
pub mod error;
pub mod events;
pub mod logging;
pub mod platform;
pub mod services;

pub use commands::{
    ArgType, ArgValue, Command, CommandContext, CommandEvent, CommandHandler, CommandsNext,
    CommandsNextBuilder, DispatchOutcome, Overload, Parameter,
};
pub use error::{CommandError, PlatformError, RegistrationError};
