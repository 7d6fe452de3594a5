//! The command framework.
//!
//! Messages flow through [`tokenizer`], [`resolver`] and [`context`] into the
//! [`dispatcher`], which runs the selected overload of a registered command.

pub mod context;
pub mod converters;
pub mod definitions;
pub mod dispatcher;
pub mod help;
pub mod resolver;
pub mod tokenizer;

pub use context::{BoundArguments, CommandContext, ContextBuilder, MessageContext, ServiceContext};
pub use converters::{ArgType, ArgValue, ArgumentConverter, ConversionResult, ConverterRegistry, FnConverter};
pub use definitions::{Command, CommandHandler, CommandRegistry, Overload, Parameter};
pub use dispatcher::{
    CommandEvent, CommandFailure, CommandsNext, CommandsNextBuilder, DispatchOutcome,
    InvocationStage,
};
pub use resolver::{resolve, Resolution};
pub use tokenizer::{tokenize, Token, Tokens};
