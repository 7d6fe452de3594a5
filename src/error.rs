//! Error types for CommandsNext.
//!
//! `CommandError` is the structured failure produced for every invocation that
//! does not complete. `RegistrationError` covers startup-time mistakes, and
//! `AppError` is what the demo binary reports.

use std::fmt;

use thiserror::Error;

use crate::commands::converters::ArgType;

/// Why a single token could not be converted to its parameter's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    /// Parameter being bound.
    pub parameter: String,
    /// Target type of the parameter.
    pub arg_type: ArgType,
    /// Raw token (or remainder text) that was rejected.
    pub token: String,
    /// Human-readable reason.
    pub reason: String,
}

impl ConversionFailure {
    pub fn new(
        parameter: impl Into<String>,
        arg_type: ArgType,
        token: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            parameter: parameter.into(),
            arg_type,
            token: token.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConversionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not convert '{}' to {} for `{}`: {}",
            self.token,
            self.arg_type.name(),
            self.parameter,
            self.reason
        )
    }
}

/// The reason one overload was rejected during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeasibilityFailure {
    /// A parameter without default had no token left to bind.
    MissingArgument { parameter: String },
    /// Tokens remained after every parameter was bound.
    TooManyArguments { expected: usize, supplied: usize },
    /// A converter rejected a token.
    Conversion(ConversionFailure),
}

impl fmt::Display for FeasibilityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArgument { parameter } => {
                write!(f, "missing required argument `{parameter}`")
            }
            Self::TooManyArguments { expected, supplied } => write!(
                f,
                "too many arguments: expected at most {expected}, got {supplied}"
            ),
            Self::Conversion(failure) => failure.fmt(f),
        }
    }
}

/// A feasibility failure tagged with the overload it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadFailure {
    /// Registration index of the overload.
    pub overload: usize,
    /// Usage line of the overload, for diagnostics.
    pub signature: String,
    pub failure: FeasibilityFailure,
}

impl fmt::Display for OverloadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} `{}`: {}", self.overload, self.signature, self.failure)
    }
}

/// Broad classification of a [`CommandError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownCommand,
    NoMatchingOverload,
    CommandExecutionFault,
    PreconditionFault,
}

/// Failure of a single command invocation.
#[derive(Error, Debug)]
pub enum CommandError {
    /// No registered command matches the parsed name.
    #[error("Unknown command: {name}")]
    UnknownCommand { name: String },

    /// The command exists but none of its overloads bound the arguments.
    #[error("No overload of `{command}` matched the given arguments ({} rejected)", .failures.len())]
    NoMatchingOverload {
        command: String,
        failures: Vec<OverloadFailure>,
    },

    /// The command body returned an error or panicked.
    #[error("Command `{command}` failed: {source}")]
    Execution {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    /// An internal invariant was violated while preparing the invocation.
    #[error("Precondition violated: {0}")]
    Precondition(String),
}

impl CommandError {
    /// Creates an unknown-command error.
    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::UnknownCommand { name: name.into() }
    }

    /// Creates an execution fault wrapping the body's error.
    pub fn execution(command: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Execution {
            command: command.into(),
            source,
        }
    }

    /// Creates a precondition fault with the given message.
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownCommand { .. } => ErrorKind::UnknownCommand,
            Self::NoMatchingOverload { .. } => ErrorKind::NoMatchingOverload,
            Self::Execution { .. } => ErrorKind::CommandExecutionFault,
            Self::Precondition(_) => ErrorKind::PreconditionFault,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self.kind() {
            ErrorKind::UnknownCommand => "Unknown Command",
            ErrorKind::NoMatchingOverload => "Argument Error",
            ErrorKind::CommandExecutionFault => "Command Error",
            ErrorKind::PreconditionFault => "Internal Error",
        }
    }

    /// Multi-line diagnostic including per-overload failures.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::NoMatchingOverload { failures, .. } => {
                let mut out = self.to_string();
                for failure in failures {
                    out.push_str("\n  ");
                    out.push_str(&failure.to_string());
                }
                out
            }
            other => other.to_string(),
        }
    }
}

/// Errors raised by the platform collaborator (REST, cache lookups).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl PlatformError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }
}

/// Mistakes detected while registering commands and converters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Command `{command}` has no overloads")]
    NoOverloads { command: String },

    #[error("Name `{name}` is already registered (by command `{existing}`)")]
    DuplicateName { name: String, existing: String },

    #[error("Command `{command}`: no converter registered for type {arg_type} (parameter `{parameter}`)")]
    MissingConverter {
        command: String,
        parameter: String,
        arg_type: String,
    },

    #[error("Command `{command}`: remainder parameter `{parameter}` must be the last parameter")]
    RemainderNotLast { command: String, parameter: String },

    #[error("Command `{command}`: required parameter `{parameter}` follows an optional one")]
    RequiredAfterOptional { command: String, parameter: String },

    #[error("Invalid command name `{0}`")]
    InvalidName(String),

    #[error("Invalid prefix `{0}`")]
    InvalidPrefix(String),

    #[error("No prefixes configured and mention prefix disabled")]
    NoPrefixes,
}

/// Top-level error type for the demo binary.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors (invalid config file, bad values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Command registration failed at startup.
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// I/O errors while reading input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Registration(_) => "Registration Error",
            Self::Io(_) => "I/O Error",
        }
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;
