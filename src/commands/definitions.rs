//! Command definitions and the command registry.
//!
//! A [`Command`] has a name, aliases and an ordered list of [`Overload`]s.
//! Each overload declares its [`Parameter`]s and the [`CommandHandler`] that
//! runs when it is selected. Definitions are validated and frozen when they
//! are added to a [`CommandRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::context::CommandContext;
use super::converters::{ArgType, ArgValue, ConverterRegistry};
use crate::error::RegistrationError;

/// The body of a command overload.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()>;
}

/// Definition of a command parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name, used to look the bound value up.
    pub name: String,
    /// Target type.
    pub arg_type: ArgType,
    /// Whether the parameter may be left unbound.
    pub optional: bool,
    /// Value bound when no token is left for this parameter.
    pub default: Option<ArgValue>,
    /// Consumes the rest of the input as raw text.
    pub remainder: bool,
    /// Short description shown in help.
    pub description: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, arg_type: ArgType) -> Self {
        Self {
            name: name.into(),
            arg_type,
            optional: false,
            default: None,
            remainder: false,
            description: None,
        }
    }

    /// Marks the parameter optional without a default.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Sets the default value (implies optional).
    pub fn default_value(mut self, value: impl Into<ArgValue>) -> Self {
        self.optional = true;
        self.default = Some(value.into());
        self
    }

    /// Makes this parameter consume all remaining input.
    pub fn remainder(mut self) -> Self {
        self.remainder = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// True if a token must be supplied for this parameter.
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }

    /// Usage fragment: `<name>`, `[name]`, `<name...>` or `[name...]`.
    pub fn usage(&self) -> String {
        let dots = if self.remainder { "..." } else { "" };
        if self.is_required() {
            format!("<{}{}>", self.name, dots)
        } else {
            format!("[{}{}]", self.name, dots)
        }
    }
}

/// One callable signature of a command.
#[derive(Clone)]
pub struct Overload {
    parameters: Vec<Parameter>,
    handler: Arc<dyn CommandHandler>,
    description: Option<String>,
}

impl Overload {
    pub fn new<H>(handler: H) -> Self
    where
        H: CommandHandler + 'static,
    {
        Self::from_arc(Arc::new(handler))
    }

    /// Creates an overload sharing an existing handler.
    pub fn from_arc(handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            parameters: Vec::new(),
            handler,
            description: None,
        }
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn handler(&self) -> &Arc<dyn CommandHandler> {
        &self.handler
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// True if the last parameter consumes the remainder.
    pub fn has_remainder(&self) -> bool {
        self.parameters.last().is_some_and(|p| p.remainder)
    }

    /// Number of parameters that must be supplied.
    pub fn required_count(&self) -> usize {
        self.parameters.iter().filter(|p| p.is_required()).count()
    }

    /// Usage line, e.g. `ban <user> [reason...]`.
    pub fn usage(&self, command_name: &str) -> String {
        std::iter::once(command_name.to_string())
            .chain(self.parameters.iter().map(Parameter::usage))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overload")
            .field("parameters", &self.parameters)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Definition of a command.
#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    aliases: Vec<String>,
    description: Option<String>,
    module: Option<String>,
    overloads: Vec<Overload>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            description: None,
            module: None,
            overloads: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Name of the module that owns this command (used to group help output).
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Appends an overload. Overloads are tried in the order they were added.
    pub fn overload(mut self, overload: Overload) -> Self {
        self.overloads.push(overload);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn overloads(&self) -> &[Overload] {
        &self.overloads
    }

    fn validate(&self, converters: &ConverterRegistry) -> Result<(), RegistrationError> {
        for name in std::iter::once(&self.name).chain(&self.aliases) {
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(RegistrationError::InvalidName(name.clone()));
            }
        }

        if self.overloads.is_empty() {
            return Err(RegistrationError::NoOverloads {
                command: self.name.clone(),
            });
        }

        for overload in &self.overloads {
            let params = overload.parameters();
            let mut seen_optional = false;

            for (i, param) in params.iter().enumerate() {
                if !converters.contains(param.arg_type) {
                    return Err(RegistrationError::MissingConverter {
                        command: self.name.clone(),
                        parameter: param.name.clone(),
                        arg_type: param.arg_type.name().to_string(),
                    });
                }
                if param.remainder && i + 1 != params.len() {
                    return Err(RegistrationError::RemainderNotLast {
                        command: self.name.clone(),
                        parameter: param.name.clone(),
                    });
                }
                if param.is_required() && seen_optional {
                    return Err(RegistrationError::RequiredAfterOptional {
                        command: self.name.clone(),
                        parameter: param.name.clone(),
                    });
                }
                seen_optional |= !param.is_required();
            }
        }

        Ok(())
    }
}

/// Registered commands, indexed by name and alias.
///
/// Built at startup and shared read-only during dispatch.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<Arc<Command>>,
    names: HashMap<String, usize>,
    case_sensitive: bool,
}

impl CommandRegistry {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            commands: Vec::new(),
            names: HashMap::new(),
            case_sensitive,
        }
    }

    fn normalize(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    /// Validates and registers a command.
    ///
    /// Every parameter type must have a converter in `converters`.
    pub fn register(
        &mut self,
        command: Command,
        converters: &ConverterRegistry,
    ) -> Result<(), RegistrationError> {
        command.validate(converters)?;

        let mut keys = Vec::with_capacity(1 + command.aliases.len());
        for name in std::iter::once(&command.name).chain(&command.aliases) {
            let key = self.normalize(name);
            if let Some(&existing) = self.names.get(&key) {
                return Err(RegistrationError::DuplicateName {
                    name: name.clone(),
                    existing: self.commands[existing].name.clone(),
                });
            }
            if keys.contains(&key) {
                return Err(RegistrationError::DuplicateName {
                    name: name.clone(),
                    existing: command.name.clone(),
                });
            }
            keys.push(key);
        }

        let index = self.commands.len();
        for key in keys {
            self.names.insert(key, index);
        }
        self.commands.push(Arc::new(command));
        Ok(())
    }

    /// Finds a command by name or alias.
    pub fn find(&self, name: &str) -> Option<&Arc<Command>> {
        self.names
            .get(&self.normalize(name))
            .map(|&index| &self.commands[index])
    }

    /// Commands in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn execute(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn converters() -> ConverterRegistry {
        ConverterRegistry::with_defaults()
    }

    fn ban() -> Command {
        Command::new("ban")
            .alias("b")
            .overload(Overload::new(Noop).param(Parameter::new("user", ArgType::User)))
            .overload(
                Overload::new(Noop)
                    .param(Parameter::new("user", ArgType::User))
                    .param(Parameter::new("reason", ArgType::String).remainder()),
            )
    }

    #[test]
    fn test_find_by_name_and_alias() {
        let mut registry = CommandRegistry::new(false);
        registry.register(ban(), &converters()).unwrap();

        assert!(registry.find("ban").is_some());
        assert!(registry.find("BAN").is_some());
        assert!(registry.find("b").is_some());
        assert!(registry.find("kick").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_case_sensitive_lookup() {
        let mut registry = CommandRegistry::new(true);
        registry.register(ban(), &converters()).unwrap();
        assert!(registry.find("ban").is_some());
        assert!(registry.find("Ban").is_none());
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let mut registry = CommandRegistry::new(false);
        registry.register(ban(), &converters()).unwrap();
        let err = registry
            .register(
                Command::new("block").alias("B").overload(Overload::new(Noop)),
                &converters(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateName {
                name: "B".to_string(),
                existing: "ban".to_string()
            }
        );
        // The failed command left nothing behind.
        assert!(registry.find("block").is_none());
    }

    #[test]
    fn test_missing_converter_rejected() {
        let mut registry = CommandRegistry::new(false);
        let err = registry
            .register(
                Command::new("paint").overload(
                    Overload::new(Noop).param(Parameter::new("color", ArgType::Custom("color"))),
                ),
                &converters(),
            )
            .unwrap_err();
        assert!(matches!(err, RegistrationError::MissingConverter { ref arg_type, .. } if arg_type == "color"));
    }

    #[test]
    fn test_remainder_must_be_last() {
        let mut registry = CommandRegistry::new(false);
        let err = registry
            .register(
                Command::new("say").overload(
                    Overload::new(Noop)
                        .param(Parameter::new("text", ArgType::String).remainder())
                        .param(Parameter::new("times", ArgType::Integer)),
                ),
                &converters(),
            )
            .unwrap_err();
        assert!(matches!(err, RegistrationError::RemainderNotLast { .. }));
    }

    #[test]
    fn test_required_after_optional_rejected() {
        let mut registry = CommandRegistry::new(false);
        let err = registry
            .register(
                Command::new("roll").overload(
                    Overload::new(Noop)
                        .param(Parameter::new("sides", ArgType::Integer).default_value(6i64))
                        .param(Parameter::new("count", ArgType::Integer)),
                ),
                &converters(),
            )
            .unwrap_err();
        assert!(matches!(err, RegistrationError::RequiredAfterOptional { .. }));
    }

    #[test]
    fn test_command_without_overloads_rejected() {
        let mut registry = CommandRegistry::new(false);
        let err = registry
            .register(Command::new("empty"), &converters())
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::NoOverloads {
                command: "empty".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut registry = CommandRegistry::new(false);
        let err = registry
            .register(Command::new("two words").overload(Overload::new(Noop)), &converters())
            .unwrap_err();
        assert_eq!(err, RegistrationError::InvalidName("two words".to_string()));
    }

    #[test]
    fn test_usage_lines() {
        let command = ban();
        assert_eq!(command.overloads()[0].usage("ban"), "ban <user>");
        assert_eq!(command.overloads()[1].usage("ban"), "ban <user> <reason...>");

        let optional = Parameter::new("count", ArgType::Integer).default_value(1i64);
        assert_eq!(optional.usage(), "[count]");
        assert!(!optional.is_required());
    }

    #[test]
    fn test_overload_metadata() {
        let command = ban();
        assert!(!command.overloads()[0].has_remainder());
        assert!(command.overloads()[1].has_remainder());
        assert_eq!(command.overloads()[1].required_count(), 2);
    }
}
