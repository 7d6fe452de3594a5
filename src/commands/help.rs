//! Built-in help command and help text generation.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::context::CommandContext;
use super::converters::ArgType;
use super::definitions::{Command, CommandHandler, CommandRegistry, Overload, Parameter};

/// Module name used for commands that do not declare one.
pub const DEFAULT_MODULE: &str = "General";

/// Name of the built-in help command.
pub const HELP_COMMAND: &str = "help";

/// Lists every registered command, grouped by module.
pub fn generate_help_text(registry: &CommandRegistry, prefix: &str) -> String {
    let mut modules: BTreeMap<&str, Vec<&Command>> = BTreeMap::new();
    for command in registry.iter() {
        modules
            .entry(command.module_name().unwrap_or(DEFAULT_MODULE))
            .or_default()
            .push(command);
    }

    let mut out = String::from("Available commands:\n");
    for (module, commands) in modules {
        out.push_str(&format!("\n{module}:\n"));
        for command in commands {
            let names = std::iter::once(command.name())
                .chain(command.aliases().iter().map(String::as_str))
                .map(|name| format!("{prefix}{name}"))
                .collect::<Vec<_>>()
                .join(", ");
            match command.description_text() {
                Some(description) => out.push_str(&format!("  {names} - {description}\n")),
                None => out.push_str(&format!("  {names}\n")),
            }
        }
    }
    out.push_str(&format!(
        "\nType {prefix}{HELP_COMMAND} <command> for details on a command."
    ));
    out
}

/// Describes a single command: aliases and one usage line per overload.
pub fn describe_command(command: &Command, prefix: &str) -> String {
    let mut out = format!("{prefix}{}", command.name());
    if let Some(description) = command.description_text() {
        out.push_str(&format!(" - {description}"));
    }
    out.push('\n');

    if !command.aliases().is_empty() {
        let aliases = command
            .aliases()
            .iter()
            .map(|alias| format!("{prefix}{alias}"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("Aliases: {aliases}\n"));
    }

    out.push_str("Usage:\n");
    for overload in command.overloads() {
        out.push_str(&format!("  {prefix}{}", overload.usage(command.name())));
        if let Some(description) = overload.description_text() {
            out.push_str(&format!(" - {description}"));
        }
        out.push('\n');

        for param in overload.parameters() {
            if let Some(description) = &param.description {
                out.push_str(&format!(
                    "      {} ({}): {description}\n",
                    param.name,
                    param.arg_type.name()
                ));
            }
        }
    }

    out.trim_end().to_string()
}

struct HelpIndex;

#[async_trait]
impl CommandHandler for HelpIndex {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let text = generate_help_text(ctx.commands(), ctx.prefix());
        ctx.respond(format!("```\n{text}\n```")).await?;
        Ok(())
    }
}

struct HelpTopic;

#[async_trait]
impl CommandHandler for HelpTopic {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let name = ctx.args().str("command").unwrap_or_default();
        let name = name.strip_prefix(ctx.prefix()).unwrap_or(name);

        match ctx.commands().find(name) {
            Some(command) => {
                let text = describe_command(command, ctx.prefix());
                ctx.respond(format!("```\n{text}\n```")).await?;
            }
            None => {
                ctx.respond(format!(
                    "No command named `{name}`. Type {}{HELP_COMMAND} to list commands.",
                    ctx.prefix()
                ))
                .await?;
            }
        }
        Ok(())
    }
}

/// The built-in `help` command.
pub fn help_command() -> Command {
    Command::new(HELP_COMMAND)
        .alias("h")
        .description("Lists commands or describes one")
        .overload(Overload::new(HelpIndex).description("list every command"))
        .overload(
            Overload::new(HelpTopic)
                .description("describe one command")
                .param(Parameter::new("command", ArgType::String).description("command name or alias")),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::converters::ConverterRegistry;
    use pretty_assertions::assert_eq;

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn execute(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn ban() -> Command {
        Command::new("ban")
            .alias("b")
            .description("Bans a user")
            .module("Moderation")
            .overload(Overload::new(Noop).param(Parameter::new("user", ArgType::User)))
            .overload(
                Overload::new(Noop)
                    .description("with a reason")
                    .param(Parameter::new("user", ArgType::User))
                    .param(
                        Parameter::new("reason", ArgType::String)
                            .remainder()
                            .description("why"),
                    ),
            )
    }

    fn registry() -> CommandRegistry {
        let converters = ConverterRegistry::with_defaults();
        let mut registry = CommandRegistry::new(false);
        registry.register(help_command(), &converters).unwrap();
        registry.register(ban(), &converters).unwrap();
        registry
            .register(Command::new("ping").overload(Overload::new(Noop)), &converters)
            .unwrap();
        registry
    }

    #[test]
    fn test_help_text_grouped_by_module() {
        let text = generate_help_text(&registry(), "!");
        assert_eq!(
            text,
            "Available commands:\n\
             \n\
             General:\n  \
             !help, !h - Lists commands or describes one\n  \
             !ping\n\
             \n\
             Moderation:\n  \
             !ban, !b - Bans a user\n\
             \n\
             Type !help <command> for details on a command."
        );
    }

    #[test]
    fn test_describe_command() {
        let text = describe_command(&ban(), "?");
        assert_eq!(
            text,
            "?ban - Bans a user\n\
             Aliases: ?b\n\
             Usage:\n  \
             ?ban <user>\n  \
             ?ban <user> <reason...> - with a reason\n      \
             reason (string): why"
        );
    }

    #[test]
    fn test_help_command_shape() {
        let help = help_command();
        assert_eq!(help.aliases(), ["h".to_string()]);
        assert_eq!(help.overloads().len(), 2);
        assert!(help.overloads()[0].parameters().is_empty());
        assert_eq!(help.overloads()[1].usage("help"), "help <command>");
    }
}
