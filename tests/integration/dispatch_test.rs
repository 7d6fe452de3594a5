//! End-to-end dispatch tests.
//!
//! Messages go through prefix detection, overload resolution, context
//! construction and execution against the mock platform.

use std::sync::Arc;

use async_trait::async_trait;
use commands_next::commands::InvocationStage;
use commands_next::entities::Snowflake;
use commands_next::error::{ErrorKind, FeasibilityFailure};
use commands_next::platform::MockPlatform;
use commands_next::services::ServiceCollection;
use commands_next::{
    ArgType, Command, CommandContext, CommandError, CommandEvent, CommandHandler, CommandsNext,
    DispatchOutcome, Overload, Parameter,
};
use pretty_assertions::assert_eq;

use super::common::{framework, guild_message, replies, seeded_platform};

struct Ban;

#[async_trait]
impl CommandHandler for Ban {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let user = ctx.args().user("user").map(|u| u.username.clone()).unwrap_or_default();
        let reply = match ctx.args().str("reason") {
            Some(reason) => format!("banned {user}: {reason}"),
            None => format!("banned {user}"),
        };
        ctx.respond(reply).await?;
        Ok(())
    }
}

struct Add;

#[async_trait]
impl CommandHandler for Add {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let sum = ctx.args().i64("a").unwrap_or(0) + ctx.args().i64("b").unwrap_or(0);
        ctx.respond(sum.to_string()).await?;
        Ok(())
    }
}

struct Fails;

#[async_trait]
impl CommandHandler for Fails {
    async fn execute(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
        anyhow::bail!("database unavailable")
    }
}

struct Explodes;

#[async_trait]
impl CommandHandler for Explodes {
    async fn execute(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
        panic!("boom")
    }
}

struct Echo;

#[async_trait]
impl CommandHandler for Echo {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        ctx.respond(ctx.args().str("text").unwrap_or_default().to_string())
            .await?;
        Ok(())
    }
}

fn commands() -> Vec<Command> {
    vec![
        Command::new("ban")
            .overload(Overload::new(Ban).param(Parameter::new("user", ArgType::User)))
            .overload(
                Overload::new(Ban)
                    .param(Parameter::new("user", ArgType::User))
                    .param(Parameter::new("reason", ArgType::String).remainder()),
            ),
        Command::new("add")
            .overload(
                Overload::new(Add)
                    .param(Parameter::new("a", ArgType::Integer))
                    .param(Parameter::new("b", ArgType::Integer)),
            )
            .overload(Overload::new(Add).param(Parameter::new("a", ArgType::Integer))),
        Command::new("fail").overload(Overload::new(Fails)),
        Command::new("explode").overload(Overload::new(Explodes)),
        Command::new("echo").overload(
            Overload::new(Echo).param(Parameter::new("text", ArgType::String).remainder()),
        ),
    ]
}

fn setup() -> (CommandsNext, Arc<MockPlatform>) {
    let platform = seeded_platform(MockPlatform::new());
    let commands = framework(platform.clone(), commands(), ServiceCollection::new().build());
    (commands, platform)
}

#[tokio::test]
async fn test_ban_with_reason_selects_remainder_overload() {
    let (commands, platform) = setup();
    let mut events = commands.subscribe();

    let outcome = commands
        .dispatch(guild_message("!ban <@42> spamming a lot"))
        .await;

    match outcome {
        DispatchOutcome::Completed { command, overload } => {
            assert_eq!(command, "ban");
            assert_eq!(overload, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(replies(&platform), vec!["banned alice: spamming a lot"]);

    match events.recv().await.unwrap() {
        CommandEvent::Executed {
            command,
            overload,
            prefix,
            user_id,
        } => {
            assert_eq!(command, "ban");
            assert_eq!(overload, 1);
            assert_eq!(prefix, "!");
            assert_eq!(user_id, Snowflake(10));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_ban_without_reason_selects_first_overload() {
    let (commands, platform) = setup();
    let outcome = commands.dispatch(guild_message("!ban 43")).await;

    assert!(matches!(
        outcome,
        DispatchOutcome::Completed { overload: 0, .. }
    ));
    assert_eq!(replies(&platform), vec!["banned bob"]);
}

#[tokio::test]
async fn test_no_matching_overload_reports_each_overload() {
    let (commands, platform) = setup();
    let mut events = commands.subscribe();

    let outcome = commands.dispatch(guild_message("!add one two")).await;

    let failure = outcome.failure().expect("dispatch should fail");
    assert_eq!(failure.stage, InvocationStage::Resolved);
    assert_eq!(failure.command.as_deref(), Some("add"));
    match failure.error.as_ref() {
        CommandError::NoMatchingOverload { command, failures } => {
            assert_eq!(command, "add");
            assert_eq!(failures.len(), 2);
            assert!(matches!(
                failures[0].failure,
                FeasibilityFailure::Conversion(ref c) if c.parameter == "a" && c.token == "one"
            ));
            assert_eq!(
                failures[1].failure,
                FeasibilityFailure::TooManyArguments {
                    expected: 1,
                    supplied: 2
                }
            );
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(platform.sent_messages().is_empty());
    assert_eq!(commands.services().scopes_created(), 0);

    match events.recv().await.unwrap() {
        CommandEvent::Errored { stage, error, .. } => {
            assert_eq!(stage, InvocationStage::Resolved);
            assert_eq!(error.kind(), ErrorKind::NoMatchingOverload);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_user_disqualifies_overloads() {
    let (commands, _) = setup();
    let outcome = commands.dispatch(guild_message("!ban <@777> reason")).await;
    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error.kind(), ErrorKind::NoMatchingOverload);
    assert!(failure.error.diagnostic().contains("user 777 not found"));
}

#[tokio::test]
async fn test_body_error_becomes_execution_fault() {
    let (commands, _) = setup();
    let outcome = commands.dispatch(guild_message("!fail")).await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.stage, InvocationStage::Executing);
    match failure.error.as_ref() {
        CommandError::Execution { command, source } => {
            assert_eq!(command, "fail");
            assert_eq!(source.to_string(), "database unavailable");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_body_panic_becomes_execution_fault() {
    let (commands, _) = setup();
    let outcome = commands.dispatch(guild_message("!explode")).await;

    let failure = outcome.failure().unwrap();
    assert_eq!(failure.error.kind(), ErrorKind::CommandExecutionFault);
    assert!(failure.error.to_string().contains("command panicked: boom"));

    // The framework keeps working after a panicking body.
    assert!(commands.dispatch(guild_message("!add 1 2")).await.is_completed());
}

#[tokio::test]
async fn test_remainder_keeps_original_spacing_and_quotes() {
    let (commands, platform) = setup();
    commands
        .dispatch(guild_message("!echo   \"hi there\"  you"))
        .await;
    assert_eq!(replies(&platform), vec!["\"hi there\"  you"]);
}

#[tokio::test]
async fn test_mention_prefix_and_help() {
    let (commands, platform) = setup();

    let outcome = commands.dispatch(guild_message("<@99> add 2 3")).await;
    assert!(outcome.is_completed());
    assert_eq!(replies(&platform), vec!["5"]);

    let outcome = commands.dispatch(guild_message("!help ban")).await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Completed { overload: 1, .. }
    ));
    let help = replies(&platform);
    assert!(help[0].contains("!ban <user>\n"));
    assert!(help[0].contains("!ban <user> <reason...>"));

    commands.dispatch(guild_message("!h")).await;
    let index = replies(&platform);
    assert!(index[0].contains("!help, !h"));
    assert!(index[0].contains("!explode"));
}
