//! Demo commands and the simulated environment for `cnext`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::Context as _;
use async_trait::async_trait;
use commands_next::commands::{ArgType, CommandContext, CommandHandler, CommandsNextBuilder};
use commands_next::config::Config;
use commands_next::entities::{Channel, Embed, Guild, Member, Message, User};
use commands_next::platform::MockPlatform;
use commands_next::services::{ServiceCollection, ServiceProvider};
use commands_next::{Command, Overload, Parameter};
use tracing::info;

/// Other members of the demo guild, addressable as `<@id>`.
const NEIGHBOURS: [(u64, &str); 2] = [(101, "alice"), (102, "bob")];

/// Seeds a mock platform with the configured guild, channel and users.
pub fn seed_platform(config: &Config) -> MockPlatform {
    let platform = MockPlatform::new();
    let demo = &config.demo;

    platform.add_channel(Channel::guild_text(demo.channel_id, &demo.channel_name, guild(config)));
    platform.add_member(Member::new(User::new(demo.user_id, &demo.username), demo.guild_id));
    for (id, name) in NEIGHBOURS {
        platform.add_member(Member::new(User::new(id, name), demo.guild_id));
    }
    platform
}

fn guild(config: &Config) -> Guild {
    Guild::new(config.demo.guild_id, &config.demo.guild_name, config.demo.user_id)
}

/// Wraps a typed line as a message from the demo user.
pub struct MessageFactory {
    next_id: AtomicU64,
    channel: Channel,
    author: User,
}

impl MessageFactory {
    pub fn new(config: &Config, direct: bool) -> Self {
        let demo = &config.demo;
        let channel = if direct {
            Channel::direct(demo.channel_id + 1)
        } else {
            Channel::guild_text(demo.channel_id, &demo.channel_name, guild(config))
        };
        Self {
            next_id: AtomicU64::new(1),
            channel,
            author: User::new(demo.user_id, &demo.username),
        }
    }

    pub fn message(&self, content: &str) -> Message {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Message::new(id, self.channel.clone(), self.author.clone(), content)
    }
}

/// Process-wide invocation counter.
#[derive(Debug, Default)]
pub struct VisitCounter(AtomicUsize);

/// Per-invocation audit record, closed when the scope is released.
#[derive(Debug)]
pub struct AuditEntry {
    started: Instant,
}

/// Services available to demo commands.
pub fn services() -> ServiceProvider {
    ServiceCollection::new()
        .add_singleton(VisitCounter::default())
        .add_scoped_with_release(
            |_| AuditEntry {
                started: Instant::now(),
            },
            |entry: &AuditEntry| {
                info!(elapsed_us = entry.started.elapsed().as_micros() as u64, "Audit entry closed");
            },
        )
        .build()
}

/// Registers the demo commands.
pub fn register(builder: CommandsNextBuilder) -> CommandsNextBuilder {
    builder
        .command(
            Command::new("ping")
                .description("Checks the bot is alive")
                .overload(Overload::new(Ping)),
        )
        .command(
            Command::new("say")
                .alias("echo")
                .description("Repeats text without pinging anyone")
                .overload(Overload::new(Say).param(Parameter::new("text", ArgType::String).remainder())),
        )
        .command(
            Command::new("add")
                .description("Adds two numbers")
                .module("Math")
                .overload(
                    Overload::new(AddIntegers)
                        .param(Parameter::new("a", ArgType::Integer))
                        .param(Parameter::new("b", ArgType::Integer)),
                )
                .overload(
                    Overload::new(AddFloats)
                        .param(Parameter::new("a", ArgType::Float))
                        .param(Parameter::new("b", ArgType::Float)),
                ),
        )
        .command(
            Command::new("ban")
                .description("Bans a member")
                .module("Moderation")
                .overload(Overload::new(Ban).param(Parameter::new("user", ArgType::User)))
                .overload(
                    Overload::new(Ban)
                        .description("with a reason")
                        .param(Parameter::new("user", ArgType::User))
                        .param(Parameter::new("reason", ArgType::String).remainder()),
                ),
        )
        .command(
            Command::new("whoami")
                .description("Shows how the bot sees you")
                .overload(Overload::new(WhoAmI)),
        )
        .command(
            Command::new("typing")
                .description("Shows the typing indicator")
                .overload(Overload::new(Typing)),
        )
        .command(
            Command::new("visits")
                .description("Counts command visits")
                .overload(Overload::new(Visits)),
        )
}

struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        ctx.respond("Pong!").await?;
        Ok(())
    }
}

struct Say;

#[async_trait]
impl CommandHandler for Say {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let text = ctx.args().str("text").unwrap_or_default().to_string();
        ctx.respond_with(|m| m.content(text).suppress_mentions(true)).await?;
        Ok(())
    }
}

struct AddIntegers;

#[async_trait]
impl CommandHandler for AddIntegers {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let a = ctx.args().i64("a").context("missing a")?;
        let b = ctx.args().i64("b").context("missing b")?;
        let sum = a.checked_add(b).context("integer overflow")?;
        ctx.respond(format!("{a} + {b} = {sum}")).await?;
        Ok(())
    }
}

struct AddFloats;

#[async_trait]
impl CommandHandler for AddFloats {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let a = ctx.args().f64("a").context("missing a")?;
        let b = ctx.args().f64("b").context("missing b")?;
        ctx.respond(format!("{a} + {b} = {}", a + b)).await?;
        Ok(())
    }
}

struct Ban;

#[async_trait]
impl CommandHandler for Ban {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let user = ctx.args().user("user").context("missing user")?;
        if user.id == ctx.user().id {
            anyhow::bail!("refusing to ban yourself");
        }

        let mut embed = Embed::new()
            .title("Member banned")
            .description(format!("{} was banned by {}", user.username, ctx.user().username))
            .color(0xE7_4C_3C);
        if let Some(reason) = ctx.args().str("reason") {
            embed = embed.field("Reason", reason, false);
        }
        ctx.respond_embed(embed).await?;
        Ok(())
    }
}

struct WhoAmI;

#[async_trait]
impl CommandHandler for WhoAmI {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let reply = match (ctx.guild(), ctx.member().await?) {
            (Some(guild), Some(member)) => format!(
                "You are {} ({}) in {}",
                member.display_name(),
                ctx.user().id,
                guild.name
            ),
            _ => format!("You are {} ({}) in a direct message", ctx.user().username, ctx.user().id),
        };
        ctx.respond(reply).await?;
        Ok(())
    }
}

struct Typing;

#[async_trait]
impl CommandHandler for Typing {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        ctx.trigger_typing().await?;
        ctx.respond("...done typing").await?;
        Ok(())
    }
}

struct Visits;

#[async_trait]
impl CommandHandler for Visits {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let counter = ctx
            .services()
            .get::<VisitCounter>()
            .context("visit counter not registered")?;
        let entry = ctx
            .services()
            .get::<AuditEntry>()
            .context("audit entry not registered")?;
        let visit = counter.0.fetch_add(1, Ordering::SeqCst) + 1;

        ctx.respond(format!(
            "Visit #{visit} (scope opened {}us ago)",
            entry.started.elapsed().as_micros()
        ))
        .await?;
        Ok(())
    }
}
