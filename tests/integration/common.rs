//! Shared fixtures for the integration tests.

use std::sync::Arc;

use commands_next::config::CommandsConfig;
use commands_next::entities::{Channel, Guild, Member, Message, User};
use commands_next::platform::{Client, MockPlatform};
use commands_next::services::ServiceProvider;
use commands_next::{Command, CommandsNext};

pub const BOT_ID: u64 = 99;
pub const GUILD_ID: u64 = 1;
pub const CHANNEL_ID: u64 = 2;
pub const INVOKER_ID: u64 = 10;

/// Seeds guild 1 with the invoker (10), alice (42) and bob (43).
pub fn seeded_platform(platform: MockPlatform) -> Arc<MockPlatform> {
    platform.add_channel(channel());
    platform.add_member(Member::new(User::new(INVOKER_ID, "carol"), GUILD_ID));
    platform.add_member(Member::new(User::new(42u64, "alice"), GUILD_ID));
    platform.add_member(Member::new(User::new(43u64, "bob"), GUILD_ID));
    Arc::new(platform)
}

pub fn channel() -> Channel {
    Channel::guild_text(CHANNEL_ID, "general", Guild::new(GUILD_ID, "home", INVOKER_ID))
}

/// A message from the invoker in the guild channel.
pub fn guild_message(content: &str) -> Message {
    Message::new(500u64, channel(), User::new(INVOKER_ID, "carol"), content)
}

/// Builds a framework over `platform` with the given commands and services.
pub fn framework(
    platform: Arc<MockPlatform>,
    commands: Vec<Command>,
    services: ServiceProvider,
) -> CommandsNext {
    let client = Client::new(User::new(BOT_ID, "bot"), platform);
    commands
        .into_iter()
        .fold(CommandsNext::builder(CommandsConfig::default()), |builder, command| {
            builder.command(command)
        })
        .services(services)
        .build(client)
        .expect("valid command set")
}

/// Contents of every message sent so far, draining the platform's outbox.
pub fn replies(platform: &MockPlatform) -> Vec<String> {
    platform
        .take_sent()
        .into_iter()
        .filter_map(|sent| sent.message.content)
        .collect()
}
