//! Concurrent dispatch tests.
//!
//! Invocations run on their own tasks and share the client's member cache.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use commands_next::entities::{Member, Snowflake, User};
use commands_next::platform::MockPlatform;
use commands_next::services::ServiceCollection;
use commands_next::{ArgType, Command, CommandContext, CommandHandler, Overload, Parameter};
use pretty_assertions::assert_eq;

use super::common::{framework, guild_message, replies, seeded_platform, GUILD_ID, INVOKER_ID};

/// Replies with the target member's display name.
struct Inspect;

#[async_trait]
impl CommandHandler for Inspect {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let member = ctx.args().member("target").expect("bound member");
        ctx.respond(member.display_name().to_string()).await?;
        Ok(())
    }
}

/// Reads the invoking member repeatedly and records how often it was resolved.
struct WhoAmI {
    resolutions: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl CommandHandler for WhoAmI {
    async fn execute(&self, ctx: &CommandContext) -> anyhow::Result<()> {
        let first = ctx.member().await?;
        let second = ctx.member().await?;
        let third = ctx.member().await?;
        assert_eq!(first, second);
        assert_eq!(second, third);

        self.resolutions
            .lock()
            .unwrap()
            .push(ctx.message_context().member_resolutions());
        ctx.respond(first.map(|m| m.user.username).unwrap_or_default())
            .await?;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invocations_share_member_cache() {
    let platform = seeded_platform(MockPlatform::new().with_fetch_delay(Duration::from_millis(20)));
    let commands = framework(
        platform.clone(),
        vec![Command::new("inspect")
            .overload(Overload::new(Inspect).param(Parameter::new("target", ArgType::Member)))],
        ServiceCollection::new().build(),
    );

    let handles: Vec<_> = (0..16)
        .map(|_| commands.spawn_dispatch(guild_message("!inspect <@!42>")))
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_completed());
    }

    let replies = replies(&platform);
    assert_eq!(replies.len(), 16);
    assert!(replies.iter().all(|name| name == "alice"));

    let cached = commands
        .client()
        .members()
        .get(Snowflake(GUILD_ID), Snowflake(42))
        .expect("member cached");
    assert_eq!(cached.user.username, "alice");
    assert_eq!(commands.client().members().len(), 1);

    // Once cached, further lookups never reach the platform.
    let fetches = platform.member_fetches();
    assert!(fetches >= 1 && fetches <= 16);
    commands.dispatch(guild_message("!inspect 42")).await;
    assert_eq!(platform.member_fetches(), fetches);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cache_keeps_first_inserted_member() {
    let platform = seeded_platform(MockPlatform::new());
    let commands = framework(
        platform,
        vec![Command::new("inspect")
            .overload(Overload::new(Inspect).param(Parameter::new("target", ArgType::Member)))],
        ServiceCollection::new().build(),
    );
    let cache = commands.client().members();

    let mut renamed = Member::new(User::new(42u64, "alice"), GUILD_ID);
    renamed.nickname = Some("ally".to_string());
    let stored = cache.insert(renamed.clone());
    assert_eq!(stored, renamed);

    let stored = cache.insert(Member::new(User::new(42u64, "alice"), GUILD_ID));
    assert_eq!(stored.nickname.as_deref(), Some("ally"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_member_resolved_at_most_once_per_invocation() {
    let platform = seeded_platform(MockPlatform::new().with_fetch_delay(Duration::from_millis(5)));
    let resolutions = Arc::new(Mutex::new(Vec::new()));
    let commands = framework(
        platform.clone(),
        vec![Command::new("whoami").overload(Overload::new(WhoAmI {
            resolutions: resolutions.clone(),
        }))],
        ServiceCollection::new().build(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| commands.spawn_dispatch(guild_message("!whoami")))
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap().is_completed());
    }

    assert_eq!(*resolutions.lock().unwrap(), vec![1; 8]);
    assert!(replies(&platform).iter().all(|name| name == "carol"));
    assert!(commands
        .client()
        .members()
        .get(Snowflake(GUILD_ID), Snowflake(INVOKER_ID))
        .is_some());
}
