//! Platform collaborator interface.
//!
//! The framework does not talk to the network itself. Everything it needs from
//! the chat platform (sending replies, typing indicators, entity lookups) goes
//! through the [`Platform`] trait, and [`Client`] bundles a platform with the
//! bot identity and the shared member cache.

mod mock;

pub use mock::{MockPlatform, SentMessage};

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::entities::{Channel, Member, Message, MessageBuilder, Snowflake, User};
use crate::error::PlatformError;

/// Trait defining the operations the framework consumes from the platform.
///
/// All operations may suspend on network I/O.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Sends a message to a channel and returns the created message.
    async fn send_message(
        &self,
        channel_id: Snowflake,
        message: MessageBuilder,
    ) -> Result<Message, PlatformError>;

    /// Shows the typing indicator in a channel.
    async fn trigger_typing(&self, channel_id: Snowflake) -> Result<(), PlatformError>;

    /// Fetches a user by id.
    async fn fetch_user(&self, user_id: Snowflake) -> Result<Option<User>, PlatformError>;

    /// Fetches a guild member by id.
    async fn fetch_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<Member>, PlatformError>;

    /// Fetches a channel by id.
    async fn fetch_channel(&self, channel_id: Snowflake) -> Result<Option<Channel>, PlatformError>;
}

/// Concurrent member cache keyed by `(guild, user)`.
///
/// Values are cloned out so no shard guard is held across an `.await`.
#[derive(Debug, Default)]
pub struct MemberCache {
    members: DashMap<(Snowflake, Snowflake), Member>,
}

impl MemberCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        self.members
            .get(&(guild_id, user_id))
            .map(|entry| entry.value().clone())
    }

    /// Inserts a member unless another task already cached one, and returns
    /// the cached value. Concurrent inserts for the same key all observe the
    /// first stored member.
    pub fn insert(&self, member: Member) -> Member {
        self.members
            .entry((member.guild_id, member.user.id))
            .or_insert(member)
            .value()
            .clone()
    }

    /// Replaces a cached member, e.g. on a gateway member update.
    pub fn upsert(&self, member: Member) {
        self.members.insert((member.guild_id, member.user.id), member);
    }

    pub fn remove(&self, guild_id: Snowflake, user_id: Snowflake) -> Option<Member> {
        self.members
            .remove(&(guild_id, user_id))
            .map(|(_, member)| member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

struct ClientInner {
    current_user: User,
    platform: Arc<dyn Platform>,
    members: MemberCache,
}

/// Handle to the platform as seen by the command framework. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Creates a client for the bot account `current_user`.
    pub fn new(current_user: User, platform: Arc<dyn Platform>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                current_user,
                platform,
                members: MemberCache::new(),
            }),
        }
    }

    /// The bot's own account.
    pub fn current_user(&self) -> &User {
        &self.inner.current_user
    }

    pub fn platform(&self) -> &dyn Platform {
        self.inner.platform.as_ref()
    }

    pub fn members(&self) -> &MemberCache {
        &self.inner.members
    }

    pub async fn send_message(
        &self,
        channel_id: Snowflake,
        message: MessageBuilder,
    ) -> Result<Message, PlatformError> {
        self.inner.platform.send_message(channel_id, message).await
    }

    pub async fn trigger_typing(&self, channel_id: Snowflake) -> Result<(), PlatformError> {
        self.inner.platform.trigger_typing(channel_id).await
    }

    pub async fn fetch_user(&self, user_id: Snowflake) -> Result<Option<User>, PlatformError> {
        self.inner.platform.fetch_user(user_id).await
    }

    pub async fn fetch_channel(
        &self,
        channel_id: Snowflake,
    ) -> Result<Option<Channel>, PlatformError> {
        self.inner.platform.fetch_channel(channel_id).await
    }

    /// Looks a member up in the local cache, falling back to a remote fetch
    /// on miss. Fetched members are inserted into the cache.
    pub async fn get_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<Member>, PlatformError> {
        if let Some(member) = self.inner.members.get(guild_id, user_id) {
            return Ok(Some(member));
        }

        debug!(%guild_id, %user_id, "Member cache miss, fetching");
        let fetched = self.inner.platform.fetch_member(guild_id, user_id).await?;
        Ok(fetched.map(|member| self.inner.members.insert(member)))
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("current_user", &self.inner.current_user)
            .field("cached_members", &self.inner.members.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(guild: u64, user: u64, nick: &str) -> Member {
        let mut m = Member::new(User::new(user, format!("user{user}")), guild);
        m.nickname = Some(nick.to_string());
        m
    }

    #[test]
    fn test_cache_insert_keeps_first() {
        let cache = MemberCache::new();
        let first = cache.insert(member(1, 2, "first"));
        let second = cache.insert(member(1, 2, "second"));
        assert_eq!(first.nickname.as_deref(), Some("first"));
        assert_eq!(second.nickname.as_deref(), Some("first"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_upsert_and_remove() {
        let cache = MemberCache::new();
        cache.upsert(member(1, 2, "a"));
        cache.upsert(member(1, 2, "b"));
        assert_eq!(
            cache.get(Snowflake(1), Snowflake(2)).and_then(|m| m.nickname),
            Some("b".to_string())
        );
        assert!(cache.remove(Snowflake(1), Snowflake(2)).is_some());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_get_member_fetches_once_then_caches() {
        let platform = Arc::new(MockPlatform::new());
        platform.add_member(member(1, 2, "remote"));
        let client = Client::new(User::new(99u64, "bot"), platform.clone());

        let first = client.get_member(Snowflake(1), Snowflake(2)).await.unwrap();
        let second = client.get_member(Snowflake(1), Snowflake(2)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(platform.member_fetches(), 1);
        assert_eq!(client.members().len(), 1);
    }

    #[test]
    fn test_client_forwards_lookups() {
        let platform = Arc::new(MockPlatform::new());
        platform.add_user(User::new(7u64, "seven"));
        let client = Client::new(User::new(99u64, "bot"), platform.clone());

        let user = tokio_test::block_on(client.fetch_user(Snowflake(7)));
        assert_eq!(tokio_test::assert_ok!(user).map(|u| u.username), Some("seven".to_string()));

        let channel = tokio_test::block_on(client.fetch_channel(Snowflake(8)));
        assert_eq!(tokio_test::assert_ok!(channel), None);

        tokio_test::assert_ok!(tokio_test::block_on(client.trigger_typing(Snowflake(8))));
        assert_eq!(platform.typing_channels(), vec![Snowflake(8)]);
    }

    #[tokio::test]
    async fn test_get_member_missing() {
        let platform = Arc::new(MockPlatform::new());
        let client = Client::new(User::new(99u64, "bot"), platform.clone());
        let result = client.get_member(Snowflake(1), Snowflake(3)).await.unwrap();
        assert!(result.is_none());
        assert!(client.members().is_empty());
    }
}
