//! In-memory platform for testing and the demo binary.
//!
//! Records every outgoing message and serves entity lookups from maps seeded
//! by the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::Platform;
use crate::entities::{Channel, Member, Message, MessageBuilder, Snowflake, User};
use crate::error::PlatformError;

/// A message captured by [`MockPlatform::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: Snowflake,
    pub message: MessageBuilder,
}

/// A platform that keeps everything in memory.
pub struct MockPlatform {
    author: User,
    users: Mutex<HashMap<Snowflake, User>>,
    members: Mutex<HashMap<(Snowflake, Snowflake), Member>>,
    channels: Mutex<HashMap<Snowflake, Channel>>,
    sent: Mutex<Vec<SentMessage>>,
    typing: Mutex<Vec<Snowflake>>,
    next_id: AtomicU64,
    member_fetches: AtomicUsize,
    fetch_delay: Option<Duration>,
    fail_sends: bool,
}

impl MockPlatform {
    /// Creates an empty mock platform.
    pub fn new() -> Self {
        Self {
            author: User {
                id: Snowflake(1),
                username: "mock-bot".to_string(),
                bot: true,
            },
            users: Mutex::new(HashMap::new()),
            members: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            typing: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1_000),
            member_fetches: AtomicUsize::new(0),
            fetch_delay: None,
            fail_sends: false,
        }
    }

    /// Makes every remote fetch sleep first, to widen race windows in tests.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// Makes `send_message` fail.
    pub fn with_failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub fn add_user(&self, user: User) {
        self.lock_users().insert(user.id, user);
    }

    pub fn add_member(&self, member: Member) {
        self.add_user(member.user.clone());
        self.lock_members()
            .insert((member.guild_id, member.user.id), member);
    }

    pub fn add_channel(&self, channel: Channel) {
        self.lock_channels().insert(channel.id, channel);
    }

    /// All messages sent so far.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.lock_sent().clone()
    }

    /// Drains and returns the messages sent so far.
    pub fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut *self.lock_sent())
    }

    /// Channels the typing indicator was triggered in.
    pub fn typing_channels(&self) -> Vec<Snowflake> {
        self.typing.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of remote member fetches performed.
    pub fn member_fetches(&self) -> usize {
        self.member_fetches.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn lock_users(&self) -> std::sync::MutexGuard<'_, HashMap<Snowflake, User>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_members(&self) -> std::sync::MutexGuard<'_, HashMap<(Snowflake, Snowflake), Member>> {
        self.members.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_channels(&self) -> std::sync::MutexGuard<'_, HashMap<Snowflake, Channel>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_sent(&self) -> std::sync::MutexGuard<'_, Vec<SentMessage>> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn send_message(
        &self,
        channel_id: Snowflake,
        message: MessageBuilder,
    ) -> Result<Message, PlatformError> {
        if self.fail_sends {
            return Err(PlatformError::request("mock send failure"));
        }
        if message.is_empty() {
            return Err(PlatformError::request("cannot send an empty message"));
        }

        let channel = self
            .lock_channels()
            .get(&channel_id)
            .cloned()
            .unwrap_or_else(|| Channel::direct(channel_id));
        let id = Snowflake(self.next_id.fetch_add(1, Ordering::SeqCst));
        let content = message.content.clone().unwrap_or_default();

        self.lock_sent().push(SentMessage {
            channel_id,
            message,
        });

        Ok(Message::new(id, channel, self.author.clone(), content))
    }

    async fn trigger_typing(&self, channel_id: Snowflake) -> Result<(), PlatformError> {
        self.typing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(channel_id);
        Ok(())
    }

    async fn fetch_user(&self, user_id: Snowflake) -> Result<Option<User>, PlatformError> {
        self.delay().await;
        Ok(self.lock_users().get(&user_id).cloned())
    }

    async fn fetch_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Option<Member>, PlatformError> {
        self.member_fetches.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        Ok(self.lock_members().get(&(guild_id, user_id)).cloned())
    }

    async fn fetch_channel(&self, channel_id: Snowflake) -> Result<Option<Channel>, PlatformError> {
        self.delay().await;
        Ok(self.lock_channels().get(&channel_id).cloned())
    }
}
