//! Argument type converters.
//!
//! A [`ConverterRegistry`] maps each [`ArgType`] to an [`ArgumentConverter`]
//! that turns a raw token into an [`ArgValue`]. Converters may consult the
//! invoking message (mentions, guild, member cache) but never mutate shared
//! state beyond the lookups they perform.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use super::context::MessageContext;
use crate::entities::{Channel, Member, Snowflake, User};

static USER_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<@!?(\d+)>$").expect("valid user mention regex"));

static CHANNEL_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<#(\d+)>$").expect("valid channel mention regex"));

/// Target type of a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    /// Any text.
    String,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean.
    Boolean,
    /// A platform user, by mention or id.
    User,
    /// A member of the invoking guild, by mention or id.
    Member,
    /// A channel, by mention or id.
    Channel,
    /// An application-defined type, converted by a registered custom converter.
    Custom(&'static str),
}

impl ArgType {
    /// Returns a short name for usage lines and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "number",
            Self::Boolean => "boolean",
            Self::User => "user",
            Self::Member => "member",
            Self::Channel => "channel",
            Self::Custom(name) => *name,
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A converted argument value.
#[derive(Clone)]
pub enum ArgValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    User(User),
    Member(Member),
    Channel(Channel),
    Custom(Arc<dyn Any + Send + Sync>),
}

impl ArgValue {
    /// Wraps an application-defined value.
    pub fn custom<T: Send + Sync + 'static>(value: T) -> Self {
        Self::Custom(Arc::new(value))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(n) => Some(*n),
            Self::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Self::User(u) => Some(u),
            Self::Member(m) => Some(&m.user),
            _ => None,
        }
    }

    pub fn as_member(&self) -> Option<&Member> {
        match self {
            Self::Member(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&Channel> {
        match self {
            Self::Channel(c) => Some(c),
            _ => None,
        }
    }

    /// Downcasts a custom value.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<&T> {
        match self {
            Self::Custom(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::Integer(n) => f.debug_tuple("Integer").field(n).finish(),
            Self::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Self::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Self::User(u) => f.debug_tuple("User").field(u).finish(),
            Self::Member(m) => f.debug_tuple("Member").field(m).finish(),
            Self::Channel(c) => f.debug_tuple("Channel").field(c).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::User(a), Self::User(b)) => a == b,
            (Self::Member(a), Self::Member(b)) => a == b,
            (Self::Channel(a), Self::Channel(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for ArgValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// Outcome of a single conversion: a value, or a human-readable reason.
pub type ConversionResult = Result<ArgValue, String>;

/// Converts a raw token into a typed value.
#[async_trait]
pub trait ArgumentConverter: Send + Sync {
    async fn convert(&self, token: &str, ctx: &MessageContext) -> ConversionResult;
}

/// Adapts a synchronous closure into an [`ArgumentConverter`].
pub struct FnConverter<F>(pub F);

#[async_trait]
impl<F> ArgumentConverter for FnConverter<F>
where
    F: Fn(&str, &MessageContext) -> ConversionResult + Send + Sync,
{
    async fn convert(&self, token: &str, ctx: &MessageContext) -> ConversionResult {
        (self.0)(token, ctx)
    }
}

pub struct StringConverter;

#[async_trait]
impl ArgumentConverter for StringConverter {
    async fn convert(&self, token: &str, _ctx: &MessageContext) -> ConversionResult {
        Ok(ArgValue::String(token.to_string()))
    }
}

pub struct IntegerConverter;

#[async_trait]
impl ArgumentConverter for IntegerConverter {
    async fn convert(&self, token: &str, _ctx: &MessageContext) -> ConversionResult {
        token
            .parse::<i64>()
            .map(ArgValue::Integer)
            .map_err(|_| "not a whole number".to_string())
    }
}

pub struct FloatConverter;

#[async_trait]
impl ArgumentConverter for FloatConverter {
    async fn convert(&self, token: &str, _ctx: &MessageContext) -> ConversionResult {
        match token.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(ArgValue::Float(n)),
            _ => Err("not a number".to_string()),
        }
    }
}

pub struct BooleanConverter;

#[async_trait]
impl ArgumentConverter for BooleanConverter {
    async fn convert(&self, token: &str, _ctx: &MessageContext) -> ConversionResult {
        match token.to_lowercase().as_str() {
            "true" | "yes" | "y" | "on" | "1" => Ok(ArgValue::Boolean(true)),
            "false" | "no" | "n" | "off" | "0" => Ok(ArgValue::Boolean(false)),
            _ => Err("expected yes/no, true/false or on/off".to_string()),
        }
    }
}

/// Parses `<@id>`, `<@!id>` or a bare id.
pub fn parse_user_id(token: &str) -> Option<Snowflake> {
    USER_MENTION_RE
        .captures(token)
        .and_then(|caps| caps.get(1))
        .map_or(Some(token), |m| Some(m.as_str()))
        .and_then(Snowflake::parse)
}

/// Parses `<#id>` or a bare id.
pub fn parse_channel_id(token: &str) -> Option<Snowflake> {
    CHANNEL_MENTION_RE
        .captures(token)
        .and_then(|caps| caps.get(1))
        .map_or(Some(token), |m| Some(m.as_str()))
        .and_then(Snowflake::parse)
}

pub struct UserConverter;

#[async_trait]
impl ArgumentConverter for UserConverter {
    async fn convert(&self, token: &str, ctx: &MessageContext) -> ConversionResult {
        let id = parse_user_id(token).ok_or_else(|| "not a user mention or id".to_string())?;

        if ctx.user().id == id {
            return Ok(ArgValue::User(ctx.user().clone()));
        }
        if let Some(user) = ctx.message().mentions.iter().find(|u| u.id == id) {
            return Ok(ArgValue::User(user.clone()));
        }

        match ctx.client().fetch_user(id).await {
            Ok(Some(user)) => Ok(ArgValue::User(user)),
            Ok(None) => Err(format!("user {id} not found")),
            Err(e) => Err(format!("user lookup failed: {e}")),
        }
    }
}

pub struct MemberConverter;

#[async_trait]
impl ArgumentConverter for MemberConverter {
    async fn convert(&self, token: &str, ctx: &MessageContext) -> ConversionResult {
        let guild_id = ctx
            .guild()
            .map(|g| g.id)
            .ok_or_else(|| "members can only be resolved in a guild".to_string())?;
        let id = parse_user_id(token).ok_or_else(|| "not a member mention or id".to_string())?;

        // The invoker goes through the memoized accessor.
        if ctx.user().id == id {
            return match ctx.member().await {
                Ok(Some(member)) => Ok(ArgValue::Member(member)),
                Ok(None) => Err("you are not a member of this guild".to_string()),
                Err(e) => Err(format!("member lookup failed: {e}")),
            };
        }

        match ctx.client().get_member(guild_id, id).await {
            Ok(Some(member)) => Ok(ArgValue::Member(member)),
            Ok(None) => Err(format!("member {id} not found in this guild")),
            Err(e) => Err(format!("member lookup failed: {e}")),
        }
    }
}

pub struct ChannelConverter;

#[async_trait]
impl ArgumentConverter for ChannelConverter {
    async fn convert(&self, token: &str, ctx: &MessageContext) -> ConversionResult {
        let id = parse_channel_id(token).ok_or_else(|| "not a channel mention or id".to_string())?;

        if ctx.channel().id == id {
            return Ok(ArgValue::Channel(ctx.channel().clone()));
        }

        match ctx.client().fetch_channel(id).await {
            Ok(Some(channel)) => Ok(ArgValue::Channel(channel)),
            Ok(None) => Err(format!("channel {id} not found")),
            Err(e) => Err(format!("channel lookup failed: {e}")),
        }
    }
}

/// Registry of converters keyed by target type.
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<ArgType, Arc<dyn ArgumentConverter>>,
}

impl ConverterRegistry {
    /// Creates a registry without any converters.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in converters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(ArgType::String, StringConverter);
        registry.register(ArgType::Integer, IntegerConverter);
        registry.register(ArgType::Float, FloatConverter);
        registry.register(ArgType::Boolean, BooleanConverter);
        registry.register(ArgType::User, UserConverter);
        registry.register(ArgType::Member, MemberConverter);
        registry.register(ArgType::Channel, ChannelConverter);
        registry
    }

    /// Registers (or replaces) the converter for `arg_type`.
    pub fn register<C>(&mut self, arg_type: ArgType, converter: C)
    where
        C: ArgumentConverter + 'static,
    {
        self.converters.insert(arg_type, Arc::new(converter));
    }

    pub fn contains(&self, arg_type: ArgType) -> bool {
        self.converters.contains_key(&arg_type)
    }

    pub fn get(&self, arg_type: ArgType) -> Option<&Arc<dyn ArgumentConverter>> {
        self.converters.get(&arg_type)
    }

    /// Converts `token` to `arg_type`.
    pub async fn convert(
        &self,
        arg_type: ArgType,
        token: &str,
        ctx: &MessageContext,
    ) -> ConversionResult {
        match self.converters.get(&arg_type) {
            Some(converter) => converter.convert(token, ctx).await,
            None => Err(format!("no converter registered for {arg_type}")),
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.converters.keys().map(ArgType::name).collect();
        types.sort_unstable();
        f.debug_struct("ConverterRegistry").field("types", &types).finish()
    }
}
