//! Configuration management for commands-next.
//!
//! [`CommandsConfig`] controls the dispatcher (prefixes, case sensitivity,
//! which messages are processed). [`Config`] is the TOML file read by the
//! `cnext` binary, which also describes the simulated bot and guild.

use crate::error::{AppError, RegistrationError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for the `cnext` binary.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Dispatcher settings.
    #[serde(default)]
    pub commands: CommandsConfig,

    /// Identity of the bot user.
    #[serde(default)]
    pub bot: BotConfig,

    /// Simulated guild, channel and invoking user.
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandsConfig {
    /// String prefixes, checked in order.
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// Whether a mention of the bot acts as a prefix.
    #[serde(default = "default_true")]
    pub enable_mention_prefix: bool,

    /// Whether command names are matched case-sensitively.
    #[serde(default)]
    pub case_sensitive: bool,

    /// Whether direct messages are processed.
    #[serde(default = "default_true")]
    pub enable_dms: bool,

    /// Whether messages from bot accounts are skipped.
    #[serde(default = "default_true")]
    pub ignore_bots: bool,

    /// Whether the built-in `help` command is registered.
    #[serde(default = "default_true")]
    pub enable_default_help: bool,

    /// Reply sent for unknown commands; `{name}` is replaced by the command name.
    #[serde(default)]
    pub unknown_command_notice: Option<String>,
}

fn default_prefixes() -> Vec<String> {
    vec!["!".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            enable_mention_prefix: true,
            case_sensitive: false,
            enable_dms: true,
            ignore_bots: true,
            enable_default_help: true,
            unknown_command_notice: None,
        }
    }
}

impl CommandsConfig {
    /// Checks that at least one way of addressing the bot is configured.
    pub fn validate(&self) -> Result<()> {
        self.check_prefixes()
            .map_err(|e| AppError::config(e.to_string()))
    }

    /// Prefix checks shared by config loading and `CommandsNextBuilder::build`.
    /// A blank prefix would match every message.
    pub fn check_prefixes(&self) -> std::result::Result<(), RegistrationError> {
        if self.prefixes.is_empty() && !self.enable_mention_prefix {
            return Err(RegistrationError::NoPrefixes);
        }
        if let Some(bad) = self.prefixes.iter().find(|p| p.trim().is_empty()) {
            return Err(RegistrationError::InvalidPrefix(bad.clone()));
        }
        Ok(())
    }

    /// Renders the unknown-command notice for `name`, if one is configured.
    pub fn unknown_command_reply(&self, name: &str) -> Option<String> {
        self.unknown_command_notice
            .as_ref()
            .map(|notice| notice.replace("{name}", name))
    }
}

/// Bot identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    #[serde(default = "default_bot_id")]
    pub id: u64,

    #[serde(default = "default_bot_name")]
    pub username: String,
}

fn default_bot_id() -> u64 {
    1000
}

fn default_bot_name() -> String {
    "cnext".to_string()
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            id: default_bot_id(),
            username: default_bot_name(),
        }
    }
}

/// The simulated environment lines typed into `cnext` come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemoConfig {
    #[serde(default = "default_guild_id")]
    pub guild_id: u64,

    #[serde(default = "default_guild_name")]
    pub guild_name: String,

    #[serde(default = "default_channel_id")]
    pub channel_id: u64,

    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    #[serde(default = "default_user_id")]
    pub user_id: u64,

    #[serde(default = "default_username")]
    pub username: String,
}

fn default_guild_id() -> u64 {
    1
}

fn default_guild_name() -> String {
    "demo".to_string()
}

fn default_channel_id() -> u64 {
    10
}

fn default_channel_name() -> String {
    "general".to_string()
}

fn default_user_id() -> u64 {
    100
}

fn default_username() -> String {
    "you".to_string()
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            guild_id: default_guild_id(),
            guild_name: default_guild_name(),
            channel_id: default_channel_id(),
            channel_name: default_channel_name(),
            user_id: default_user_id(),
            username: default_username(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("commands-next")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses and validates configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            AppError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.commands.validate()?;
        Ok(config)
    }
}
