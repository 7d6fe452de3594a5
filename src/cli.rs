//! Command-line argument parsing for the `cnext` binary.

use commands_next::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Runs chat commands typed on stdin through the command framework.
#[derive(Parser, Debug)]
#[command(name = "cnext")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", env = "CNEXT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Command prefix (repeatable, replaces the configured prefixes)
    #[arg(short = 'p', long = "prefix", value_name = "PREFIX")]
    pub prefixes: Vec<String>,

    /// Send messages as direct messages instead of in the demo guild
    #[arg(long)]
    pub dm: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Message to send before reading input (repeatable)
    #[arg(short = 'e', long = "exec", value_name = "MESSAGE")]
    pub exec: Vec<String>,

    /// Path to a file with one message per line (use "-" for stdin)
    #[arg(long, value_name = "PATH", default_value = "-")]
    pub script: String,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if !self.prefixes.is_empty() {
            config.commands.prefixes = self.prefixes.clone();
        }
    }

    /// Returns the script path, or `None` when reading stdin.
    pub fn script_path(&self) -> Option<PathBuf> {
        match self.script.as_str() {
            "-" => None,
            path => Some(PathBuf::from(path)),
        }
    }
}
