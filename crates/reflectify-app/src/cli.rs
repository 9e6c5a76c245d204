//! CLI argument definitions for the Reflectify terminal front-end.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use reflectify_core::Mood;
use std::path::PathBuf;

/// Reflectify: empathetic replies, mood-aware chat and content safety analysis.
#[derive(Parser, Debug)]
#[command(name = "reflectify", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Use canned offline replies instead of the Gemini API.
    #[arg(long = "mock", global = true)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Share how you feel and get a supportive reply.
    Express {
        /// What you want to say. Read from stdin when omitted.
        text: Vec<String>,
    },
    /// Analyze a piece of content for harmful language.
    Analyze {
        /// Content to analyze. Read from stdin when omitted.
        text: Vec<String>,

        /// Ask again up to this many times when the reply is unusable.
        #[arg(long = "retries", default_value_t = 0)]
        retries: u32,
    },
    /// Start a mood-aware conversation (one message per line).
    Chat {
        /// How you feel right now: happy, neutral or sad.
        #[arg(short = 'm', long = "mood")]
        mood: Mood,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > REFLECTIFY_CONFIG env var > platform default (~/.reflectify/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("REFLECTIFY_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > RUST_LOG env var > config file value > "info".
    pub fn resolve_log_level(&self, config_level: Option<&str>) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Ok(directive) = std::env::var("RUST_LOG") {
            if !directive.trim().is_empty() {
                return directive;
            }
        }
        match config_level {
            Some(level) if !level.trim().is_empty() => level.to_string(),
            _ => "info".to_string(),
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".reflectify").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".reflectify").join("config.toml");
    }
    PathBuf::from("config.toml")
}

/// One line typed during a chat session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatInput {
    /// A message for the assistant.
    Say(String),
    /// `/mood <mood>`: start over with a new mood.
    Mood(String),
    /// `/reset`: discard the conversation.
    Reset,
    /// `/quit` or `/exit`.
    Quit,
    /// A blank line.
    Blank,
    /// Anything else starting with `/`.
    Unknown(String),
}

impl ChatInput {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatInput::Blank;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ChatInput::Say(line.to_string());
        };

        let mut parts = command.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default();
        let arg = parts.next().map(str::trim).unwrap_or_default();
        match name {
            "quit" | "exit" => ChatInput::Quit,
            "reset" => ChatInput::Reset,
            "mood" => ChatInput::Mood(arg.to_string()),
            _ => ChatInput::Unknown(name.to_string()),
        }
    }
}
