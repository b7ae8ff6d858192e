//! Environment- and CLI-driven configuration for the terminal client.

use std::time::Duration;

use clap::Parser;

use crate::assistant::services::SessionConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing API key: set LUDOBOT_API_KEY or OPENAI_API_KEY")]
    MissingApiKey,
    #[error("missing assistant id: set ASSISTANT_ID or pass --assistant-id")]
    MissingAssistantId,
}

/// Command-line options. Environment variables provide the defaults; flags
/// override them.
#[derive(Debug, Parser)]
#[command(name = "ludobot", about = "Terminal client for a hosted game-library assistant")]
pub struct Cli {
    /// Remote assistant to talk to (default: ASSISTANT_ID)
    #[arg(long)]
    pub assistant_id: Option<String>,

    /// Override the service base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Seconds to wait for the next stream event before failing the turn
    #[arg(long, default_value_t = 120)]
    pub event_timeout_secs: u64,

    /// Show tool log output while it streams instead of only at finalization
    #[arg(long)]
    pub live_tool_logs: bool,

    /// Disable the citation-formatting pass (markers are still stripped)
    #[arg(long)]
    pub no_citations: bool,

    /// Propagate remote-session delete failures on /reset instead of
    /// swallowing them
    #[arg(long)]
    pub unguarded_reset: bool,
}

/// Assembled runtime configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_key: String,
    pub assistant_id: String,
    pub title: String,
    pub base_url: Option<String>,
    pub event_timeout: Duration,
    pub live_tool_logs: bool,
    pub format_citations: bool,
    pub guarded_reset: bool,
}

impl AppConfig {
    pub fn from_env(cli: &Cli) -> Result<Self, ConfigError> {
        let api_key = std::env::var("LUDOBOT_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| ConfigError::MissingApiKey)?;
        let assistant_id = cli
            .assistant_id
            .clone()
            .or_else(|| std::env::var("ASSISTANT_ID").ok())
            .ok_or(ConfigError::MissingAssistantId)?;
        let title =
            std::env::var("ASSISTANT_TITLE").unwrap_or_else(|_| "Game Library Assistant".into());

        Ok(Self {
            api_key,
            assistant_id,
            title,
            base_url: cli.base_url.clone(),
            event_timeout: Duration::from_secs(cli.event_timeout_secs),
            live_tool_logs: cli.live_tool_logs,
            format_citations: !cli.no_citations,
            guarded_reset: !cli.unguarded_reset,
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            event_timeout: self.event_timeout,
            guarded_reset: self.guarded_reset,
            live_tool_logs: self.live_tool_logs,
            format_citations: self.format_citations,
            ..SessionConfig::new(self.assistant_id.clone())
        }
    }
}
