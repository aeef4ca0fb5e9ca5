use std::time::Duration;

use client::ClientConfig;
use serde::Deserialize;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/esponja.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub timeout_ms: u64,
    pub session_path: String,
    /// Level for the `esponja` and `client` targets.
    pub level: String,
}

impl Default for Settings {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            base_url: client.base_url,
            timeout_ms: client.timeout_ms,
            session_path: client.session_path,
            level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn client(&self) -> ClientConfig {
        ClientConfig::new(self.base_url.clone())
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_session_path(self.session_path.clone())
    }
}

/// Flags shared by every subcommand; they win over file and environment.
#[derive(Debug, Default, clap::Args)]
pub struct ConfigArgs {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    config: Option<String>,
    /// Override the API base URL (e.g. http://127.0.0.1:3000/api/).
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Override the request timeout, in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    /// Override where the session is persisted.
    #[arg(long, global = true)]
    session_path: Option<String>,
    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

pub fn load(args: &ConfigArgs) -> Result<Settings> {
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("ESPONJA"));
    let mut settings: Settings = builder.build()?.try_deserialize()?;

    if let Some(base_url) = &args.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        settings.timeout_ms = timeout_ms;
    }
    if let Some(session_path) = &args.session_path {
        settings.session_path = session_path.clone();
    }
    if let Some(level) = &args.log_level {
        settings.level = level.clone();
    }

    Ok(settings)
}
