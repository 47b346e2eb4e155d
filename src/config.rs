//! Configuration for the Solo console, read from `solo.toml`.
//!
//! Layering: file → environment (`SOLO_PORT`, `SOLO_DB_PATH`,
//! `SOLO_LOG_LEVEL`) → CLI flags. Every section and key is optional.
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! dev_mode = false
//!
//! [database]
//! path = "solo.db"
//!
//! [blog]
//! editor_type = "CodeMirror-Markdown"
//!
//! [log]
//! level = "info"
//! format = "pretty"
//! dir = "logs"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::blog::page_service::DEFAULT_EDITOR_TYPE;
use crate::blog::server::ServerConfig;

pub const CONFIG_FILE: &str = "solo.toml";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format '{}'. Valid values: pretty, json", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind on all interfaces and allow any CORS origin
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("solo.db")
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogSection {
    /// Editor type seeded into the preferences on first start
    #[serde(default = "default_editor_type")]
    pub editor_type: String,
}

fn default_editor_type() -> String {
    DEFAULT_EDITOR_TYPE.to_string()
}

impl Default for BlogSection {
    fn default() -> Self {
        Self {
            editor_type: default_editor_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSection {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for daily rolling log files; stderr only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            dir: None,
        }
    }
}

/// Root of `solo.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoloToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub blog: BlogSection,
    #[serde(default)]
    pub log: LogSection,
}

impl SoloToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse solo.toml")
    }

    /// Load configuration from `path`, or defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize solo.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides on top of the file values.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("SOLO_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("Invalid SOLO_PORT '{}'", port))?;
        }
        if let Ok(path) = std::env::var("SOLO_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Ok(level) = std::env::var("SOLO_LOG_LEVEL") {
            self.log.level = level;
        }
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            db_path: self.database.path.clone(),
            dev_mode: self.server.dev_mode,
            editor_type: self.blog.editor_type.clone(),
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0: the OS will pick a random port".to_string());
        }
        if self.server.host.trim().is_empty() {
            warnings.push("server.host is empty".to_string());
        }
        if self.database.path.as_os_str().is_empty() {
            warnings.push("database.path is empty".to_string());
        }
        if self.blog.editor_type.trim().is_empty() {
            warnings.push(format!(
                "blog.editor_type is empty: new pages will use '{}'",
                DEFAULT_EDITOR_TYPE
            ));
        }
        if let Err(e) = EnvFilter::try_new(&self.log.level) {
            warnings.push(format!("Invalid log.level '{}': {}", self.log.level, e));
        }

        warnings
    }
}
