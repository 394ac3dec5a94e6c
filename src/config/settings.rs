//! Application settings loaded from config.toml
//!
//! Every section is optional. A missing file yields the defaults, so a bare checkout
//! starts without any configuration. `PLAN_BUDDY_BIND` and `PLAN_BUDDY_PORT` override
//! the `[server]` section.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Invitation workflow settings
    #[serde(default)]
    pub invites: InviteSettings,
    /// Notification feed settings
    #[serde(default)]
    pub notifications: NotificationSettings,
}

/// `[server]` section
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Address to bind the listener to
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

/// `[invites]` section
#[derive(Debug, Clone, Deserialize)]
pub struct InviteSettings {
    /// Days until a pending invite lapses; `None` means invites never expire
    #[serde(default = "default_invite_ttl_days")]
    pub ttl_days: Option<i64>,
}

impl Default for InviteSettings {
    fn default() -> Self {
        Self {
            ttl_days: default_invite_ttl_days(),
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
const fn default_invite_ttl_days() -> Option<i64> {
    Some(7)
}

impl InviteSettings {
    /// The invite lifetime as a duration, if invites expire at all.
    #[must_use]
    pub fn ttl(&self) -> Option<chrono::Duration> {
        self.ttl_days
            .filter(|days| *days > 0)
            .map(chrono::Duration::days)
    }
}

/// `[notifications]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationSettings {
    /// Read notifications older than this many days are pruned at startup
    pub retention_days: Option<i64>,
}

/// Parses settings from a TOML string.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from a TOML file, falling back to defaults when it does not exist.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed, or if an
/// environment override is malformed.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let mut settings = if path.exists() {
        debug!("Loading settings from {:?}", path);
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read config file {}: {e}", path.display()),
        })?;
        parse_settings(&contents)?
    } else {
        info!("No config file at {:?}, using defaults", path);
        Settings::default()
    };

    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Loads settings from the default location (./config.toml)
pub fn load_default_settings() -> Result<Settings> {
    load_settings("config.toml")
}

fn apply_env_overrides(settings: &mut Settings) -> Result<()> {
    if let Ok(bind) = std::env::var("PLAN_BUDDY_BIND") {
        settings.server.bind = bind;
    }
    if let Ok(port) = std::env::var("PLAN_BUDDY_PORT") {
        settings.server.port = port.parse().map_err(|e| Error::Config {
            message: format!("PLAN_BUDDY_PORT '{port}' is not a valid port: {e}"),
        })?;
    }
    Ok(())
}
