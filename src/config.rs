//! Process configuration from `INVITE_TRACKER_*` environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `INVITE_TRACKER_LISTEN_ADDR` | `0.0.0.0:3000` |
//! | `INVITE_TRACKER_STATE_DIR` | `./state` |
//! | `INVITE_TRACKER_WEBHOOK_SECRET` | required |
//! | `INVITE_TRACKER_API_BASE` | `https://discord.com/api/v10` |
//! | `INVITE_TRACKER_BOT_TOKEN` | required |
//! | `INVITE_TRACKER_REFRESH_INTERVAL_MINS` | `10` |
//! | `INVITE_TRACKER_FAKE_THRESHOLD_MINS` | `30` |
//! | `INVITE_TRACKER_DEDUP_TTL_SECS` | `10` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::engine::EngineConfig;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_STATE_DIR: &str = "./state";
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

const ENV_LISTEN_ADDR: &str = "INVITE_TRACKER_LISTEN_ADDR";
const ENV_STATE_DIR: &str = "INVITE_TRACKER_STATE_DIR";
const ENV_WEBHOOK_SECRET: &str = "INVITE_TRACKER_WEBHOOK_SECRET";
const ENV_API_BASE: &str = "INVITE_TRACKER_API_BASE";
const ENV_BOT_TOKEN: &str = "INVITE_TRACKER_BOT_TOKEN";
const ENV_REFRESH_INTERVAL_MINS: &str = "INVITE_TRACKER_REFRESH_INTERVAL_MINS";
const ENV_FAKE_THRESHOLD_MINS: &str = "INVITE_TRACKER_FAKE_THRESHOLD_MINS";
const ENV_DEDUP_TTL_SECS: &str = "INVITE_TRACKER_DEDUP_TTL_SECS";

/// Errors that can occur loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Everything the binary needs to start.
#[derive(Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub state_dir: PathBuf,
    pub webhook_secret: String,
    pub api_base: String,
    pub bot_token: String,
    pub engine: EngineConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("state_dir", &self.state_dir)
            .field("api_base", &self.api_base)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &'static str| present(name).ok_or(ConfigError::Missing(name));

        let refresh_mins: u64 = parse_or(&present, ENV_REFRESH_INTERVAL_MINS, 10)?;
        let fake_mins: i64 = parse_or(&present, ENV_FAKE_THRESHOLD_MINS, 30)?;
        let dedup_secs: i64 = parse_or(&present, ENV_DEDUP_TTL_SECS, 10)?;

        if refresh_mins == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_REFRESH_INTERVAL_MINS,
                value: refresh_mins.to_string(),
            });
        }
        if fake_mins < 0 {
            return Err(ConfigError::Invalid {
                name: ENV_FAKE_THRESHOLD_MINS,
                value: fake_mins.to_string(),
            });
        }
        if dedup_secs < 0 {
            return Err(ConfigError::Invalid {
                name: ENV_DEDUP_TTL_SECS,
                value: dedup_secs.to_string(),
            });
        }

        let listen_addr = match present(ENV_LISTEN_ADDR) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: ENV_LISTEN_ADDR,
                value,
            })?,
            None => DEFAULT_LISTEN_ADDR.parse().map_err(|_| ConfigError::Invalid {
                name: ENV_LISTEN_ADDR,
                value: DEFAULT_LISTEN_ADDR.to_string(),
            })?,
        };

        Ok(Config {
            listen_addr,
            state_dir: present(ENV_STATE_DIR)
                .unwrap_or_else(|| DEFAULT_STATE_DIR.to_string())
                .into(),
            webhook_secret: required(ENV_WEBHOOK_SECRET)?,
            api_base: present(ENV_API_BASE)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            bot_token: required(ENV_BOT_TOKEN)?,
            engine: EngineConfig::default()
                .with_refresh_interval(Duration::from_secs(refresh_mins * 60))
                .with_fake_threshold(chrono::Duration::minutes(fake_mins))
                .with_dedup_ttl(chrono::Duration::seconds(dedup_secs)),
        })
    }

    /// Path of the settings file under the state directory.
    pub fn settings_path(&self) -> PathBuf {
        self.state_dir.join("settings.json")
    }
}

fn parse_or<T: FromStr>(
    present: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T> {
    match present(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
