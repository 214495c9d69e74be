use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::version::VERSION;

pub const DEFAULT_BASE_URL: &str = "https://api.hypixel.net";
pub const DEFAULT_MOJANG_BASE_URL: &str = "https://api.mojang.com";
pub const DEFAULT_INTERVAL_SECS: u64 = 300;
// Hypixel rate-limits keys; anything shorter than this tends to get throttled.
const RECOMMENDED_MIN_INTERVAL_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Hypixel API key is required (--api-key, HYPIXEL_API_KEY or `api_key` in the config file)")]
    MissingApiKey,
    #[error("Endpoint `{endpoint}` requires {requirement}")]
    MissingTarget {
        endpoint: String,
        requirement: &'static str,
    },
    #[error("A JMESPath query is required (--query or `jmespath` in the config file)")]
    MissingQuery,
    #[error("Poll interval must be a positive number of seconds")]
    InvalidInterval,
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file at {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Invalid query expression `{expression}`: {message}")]
    InvalidQuery { expression: String, message: String },
    #[error("Failed to resolve username `{username}` to a UUID: {message}")]
    UsernameResolution { username: String, message: String },
    #[error("Query parameter `{key}` must be a string, number or boolean")]
    InvalidParam { key: String },
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Hypixel endpoint to poll. Unknown names are passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Endpoint {
    #[default]
    Player,
    SkyblockProfiles,
    SkyblockProfile,
    Other(String),
}

impl Endpoint {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().trim_matches('/') {
            "player" => Endpoint::Player,
            "skyblock/profiles" => Endpoint::SkyblockProfiles,
            "skyblock/profile" => Endpoint::SkyblockProfile,
            other => Endpoint::Other(other.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Endpoint::Player => "player",
            Endpoint::SkyblockProfiles => "skyblock/profiles",
            Endpoint::SkyblockProfile => "skyblock/profile",
            Endpoint::Other(path) => path,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// The player being watched. At least one of the two is set once validated,
/// except for passthrough endpoints which may not need a player at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub username: Option<String>,
    pub uuid: Option<String>,
}

#[derive(Parser, Debug, Default)]
#[command(
    name = "hypixel-watch",
    version = VERSION,
    about = "Monitor a value from the Hypixel API and notify on change"
)]
pub struct CliArgs {
    /// Hypixel API key
    #[arg(short = 'k', long, env = "HYPIXEL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Minecraft username to monitor (resolved to a UUID when the endpoint needs one)
    #[arg(short, long)]
    pub username: Option<String>,

    /// Minecraft UUID to monitor
    #[arg(long)]
    pub uuid: Option<String>,

    /// Endpoint to call: player, skyblock/profiles, skyblock/profile or any other path
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// JMESPath expression selecting the value to monitor, e.g. player.networkExp
    #[arg(short = 'j', long = "query", visible_alias = "jmespath")]
    pub query: Option<String>,

    /// Poll interval in seconds (default 300)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Path to a TOML or JSON config file; CLI flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show desktop notifications when the value changes
    #[arg(long)]
    pub notify: bool,

    /// SkyBlock profile id, used by the skyblock/profile endpoint
    #[arg(long)]
    pub profile: Option<String>,

    /// Override the Hypixel API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Directory for JSON log files with daily rotation
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl CliArgs {
    /// Loads `.env` (from `env_file`, or the usual lookup when `None`) into
    /// the process environment and then parses `args`, so `HYPIXEL_API_KEY`
    /// set there is seen by the `--api-key` fallback. Existing variables win.
    pub fn parse_with_env_file<I, T>(env_file: Option<&Path>, args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        // A missing `.env` is normal.
        let _ = match env_file {
            Some(path) => dotenv::from_path(path),
            None => dotenv::dotenv().map(|_| ()),
        };
        Self::try_parse_from(args)
    }

    fn to_partial(&self) -> PartialMonitorConfig {
        PartialMonitorConfig {
            api_key: self.api_key.clone(),
            username: self.username.clone(),
            uuid: self.uuid.clone(),
            endpoint: self.endpoint.clone(),
            jmespath: self.query.clone(),
            interval: self.interval,
            // A bare flag can only switch notifications on.
            notify: self.notify.then_some(true),
            profile: self.profile.clone(),
            params: None,
            base_url: self.base_url.clone(),
            mojang_base_url: None,
        }
    }
}

/// One configuration layer. Every field is optional so layers can be merged.
#[derive(Deserialize, Default, Debug, Clone)]
pub struct PartialMonitorConfig {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub uuid: Option<String>,
    pub endpoint: Option<String>,
    #[serde(alias = "query")]
    pub jmespath: Option<String>,
    pub interval: Option<u64>,
    pub notify: Option<bool>,
    pub profile: Option<String>,
    pub params: Option<BTreeMap<String, Value>>,
    pub base_url: Option<String>,
    pub mojang_base_url: Option<String>,
}

/// Query parameters may be written as any JSON/TOML scalar; they travel as text.
fn stringify_params(params: BTreeMap<String, Value>) -> Result<BTreeMap<String, String>, ConfigError> {
    params
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(ConfigError::InvalidParam { key }),
            };
            Ok((key, text))
        })
        .collect()
}

impl PartialMonitorConfig {
    /// Reads a config file. Files ending in `.json` are parsed as JSON,
    /// everything else as TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!(path = ?path, "Loading config file.");
        let contents = fs::read_to_string(path).map_err(|source| {
            error!(path = ?path, error = %source, "Failed to read config file.");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed: Result<Self, String> = if is_json {
            serde_json::from_str(&contents).map_err(|e| e.to_string())
        } else {
            toml::from_str(&contents).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| {
            error!(path = ?path, error = %message, "Failed to parse config file.");
            ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            }
        })
    }

    /// Layers `over` on top of `self`; values present in `over` win.
    pub fn overlay(self, over: PartialMonitorConfig) -> Self {
        Self {
            api_key: over.api_key.or(self.api_key),
            username: over.username.or(self.username),
            uuid: over.uuid.or(self.uuid),
            endpoint: over.endpoint.or(self.endpoint),
            jmespath: over.jmespath.or(self.jmespath),
            interval: over.interval.or(self.interval),
            notify: over.notify.or(self.notify),
            profile: over.profile.or(self.profile),
            params: over.params.or(self.params),
            base_url: over.base_url.or(self.base_url),
            mojang_base_url: over.mojang_base_url.or(self.mojang_base_url),
        }
    }
}

/// Validated, immutable monitor configuration.
#[derive(Clone)]
pub struct MonitorConfig {
    pub api_key: String,
    pub target: Target,
    pub endpoint: Endpoint,
    pub profile: Option<String>,
    pub params: BTreeMap<String, String>,
    pub query: String,
    pub interval: Duration,
    pub notify: bool,
    pub base_url: String,
    pub mojang_base_url: String,
}

impl fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("api_key", &"<redacted>")
            .field("target", &self.target)
            .field("endpoint", &self.endpoint)
            .field("profile", &self.profile)
            .field("params", &self.params)
            .field("query", &self.query)
            .field("interval", &self.interval)
            .field("notify", &self.notify)
            .field("base_url", &self.base_url)
            .field("mojang_base_url", &self.mojang_base_url)
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl MonitorConfig {
    /// Builds the configuration from the command line, reading the config
    /// file it points at (if any). CLI values override file values.
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let file_config = match &args.config {
            Some(path) => PartialMonitorConfig::from_file(path)?,
            None => PartialMonitorConfig::default(),
        };

        let config = Self::from_layers(file_config, args.to_partial())?;
        info!(config = ?config, "Loaded config successfully.");
        Ok(config)
    }

    pub fn from_layers(
        file: PartialMonitorConfig,
        cli: PartialMonitorConfig,
    ) -> Result<Self, ConfigError> {
        let merged = file.overlay(cli);

        let api_key = non_empty(merged.api_key).ok_or(ConfigError::MissingApiKey)?;
        let query = non_empty(merged.jmespath).ok_or(ConfigError::MissingQuery)?;

        let interval_secs = merged.interval.unwrap_or(DEFAULT_INTERVAL_SECS);
        if interval_secs == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if interval_secs < RECOMMENDED_MIN_INTERVAL_SECS {
            warn!(
                interval_secs,
                recommended_min_secs = RECOMMENDED_MIN_INTERVAL_SECS,
                "Poll interval is very short and may hit API rate limits."
            );
        }

        let endpoint = non_empty(merged.endpoint)
            .map(|raw| Endpoint::parse(&raw))
            .unwrap_or_default();
        let target = Target {
            username: non_empty(merged.username),
            uuid: non_empty(merged.uuid),
        };
        let profile = non_empty(merged.profile);

        match &endpoint {
            Endpoint::Player if target.username.is_none() && target.uuid.is_none() => {
                return Err(ConfigError::MissingTarget {
                    endpoint: endpoint.to_string(),
                    requirement: "a username or UUID",
                });
            }
            Endpoint::SkyblockProfiles if target.username.is_none() && target.uuid.is_none() => {
                return Err(ConfigError::MissingTarget {
                    endpoint: endpoint.to_string(),
                    requirement: "the profile owner's UUID (or a username to resolve)",
                });
            }
            Endpoint::SkyblockProfile if profile.is_none() => {
                return Err(ConfigError::MissingTarget {
                    endpoint: endpoint.to_string(),
                    requirement: "a profile id (--profile or `profile` in the config file)",
                });
            }
            _ => {}
        }

        let params = stringify_params(merged.params.unwrap_or_default())?;

        Ok(Self {
            api_key,
            target,
            endpoint,
            profile,
            params,
            query,
            interval: Duration::from_secs(interval_secs),
            notify: merged.notify.unwrap_or(false),
            base_url: non_empty(merged.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            mojang_base_url: non_empty(merged.mojang_base_url)
                .unwrap_or_else(|| DEFAULT_MOJANG_BASE_URL.to_string()),
        })
    }
}
