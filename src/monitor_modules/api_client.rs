//! Hypixel API client: one authenticated GET per tick.
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::config::{ConfigError, Endpoint, MonitorConfig, Target};
use crate::version::user_agent;

pub const API_KEY_HEADER: &str = "API-Key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MOJANG_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Malformed JSON response: {0}")]
    Decode(String),
    #[error("API reported failure: {cause}")]
    Rejected { cause: String },
}

impl FetchError {
    /// HTTP status behind the failure, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Network(e) => e.status().map(|s| s.as_u16()),
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Decode(_) | FetchError::Rejected { .. } => None,
        }
    }
}

/// Anything that can produce one JSON document per tick.
#[async_trait]
pub trait JsonSource: Send + Sync {
    async fn fetch(&self) -> Result<Value, FetchError>;
}

#[derive(Deserialize)]
struct MojangProfile {
    id: String,
}

pub struct HypixelClient {
    client: Client,
    url: String,
    api_key: String,
    params: Vec<(String, String)>,
}

impl HypixelClient {
    /// Builds the client for `config`, resolving the username to a UUID first
    /// when the endpoint needs one.
    pub async fn prepare(config: &MonitorConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(user_agent())
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let mut target = config.target.clone();
        if config.endpoint == Endpoint::SkyblockProfiles && target.uuid.is_none() {
            if let Some(username) = target.username.as_deref() {
                info!(username, "Resolving username to UUID...");
                let uuid = resolve_uuid(&client, &config.mojang_base_url, username).await?;
                info!(username, uuid = %uuid, "Resolved UUID.");
                target.uuid = Some(uuid);
            }
        }

        let params = request_params(&config.endpoint, &target, config)?;
        let url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.endpoint.path()
        );

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
            params,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

#[async_trait]
impl JsonSource for HypixelClient {
    async fn fetch(&self) -> Result<Value, FetchError> {
        debug!(url = %self.url, "Fetching.");
        let response = self
            .client
            .get(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&self.params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: failure_message(status, &body),
            });
        }

        let document: Value =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        if document.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(FetchError::Rejected {
                cause: cause_of(&document).unwrap_or_else(|| "unknown cause".to_string()),
            });
        }

        Ok(document)
    }
}

/// Hypixel puts a human readable reason in `cause` on most failures.
fn cause_of(document: &Value) -> Option<String> {
    document
        .get("cause")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn failure_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(cause_of)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        })
}

/// Query parameters for `endpoint`, given the (possibly resolved) target.
pub fn request_params(
    endpoint: &Endpoint,
    target: &Target,
    config: &MonitorConfig,
) -> Result<Vec<(String, String)>, ConfigError> {
    let missing = |requirement| ConfigError::MissingTarget {
        endpoint: endpoint.to_string(),
        requirement,
    };

    let params = match endpoint {
        Endpoint::Player => match (&target.username, &target.uuid) {
            (Some(name), _) => vec![("name".to_string(), name.clone())],
            (None, Some(uuid)) => vec![("uuid".to_string(), uuid.clone())],
            (None, None) => return Err(missing("a username or UUID")),
        },
        Endpoint::SkyblockProfiles => {
            let uuid = target
                .uuid
                .as_ref()
                .ok_or_else(|| missing("the profile owner's UUID"))?;
            vec![("uuid".to_string(), uuid.clone())]
        }
        Endpoint::SkyblockProfile => {
            let profile = config
                .profile
                .as_ref()
                .ok_or_else(|| missing("a profile id"))?;
            vec![("profile".to_string(), profile.clone())]
        }
        Endpoint::Other(_) => {
            let mut params: Vec<(String, String)> = config
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if let Some(uuid) = &target.uuid {
                if !config.params.contains_key("uuid") {
                    params.push(("uuid".to_string(), uuid.clone()));
                }
            }
            if let Some(name) = &target.username {
                if !config.params.contains_key("name") {
                    params.push(("name".to_string(), name.clone()));
                }
            }
            params
        }
    };

    Ok(params)
}

/// Looks a Minecraft username up in the Mojang profile API.
pub async fn resolve_uuid(
    client: &Client,
    mojang_base_url: &str,
    username: &str,
) -> Result<String, ConfigError> {
    let failed = |message: String| ConfigError::UsernameResolution {
        username: username.to_string(),
        message,
    };

    let url = format!(
        "{}/users/profiles/minecraft/{}",
        mojang_base_url.trim_end_matches('/'),
        username
    );
    let response = client
        .get(&url)
        .timeout(MOJANG_TIMEOUT)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;

    if response.status() != StatusCode::OK {
        return Err(failed(format!("Mojang API returned {}", response.status())));
    }

    let profile: MojangProfile = response.json().await.map_err(|e| failed(e.to_string()))?;
    if profile.id.is_empty() {
        return Err(failed("Mojang API returned an empty id".to_string()));
    }
    Ok(profile.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor_modules::config::PartialMonitorConfig;
    use std::collections::BTreeMap;

    fn config_for(endpoint: &str, username: Option<&str>, uuid: Option<&str>) -> MonitorConfig {
        let partial = PartialMonitorConfig {
            api_key: Some("key".into()),
            endpoint: Some(endpoint.into()),
            username: username.map(Into::into),
            uuid: uuid.map(Into::into),
            jmespath: Some("a".into()),
            profile: Some("profile-id".into()),
            ..Default::default()
        };
        MonitorConfig::from_layers(PartialMonitorConfig::default(), partial).unwrap()
    }

    #[test]
    fn test_player_prefers_username() {
        let config = config_for("player", Some("Steve"), Some("abc"));
        let params = request_params(&config.endpoint, &config.target, &config).unwrap();
        assert_eq!(params, vec![("name".to_string(), "Steve".to_string())]);
    }

    #[test]
    fn test_player_falls_back_to_uuid() {
        let config = config_for("player", None, Some("abc"));
        let params = request_params(&config.endpoint, &config.target, &config).unwrap();
        assert_eq!(params, vec![("uuid".to_string(), "abc".to_string())]);
    }

    #[test]
    fn test_profiles_needs_resolved_uuid() {
        let config = config_for("skyblock/profiles", Some("Steve"), None);
        let result = request_params(&config.endpoint, &config.target, &config);
        assert!(matches!(result, Err(ConfigError::MissingTarget { .. })));

        let resolved = Target {
            username: Some("Steve".into()),
            uuid: Some("abc".into()),
        };
        let params = request_params(&config.endpoint, &resolved, &config).unwrap();
        assert_eq!(params, vec![("uuid".to_string(), "abc".to_string())]);
    }

    #[test]
    fn test_profile_uses_profile_id() {
        let config = config_for("skyblock/profile", None, None);
        let params = request_params(&config.endpoint, &config.target, &config).unwrap();
        assert_eq!(params, vec![("profile".to_string(), "profile-id".to_string())]);
    }

    #[test]
    fn test_passthrough_keeps_configured_params() {
        let mut config = config_for("guild", Some("Steve"), Some("abc"));
        config.params = BTreeMap::from([("uuid".to_string(), "override".to_string())]);
        let params = request_params(&config.endpoint, &config.target, &config).unwrap();
        assert_eq!(
            params,
            vec![
                ("uuid".to_string(), "override".to_string()),
                ("name".to_string(), "Steve".to_string()),
            ]
        );
    }

    #[test]
    fn test_fetch_error_status() {
        let err = FetchError::Status {
            status: 403,
            message: "Invalid API key".into(),
        };
        assert_eq!(err.status(), Some(403));
        assert_eq!(FetchError::Decode("eof".into()).status(), None);
    }
}
