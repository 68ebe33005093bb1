pub mod api;
pub mod deliveries;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod parser;
pub mod utils;
pub mod webhook;

use chrono::{DateTime, Utc};
use deliveries::{DEFAULT_MAX_DELIVERIES, Delivery, DeliveryStore};
use error::{GatewayError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{Mutex, broadcast};
use url::Url;
use webhook::Provider;

pub use error::WebhookError;
pub use parser::{parse_webhook, parse_webhook_with_limit};
pub use webhook::{CanonicalEvent, EventKind, RepositoryIdentity};

const DELIVERY_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub endpoint: Vec<EndpointConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Externally reachable base URL, used to build hook registration payloads
    pub public_url: Option<Url>,
    pub max_body_bytes: usize,
    pub max_deliveries: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            public_url: None,
            max_body_bytes: parser::DEFAULT_BODY_LIMIT,
            max_deliveries: DEFAULT_MAX_DELIVERIES,
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct EndpointConfig {
    pub name: String,
    pub provider: Provider,
    pub webhook_secret: Option<String>,
}

impl EndpointConfig {
    /// Secret bytes to validate deliveries against; empty means open mode.
    pub fn secret_bytes(&self) -> &[u8] {
        self.webhook_secret
            .as_deref()
            .map(str::as_bytes)
            .unwrap_or_default()
    }

    /// Returns true if a valid (non-empty) webhook_secret is set.
    pub fn has_valid_secret(&self) -> bool {
        !self.secret_bytes().is_empty()
    }

    /// URL the provider should deliver to, relative to the public base URL.
    pub fn payload_url(&self, public_url: &Url) -> Result<Url> {
        public_url
            .join(&format!("webhook/{}", self.name))
            .map_err(|e| GatewayError::ConfigError(format!("Invalid public_url: {}", e)))
    }
}

// Secrets stay out of logs
impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("has_secret", &self.has_valid_secret())
            .finish()
    }
}

impl GatewayConfig {
    /// Parses and validates a TOML configuration document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: GatewayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for endpoint in &self.endpoint {
            if endpoint.name.is_empty() {
                return Err(GatewayError::ConfigError(
                    "Endpoint name must not be empty".to_string(),
                ));
            }
            if !names.insert(endpoint.name.as_str()) {
                return Err(GatewayError::ConfigError(format!(
                    "Duplicate endpoint name '{}'",
                    endpoint.name
                )));
            }
        }
        Ok(())
    }
}

/// Load and parse the configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<GatewayConfig> {
    let path = path.as_ref();
    let config_str = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    GatewayConfig::from_toml(&config_str)
}

/// Re-read the configuration file from disk
pub async fn reload_config(path: impl AsRef<Path>) -> Result<GatewayConfig> {
    let path = path.as_ref();
    let config_str = tokio::fs::read_to_string(path).await?;
    GatewayConfig::from_toml(&config_str)
}

pub struct AppState {
    pub config: RwLock<GatewayConfig>,
    pub config_path: PathBuf,
    pub deliveries: Mutex<DeliveryStore>,
    pub delivery_events: broadcast::Sender<Delivery>,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: GatewayConfig, config_path: PathBuf) -> Self {
        let (delivery_events, _) = broadcast::channel(DELIVERY_CHANNEL_CAPACITY);
        Self {
            deliveries: Mutex::new(DeliveryStore::new(config.server.max_deliveries)),
            config: RwLock::new(config),
            config_path,
            delivery_events,
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Read access to the current config. The guard must not be held across
    /// an await point.
    pub fn config(&self) -> RwLockReadGuard<'_, GatewayConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swaps in a reloaded config and resizes the delivery log to match
    pub async fn replace_config(&self, new_config: GatewayConfig) {
        let max_deliveries = new_config.server.max_deliveries;
        {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            *config = new_config;
        }
        self.deliveries
            .lock()
            .await
            .set_max_deliveries(max_deliveries);
    }

    /// Store a delivery and notify stream subscribers
    pub async fn record_delivery(&self, delivery: Delivery) {
        // No subscribers is fine
        let _ = self.delivery_events.send(delivery.clone());
        self.deliveries.lock().await.record(delivery);
    }
}

pub type SharedState = Arc<AppState>;

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        [server]
        public_url = "https://ci.example.com/"
        max_body_bytes = 2048

        [[endpoint]]
        name = "acme-cloud"
        provider = "bitbucket-cloud"
        webhook_secret = "s3cret"

        [[endpoint]]
        name = "acme-gh"
        provider = "github"
    "#;

    #[test]
    fn parses_endpoints() {
        let config = GatewayConfig::from_toml(CONFIG).unwrap();
        assert_eq!(config.server.max_body_bytes, 2048);
        assert_eq!(config.server.max_deliveries, DEFAULT_MAX_DELIVERIES);
        assert_eq!(config.endpoint.len(), 2);
        assert_eq!(config.endpoint[0].provider, Provider::BitbucketCloud);
        assert_eq!(config.endpoint[0].secret_bytes(), b"s3cret");
        assert!(!config.endpoint[1].has_valid_secret());
    }

    #[test]
    fn empty_config_is_valid() {
        let config = GatewayConfig::from_toml("").unwrap();
        assert!(config.endpoint.is_empty());
        assert_eq!(config.server.max_body_bytes, parser::DEFAULT_BODY_LIMIT);
    }

    #[test]
    fn duplicate_endpoint_names_are_rejected() {
        let config = r#"
            [[endpoint]]
            name = "dup"
            provider = "gitlab"

            [[endpoint]]
            name = "dup"
            provider = "github"
        "#;
        assert!(matches!(
            GatewayConfig::from_toml(config),
            Err(GatewayError::ConfigError(_))
        ));
    }

    #[test]
    fn unknown_provider_is_a_parse_error() {
        let config = r#"
            [[endpoint]]
            name = "x"
            provider = "sourcehut"
        "#;
        assert!(matches!(
            GatewayConfig::from_toml(config),
            Err(GatewayError::TomlParseError(_))
        ));
    }

    #[test]
    fn debug_output_hides_secret() {
        let config = GatewayConfig::from_toml(CONFIG).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("has_secret: true"));
    }

    #[tokio::test]
    async fn replacing_config_resizes_delivery_log() {
        let state = AppState::new(GatewayConfig::from_toml(CONFIG).unwrap(), PathBuf::new());
        for _ in 0..3 {
            state
                .record_delivery(Delivery::new(
                    "acme-gh".to_string(),
                    Provider::GitHub,
                    Some("ping".to_string()),
                    deliveries::DeliveryOutcome::Ignored,
                ))
                .await;
        }

        let reloaded = "[server]\nmax_deliveries = 1\n";
        state
            .replace_config(GatewayConfig::from_toml(reloaded).unwrap())
            .await;

        assert_eq!(state.config().server.max_deliveries, 1);
        let deliveries = state.deliveries.lock().await;
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries.max_deliveries(), 1);
    }

    #[test]
    fn payload_url_joins_endpoint_name() {
        let config = GatewayConfig::from_toml(CONFIG).unwrap();
        let base = config.server.public_url.clone().unwrap();
        let url = config.endpoint[0].payload_url(&base).unwrap();
        assert_eq!(url.as_str(), "https://ci.example.com/webhook/acme-cloud");
    }
}
