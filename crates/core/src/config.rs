use crate::error::{AffiliateError, AffiliateResult};
use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `AFFILIATE_ENGINE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub personalization: PersonalizationConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Prepended to every key written to Redis, e.g. `affiliate:`.
    #[serde(default)]
    pub key_prefix: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Value of the `source` query parameter appended to click redirects.
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    #[serde(default = "default_geo")]
    pub default_geo: String,
    /// Expire click records after this many seconds. Unset or 0 keeps them.
    #[serde(default)]
    pub click_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonalizationConfig {
    /// Favorites seeded into profiles created outside the click path.
    #[serde(default = "default_favorite_categories")]
    pub default_favorite_categories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CatalogConfig {
    /// JSON file with an array of offers. Built-in samples are used when unset.
    #[serde(default)]
    pub feed_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_ranking_interval_secs")]
    pub ranking_interval_secs: u64,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_store_backend() -> StoreBackend {
    StoreBackend::Memory
}
fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_source_tag() -> String {
    "streaky_app".to_string()
}
fn default_currency() -> String {
    "INR".to_string()
}
fn default_geo() -> String {
    "IN".to_string()
}
fn default_favorite_categories() -> Vec<String> {
    vec![
        "shopping".to_string(),
        "electronics".to_string(),
        "education".to_string(),
    ]
}
fn default_refresh_interval_secs() -> u64 {
    86_400
}
fn default_ranking_interval_secs() -> u64 {
    21_600
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            redis_url: default_redis_url(),
            key_prefix: String::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            source_tag: default_source_tag(),
            default_currency: default_currency(),
            default_geo: default_geo(),
            click_ttl_secs: None,
        }
    }
}

impl Default for PersonalizationConfig {
    fn default() -> Self {
        Self {
            default_favorite_categories: default_favorite_categories(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            ranking_interval_secs: default_ranking_interval_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            store: StoreConfig::default(),
            metrics: MetricsConfig::default(),
            tracking: TrackingConfig::default(),
            personalization: PersonalizationConfig::default(),
            catalog: CatalogConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> AffiliateResult<Self> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("AFFILIATE_ENGINE")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("personalization.default_favorite_categories"),
        );

        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| AffiliateError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.http_port, 8080);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.tracking.source_tag, "streaky_app");
        assert_eq!(config.tracking.default_currency, "INR");
        assert_eq!(config.personalization.default_favorite_categories.len(), 3);
        assert_eq!(config.schedule.ranking_interval_secs, 6 * 3600);
        assert!(config.catalog.feed_path.is_none());
        assert!(config.tracking.click_ttl_secs.is_none());
    }

    #[test]
    fn test_malformed_env_is_config_error() {
        std::env::set_var("AFFILIATE_ENGINE__API__HTTP_PORT", "not-a-port");
        let result = AppConfig::load();
        std::env::remove_var("AFFILIATE_ENGINE__API__HTTP_PORT");
        assert!(matches!(result, Err(AffiliateError::Config(_))));
    }

    #[test]
    fn test_backend_deserializes_lowercase() {
        let backend: StoreBackend = serde_json::from_str("\"redis\"").unwrap();
        assert_eq!(backend, StoreBackend::Redis);
    }
}
