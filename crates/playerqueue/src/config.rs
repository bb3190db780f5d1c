//! Service configuration loaded from TOML.

use std::path::Path;
use std::time::Duration;

use playerqueue_client::ClientConfig;
use playerqueue_lobby::LobbyInfo;
use serde::{Deserialize, Serialize};

use crate::PlayerQueueError;

fn default_listen_addr() -> String {
    "127.0.0.1:8090".to_string()
}

fn default_chat_history_size() -> usize {
    100
}

fn default_min_queue_size() -> usize {
    2
}

fn default_reconcile_interval() -> u64 {
    2
}

fn default_eviction_interval() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_keepalive_interval() -> u64 {
    20
}

fn default_outbound_queue_size() -> usize {
    256
}

fn default_rate_limit_burst() -> u32 {
    1
}

fn default_rate_limit_refill() -> u64 {
    5
}

fn default_recent_limit() -> usize {
    50
}

/// Configuration for the whole service.
///
/// Every field has a default, so an empty file (or no file) is a valid
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// WebSocket bind address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Origin prefixes accepted at upgrade. Empty accepts any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Capacity of the in-memory chat history.
    #[serde(default = "default_chat_history_size")]
    pub chat_history_size: usize,

    /// Queued members a lobby needs before it can start.
    #[serde(default = "default_min_queue_size")]
    pub min_queue_size: usize,

    /// Seconds between live-feed reconciliation passes.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// Seconds between zombie scans.
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_secs: u64,

    /// Seconds of silence after which a client counts as a zombie.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Seconds between transport pings.
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    /// Per-client outbound queue capacity.
    #[serde(default = "default_outbound_queue_size")]
    pub outbound_queue_size: usize,

    /// Inbound token-bucket capacity.
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,

    /// Seconds to refill one inbound token.
    #[serde(default = "default_rate_limit_refill")]
    pub rate_limit_refill_secs: u64,

    /// How many messages `recent(0)` returns.
    #[serde(default = "default_recent_limit")]
    pub recent_default_limit: usize,

    /// Static lobby list served by the in-memory feed.
    #[serde(default)]
    pub lobbies: Vec<LobbyInfo>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            allowed_origins: Vec::new(),
            chat_history_size: default_chat_history_size(),
            min_queue_size: default_min_queue_size(),
            reconcile_interval_secs: default_reconcile_interval(),
            eviction_interval_secs: default_eviction_interval(),
            idle_timeout_secs: default_idle_timeout(),
            keepalive_interval_secs: default_keepalive_interval(),
            outbound_queue_size: default_outbound_queue_size(),
            rate_limit_burst: default_rate_limit_burst(),
            rate_limit_refill_secs: default_rate_limit_refill(),
            recent_default_limit: default_recent_limit(),
            lobbies: Vec::new(),
        }
    }
}

impl QueueConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    /// [`PlayerQueueError::Config`] if the document is not valid TOML or
    /// has fields of the wrong type.
    pub fn from_toml(content: &str) -> Result<Self, PlayerQueueError> {
        toml::from_str(content).map_err(|e| PlayerQueueError::Config(e.to_string()))
    }

    /// Loads the configuration from `path`. A missing file yields the
    /// defaults.
    pub async fn load(path: &Path) -> Result<Self, PlayerQueueError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(PlayerQueueError::Config(format!(
                "reading {}: {e}",
                path.display()
            ))),
        }
    }

    /// Clamp nonsensical values so the config is safe to use.
    ///
    /// - zero intervals and timeouts become 1 second
    /// - `chat_history_size` and `min_queue_size` are at least 1
    /// - `outbound_queue_size` is at least `chat_history_size + 16`, so a
    ///   full history replay always fits in a fresh client's queue
    pub fn validated(mut self) -> Self {
        for (name, value) in [
            ("reconcile_interval_secs", &mut self.reconcile_interval_secs),
            ("eviction_interval_secs", &mut self.eviction_interval_secs),
            ("idle_timeout_secs", &mut self.idle_timeout_secs),
            ("keepalive_interval_secs", &mut self.keepalive_interval_secs),
        ] {
            if *value == 0 {
                tracing::warn!(field = name, "zero interval, using 1s");
                *value = 1;
            }
        }
        if self.chat_history_size == 0 {
            tracing::warn!("chat_history_size is 0, using 1");
            self.chat_history_size = 1;
        }
        if self.min_queue_size == 0 {
            tracing::warn!("min_queue_size is 0, using 1");
            self.min_queue_size = 1;
        }
        let min_outbound = self.chat_history_size + 16;
        if self.outbound_queue_size < min_outbound {
            tracing::warn!(
                configured = self.outbound_queue_size,
                using = min_outbound,
                "outbound_queue_size cannot hold a history replay, raising"
            );
            self.outbound_queue_size = min_outbound;
        }
        self
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// The per-connection part of the config.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            outbound_capacity: self.outbound_queue_size,
            keepalive_interval: Duration::from_secs(self.keepalive_interval_secs),
            rate_limit_burst: self.rate_limit_burst,
            rate_limit_refill: Duration::from_secs(self.rate_limit_refill_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_config_default() {
        let config = QueueConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:8090");
        assert_eq!(config.chat_history_size, 100);
        assert_eq!(config.min_queue_size, 2);
        assert_eq!(config.reconcile_interval(), Duration::from_secs(2));
        assert_eq!(config.eviction_interval(), Duration::from_secs(30));
        assert_eq!(config.recent_default_limit, 50);
        assert!(config.lobbies.is_empty());
    }

    #[test]
    fn test_from_toml_empty_document_is_default() {
        let config = QueueConfig::from_toml("").unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8090");
        assert_eq!(config.outbound_queue_size, 256);
    }

    #[test]
    fn test_from_toml_overrides_and_lobbies() {
        let config = QueueConfig::from_toml(
            r#"
            listen_addr = "0.0.0.0:9000"
            min_queue_size = 4
            allowed_origins = ["https://example.com"]

            [[lobbies]]
            server_id = 7
            title = "Seattle 1"
            short_name = "sea-1"
            hostname = "sea-1.example.com"
            port = 27015
            cc = "us"
            max_players = 24
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.min_queue_size, 4);
        assert_eq!(config.allowed_origins, vec!["https://example.com"]);
        assert_eq!(config.lobbies.len(), 1);
        assert_eq!(config.lobbies[0].port, 27015);
        assert_eq!(config.lobbies[0].player_count, 0);
    }

    #[test]
    fn test_from_toml_wrong_type_is_config_error() {
        let err = QueueConfig::from_toml("min_queue_size = \"two\"").unwrap_err();
        assert!(matches!(err, PlayerQueueError::Config(_)));
    }

    #[test]
    fn test_validated_clamps_values() {
        let config = QueueConfig {
            reconcile_interval_secs: 0,
            chat_history_size: 0,
            min_queue_size: 0,
            outbound_queue_size: 4,
            ..QueueConfig::default()
        }
        .validated();

        assert_eq!(config.reconcile_interval_secs, 1);
        assert_eq!(config.chat_history_size, 1);
        assert_eq!(config.min_queue_size, 1);
        assert_eq!(config.outbound_queue_size, 17);
    }

    #[test]
    fn test_validated_default_is_unchanged() {
        let config = QueueConfig::default().validated();
        assert_eq!(config.outbound_queue_size, 256);
        assert_eq!(config.idle_timeout_secs, 60);
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_defaults() {
        let config = QueueConfig::load(Path::new("/nonexistent/playerqueue.toml"))
            .await
            .unwrap();
        assert_eq!(config.min_queue_size, 2);
    }
}
