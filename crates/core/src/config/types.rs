use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tixcache.db")
}

/// Artifact storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for generated ticket files.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("media")
}

/// How generation tasks are executed.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Run on the caller's task.
    #[default]
    Inline,
    /// Queue to background workers; the caller waits for the result.
    Queue,
}

/// Ticket generation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub mode: GenerationMode,

    /// Maximum generations running at once (queue mode).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Pending jobs the queue accepts before submitters wait (queue mode).
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// How long a caller waits for one generation (None = no limit).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: GenerationMode::default(),
            workers: default_workers(),
            queue_size: default_queue_size(),
            timeout_secs: None,
        }
    }
}

impl GenerationConfig {
    /// Per-generation wait limit, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_size() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "tixcache.db");
        assert_eq!(config.storage.path.to_str().unwrap(), "media");
        assert_eq!(config.generation.mode, GenerationMode::Inline);
        assert_eq!(config.generation.workers, 4);
        assert!(config.generation.timeout_secs.is_none());
    }

    #[test]
    fn test_deserialize_server_section() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_deserialize_queue_generation() {
        let toml = r#"
[generation]
mode = "queue"
workers = 2
queue_size = 16
timeout_secs = 30
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.generation.mode, GenerationMode::Queue);
        assert_eq!(config.generation.workers, 2);
        assert_eq!(config.generation.queue_size, 16);
        assert_eq!(config.generation.timeout_secs, Some(30));
    }

    #[test]
    fn test_deserialize_unknown_mode_fails() {
        let toml = r#"
[generation]
mode = "celery"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_custom_paths() {
        let toml = r#"
[database]
path = "/data/tickets.sqlite"

[storage]
path = "/data/media"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.database.path.to_str().unwrap(),
            "/data/tickets.sqlite"
        );
        assert_eq!(config.storage.path.to_str().unwrap(), "/data/media");
    }
}
