//! Configuration for the gateway.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (WAH4PC_ADDR, WAH4PC_DATA_DIR)
//! 2. Config file (.wah4pc/config.yaml)
//! 3. Defaults (0.0.0.0:3043, ./data)
//!
//! Config file discovery:
//! - Searches current directory and parents for .wah4pc/config.yaml
//! - `storage.data_dir` is relative to the directory holding `.wah4pc/`

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::DispatchConfig;

pub const DEFAULT_ADDRESS: &str = "0.0.0.0:3043";
pub const DEFAULT_DATA_DIR: &str = "./data";

pub const ENV_ADDRESS: &str = "WAH4PC_ADDR";
pub const ENV_DATA_DIR: &str = "WAH4PC_DATA_DIR";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Collection directory (relative to the project root)
    pub data_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryConfig {
    pub timeout_seconds: Option<u64>,
    pub queue_capacity: Option<usize>,
    pub max_in_flight: Option<usize>,
}

/// Resolved configuration with absolute paths where possible
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Listen address for the HTTP server
    pub address: String,
    /// Directory holding the collection snapshots
    pub data_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Outbound delivery settings
    pub delivery: DeliverySettings,
}

#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub timeout_seconds: u64,
    pub queue_capacity: usize,
    pub max_in_flight: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        let dispatch = DispatchConfig::default();
        Self {
            timeout_seconds: 30,
            queue_capacity: dispatch.queue_capacity,
            max_in_flight: dispatch.max_in_flight,
        }
    }
}

impl DeliverySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            queue_capacity: self.queue_capacity,
            max_in_flight: self.max_in_flight,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".wah4pc").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge a parsed file (if any) with env overrides and defaults
fn resolve(
    file: Option<(&Path, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    let (config_file, parsed) = match file {
        Some((path, parsed)) => (Some(path.to_path_buf()), parsed),
        None => (None, ConfigFile::default()),
    };

    let address = env(ENV_ADDRESS)
        .or(parsed.server.address)
        .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

    let data_dir = if let Some(dir) = env(ENV_DATA_DIR) {
        PathBuf::from(dir)
    } else if let (Some(dir), Some(path)) = (&parsed.storage.data_dir, &config_file) {
        // Project root is the parent of .wah4pc/
        let base_dir = path
            .parent()
            .and_then(|p| p.parent())
            .unwrap_or(Path::new("."));
        resolve_path(base_dir, dir)
    } else {
        PathBuf::from(DEFAULT_DATA_DIR)
    };

    // Dispatcher limits are clamped here so `config` shows what will run
    let defaults = DeliverySettings::default();
    let requested = DispatchConfig {
        queue_capacity: parsed
            .delivery
            .queue_capacity
            .unwrap_or(defaults.queue_capacity),
        max_in_flight: parsed
            .delivery
            .max_in_flight
            .unwrap_or(defaults.max_in_flight),
    }
    .bounded();
    let delivery = DeliverySettings {
        timeout_seconds: parsed
            .delivery
            .timeout_seconds
            .unwrap_or(defaults.timeout_seconds),
        queue_capacity: requested.queue_capacity,
        max_in_flight: requested.max_in_flight,
    };

    ResolvedConfig {
        address,
        data_dir,
        config_file,
        delivery,
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let env = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

    match find_config_file() {
        Some(path) => {
            let parsed = load_config_file(&path)?;
            Ok(resolve(Some((&path, parsed)), env))
        }
        None => Ok(resolve(None, env)),
    }
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Load configuration again, bypassing the cache
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::dispatcher::MAX_IN_FLIGHT;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(temp: &TempDir, body: &str) -> PathBuf {
        let dir = temp.path().join(".wah4pc");
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "{}", body).unwrap();
        config_path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, no_env);

        assert_eq!(config.address, "0.0.0.0:3043");
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert!(config.config_file.is_none());
        assert_eq!(config.delivery.timeout(), Duration::from_secs(30));
        assert_eq!(config.delivery.queue_capacity, 256);
        assert_eq!(config.delivery.max_in_flight, 8);
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            r#"
version: "1.0"
server:
  address: 127.0.0.1:8080
storage:
  data_dir: state
delivery:
  timeout_seconds: 5
  max_in_flight: 2
"#,
        );

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version.as_deref(), Some("1.0"));
        assert_eq!(parsed.server.address.as_deref(), Some("127.0.0.1:8080"));
        assert_eq!(parsed.delivery.queue_capacity, None);

        let config = resolve(Some((&config_path, parsed)), no_env);
        assert_eq!(config.address, "127.0.0.1:8080");
        assert_eq!(config.data_dir, temp.path().join("state"));
        assert_eq!(config.delivery.timeout_seconds, 5);
        assert_eq!(config.delivery.queue_capacity, 256);
        assert_eq!(config.delivery.dispatch().max_in_flight, 2);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            "server:\n  address: 127.0.0.1:8080\nstorage:\n  data_dir: state",
        );
        let parsed = load_config_file(&config_path).unwrap();

        let env: HashMap<&str, &str> = [(ENV_ADDRESS, "0.0.0.0:9000"), (ENV_DATA_DIR, "/var/lib/gw")]
            .into_iter()
            .collect();
        let config = resolve(Some((&config_path, parsed)), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.address, "0.0.0.0:9000");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/gw"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp, "{}");

        let parsed = load_config_file(&config_path).unwrap();
        let config = resolve(Some((&config_path, parsed)), no_env);
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(&temp, "delivery:\n  timeout_seconds: soon");
        assert!(load_config_file(&config_path).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }

    #[test]
    fn test_delivery_limits_are_clamped() {
        let temp = TempDir::new().unwrap();
        let config_path = write_config(
            &temp,
            "delivery:\n  queue_capacity: 0\n  max_in_flight: 100000",
        );

        let parsed = load_config_file(&config_path).unwrap();
        let config = resolve(Some((&config_path, parsed)), no_env);
        assert_eq!(config.delivery.queue_capacity, 1);
        assert_eq!(config.delivery.max_in_flight, MAX_IN_FLIGHT);
        assert_eq!(config.delivery.dispatch().max_in_flight, MAX_IN_FLIGHT);
    }

    #[test]
    fn test_reload_matches_cached_config() {
        let cached = config().unwrap();
        let fresh = reload_config().unwrap();

        assert_eq!(fresh.address, cached.address);
        assert_eq!(fresh.data_dir, cached.data_dir);
        assert_eq!(fresh.config_file, cached.config_file);
        assert_eq!(fresh.delivery.max_in_flight, cached.delivery.max_in_flight);
    }
}
