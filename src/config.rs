use std::collections::HashSet;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::core::dictionary::cache::{
    DEFAULT_KEY_PREFIX, DEFAULT_MEMORY_CAPACITY, DEFAULT_TTL_CONTROL_KEY, DEFAULT_TTL_DAYS,
};
use crate::core::dictionary::error::{DictionaryError, Result};
use crate::core::dictionary::providers::DEFAULT_BASE_URL;
use crate::core::dictionary::storage::DEFAULT_TABLE;
use crate::core::dictionary::types::DictSource;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "POLYDICT_CONFIG";
/// Prefix for environment overrides (`POLYDICT_SERVER__PORT=9000`).
pub const ENV_PREFIX: &str = "POLYDICT_";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cache: CacheConfig,
    pub dictionaries: DictionariesConfig,
    pub fallback: FallbackConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for the JSON log files. Defaults under the data directory.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// `redis://...` or `memory`.
    pub url: String,
    pub key_prefix: String,
    pub default_ttl_days: u64,
    pub ttl_control_key: String,
    /// Entry limit for the in-process backend.
    pub memory_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionariesConfig {
    pub idle_release_secs: u64,
    pub ecdict: LocalDictionaryConfig,
    pub supplement: LocalDictionaryConfig,
    pub bilingual: Vec<BilingualDictionaryConfig>,
}

/// An always-loaded local dictionary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalDictionaryConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
    pub table: String,
    pub priority: i32,
}

/// A lazily loaded dictionary serving one non-English language.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BilingualDictionaryConfig {
    pub language: String,
    /// Source tag, e.g. `kengdic`.
    pub source: String,
    pub display_name: String,
    pub path: Option<PathBuf>,
    pub table: String,
    pub enabled: bool,
    pub priority: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_secs: u64,
    pub priority: i32,
    pub languages: Vec<String>,
}

/// Operational overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub disable_local_dictionaries: bool,
    pub disable_legacy_scan: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "memory".to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_ttl_days: DEFAULT_TTL_DAYS,
            ttl_control_key: DEFAULT_TTL_CONTROL_KEY.to_string(),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl Default for DictionariesConfig {
    fn default() -> Self {
        Self {
            idle_release_secs: 600,
            ecdict: LocalDictionaryConfig {
                enabled: true,
                path: None,
                table: DEFAULT_TABLE.to_string(),
                priority: 100,
            },
            supplement: LocalDictionaryConfig {
                enabled: false,
                path: None,
                table: "entries".to_string(),
                priority: 90,
            },
            bilingual: Vec::new(),
        }
    }
}

impl Default for LocalDictionaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            table: DEFAULT_TABLE.to_string(),
            priority: 50,
        }
    }
}

impl Default for BilingualDictionaryConfig {
    fn default() -> Self {
        Self {
            language: String::new(),
            source: String::new(),
            display_name: String::new(),
            path: None,
            table: "entries".to_string(),
            enabled: true,
            priority: 80,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            priority: 10,
            languages: ["en", "es", "fr", "de", "it", "pt", "ru", "ja", "ko", "hi", "ar", "tr"]
                .iter()
                .map(|l| l.to_string())
                .collect(),
        }
    }
}

impl BilingualDictionaryConfig {
    pub fn source_tag(&self) -> Result<DictSource> {
        self.source.parse()
    }
}

impl AppConfig {
    /// Load defaults, then the config file, then `POLYDICT_` environment overrides.
    ///
    /// The file is `$POLYDICT_CONFIG` when set, otherwise
    /// `<config_dir>/polydict/config.toml`. A missing file is not an error.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path);
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.is_file() {
            log::info!("Loading config from {}", path.display());
        } else {
            log::debug!("No config file at {}, using defaults", path.display());
        }

        let config: AppConfig = Self::figment(path)
            .extract()
            .map_err(|e| DictionaryError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"]))
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(DictionaryError::config("server.port must be non-zero"));
        }
        if self.cache.default_ttl_days == 0 {
            return Err(DictionaryError::config("cache.default_ttl_days must be at least 1"));
        }

        let mut languages = HashSet::new();
        for dict in &self.dictionaries.bilingual {
            if dict.language.trim().is_empty() {
                return Err(DictionaryError::config("bilingual dictionary without a language"));
            }
            dict.source_tag()?;
            if !languages.insert(dict.language.to_lowercase()) {
                return Err(DictionaryError::config(format!(
                    "duplicate bilingual dictionary for language '{}'",
                    dict.language
                )));
            }
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Resolved log directory (override or XDG data default).
    pub fn log_dir(&self) -> PathBuf {
        self.logging.dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("polydict").join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs"))
        })
    }

    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("polydict").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}
