//! Configuration types for i2v-engine

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Value shipped in sample `.env` files; treated the same as an absent key
const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

/// Remote generation provider settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API base URL (default: "https://dashscope.aliyuncs.com/api/v1")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer credential. Tasks fail immediately when this is missing.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Timeout for submit and status calls (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for downloading a finished video (default: 300 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download_timeout: Duration,
}

impl ProviderConfig {
    /// The configured credential, ignoring blanks and the sample placeholder
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != API_KEY_PLACEHOLDER)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout: default_request_timeout(),
            download_timeout: default_download_timeout(),
        }
    }
}

/// Local file locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where uploaded images are stored (default: "./uploads")
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Where generated videos are stored (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Task snapshot file (default: "./tasks.json")
    #[serde(default = "default_tasks_file")]
    pub tasks_file: PathBuf,

    /// Maximum accepted upload size in bytes (default: 10 MiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            tasks_file: default_tasks_file(),
            max_file_size: default_max_file_size(),
        }
    }
}

/// Poller and live-update cadence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between status polls of one task (default: 5 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Heartbeat period on live subscriptions (default: 25 seconds)
    #[serde(default = "default_keep_alive_interval", with = "duration_serde")]
    pub keep_alive_interval: Duration,

    /// Per-listener queue capacity; events beyond it are dropped (default: 64)
    #[serde(default = "default_listener_buffer")]
    pub listener_buffer: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            keep_alive_interval: default_keep_alive_interval(),
            listener_buffer: default_listener_buffer(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:5000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Main configuration for the task engine and its API server
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Local storage locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Poller and live-update cadence
    #[serde(default)]
    pub polling: PollingConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Build a configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first if present. Recognized
    /// variables: `DASHSCOPE_API_KEY`, `DASHSCOPE_BASE_URL`, `UPLOAD_FOLDER`,
    /// `OUTPUT_FOLDER`, `TASKS_FILE`, `MAX_FILE_SIZE`, `POLL_INTERVAL_SECS`, `HOST`, `PORT`.
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(key) = lookup("DASHSCOPE_API_KEY") {
            config.provider.api_key = Some(key);
        }
        if let Some(url) = lookup("DASHSCOPE_BASE_URL") {
            url::Url::parse(&url).map_err(|e| crate::Error::Config {
                message: format!("invalid base URL '{}': {}", url, e),
                key: Some("DASHSCOPE_BASE_URL".to_string()),
            })?;
            config.provider.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(dir) = lookup("UPLOAD_FOLDER") {
            config.storage.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("OUTPUT_FOLDER") {
            config.storage.output_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("TASKS_FILE") {
            config.storage.tasks_file = PathBuf::from(file);
        }
        if let Some(size) = lookup("MAX_FILE_SIZE") {
            config.storage.max_file_size = parse_number("MAX_FILE_SIZE", &size)?;
        }
        if let Some(secs) = lookup("POLL_INTERVAL_SECS") {
            let secs: u64 = parse_number("POLL_INTERVAL_SECS", &secs)?;
            if secs == 0 {
                return Err(crate::Error::Config {
                    message: "POLL_INTERVAL_SECS must be at least 1".to_string(),
                    key: Some("POLL_INTERVAL_SECS".to_string()),
                });
            }
            config.polling.poll_interval = Duration::from_secs(secs);
        }

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match lookup("PORT") {
            Some(port) => parse_number::<u16>("PORT", &port)?,
            None => config.api.bind_address.port(),
        };
        config.api.bind_address =
            format!("{}:{}", host, port)
                .parse()
                .map_err(|e| crate::Error::Config {
                    message: format!("invalid bind address {}:{}: {}", host, port, e),
                    key: Some("HOST".to_string()),
                })?;

        Ok(config)
    }
}

fn parse_number<T>(key: &str, value: &str) -> crate::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| crate::Error::Config {
        message: format!("invalid value '{}' for {}: {}", value, key, e),
        key: Some(key.to_string()),
    })
}

fn default_base_url() -> String {
    "https://dashscope.aliyuncs.com/api/v1".into()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_upload_dir() -> PathBuf {
    "./uploads".into()
}

fn default_output_dir() -> PathBuf {
    "./downloads".into()
}

fn default_tasks_file() -> PathBuf {
    "./tasks.json".into()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_keep_alive_interval() -> Duration {
    Duration::from_secs(25)
}

fn default_listener_buffer() -> usize {
    64
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
