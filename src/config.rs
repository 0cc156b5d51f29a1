//! Configuration types for media-dl

use crate::error::{Error, Result};
use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Download behavior configuration (output directory, concurrency, timeouts)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory the external tool writes artifacts into (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum concurrently running jobs for non-serialized platforms (default: 4)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Wall-clock limit for one external tool run, applied to every platform
    /// (default: 900 seconds, `null` = unbounded)
    #[serde(
        default = "default_process_timeout",
        with = "optional_duration_serde"
    )]
    pub process_timeout: Option<Duration>,

    /// Route prefix artifacts are served under (default: "/files")
    #[serde(default = "default_files_route")]
    pub files_route: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            process_timeout: default_process_timeout(),
            files_route: default_files_route(),
        }
    }
}

/// External tool location and credential material
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the yt-dlp executable (probed first when set)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp after the fixed candidates (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Netscape-format cookies file handed to the tool when it exists
    /// (default: "./cookies.txt")
    #[serde(default = "default_cookies_file")]
    pub cookies_file: PathBuf,

    /// Browser to pull cookies from when the cookies file is absent (default: "chrome")
    #[serde(default = "default_cookies_browser")]
    pub cookies_browser: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            search_path: true,
            cookies_file: default_cookies_file(),
            cookies_browser: default_cookies_browser(),
        }
    }
}

/// Serialized dispatch queue for the rate-sensitive platform
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Platform whose jobs are serialized (default: Instagram)
    #[serde(default = "default_serialized_platform")]
    pub serialized_platform: Platform,

    /// Minimum spacing between consecutive dispatches (default: 60 seconds)
    #[serde(default = "default_min_delay", with = "duration_serde")]
    pub min_delay: Duration,

    /// Extra pause after releasing a job before looking at the next one
    /// (default: 1000 ms)
    #[serde(
        default = "default_inter_item_delay",
        rename = "inter_item_delay_ms",
        with = "millis_serde"
    )]
    pub inter_item_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            serialized_platform: default_serialized_platform(),
            min_delay: default_min_delay(),
            inter_item_delay: default_inter_item_delay(),
        }
    }
}

/// Artifact discovery heuristics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Pause before scanning the output directory after the tool exits
    /// (default: 1000 ms)
    #[serde(
        default = "default_propagation_delay",
        rename = "propagation_delay_ms",
        with = "millis_serde"
    )]
    pub propagation_delay: Duration,

    /// How recently a file must have been modified to be picked by the
    /// recency fallback (default: 300 seconds)
    #[serde(default = "default_recent_window", with = "duration_serde")]
    pub recent_window: Duration,

    /// File stems never picked by the recency fallback
    #[serde(default = "default_placeholder_names")]
    pub placeholder_names: Vec<String>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            propagation_delay: default_propagation_delay(),
            recent_window: default_recent_window(),
            placeholder_names: default_placeholder_names(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./media-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// API and external server integration configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerIntegrationConfig {
    /// REST API configuration
    #[serde(default)]
    pub api: ApiConfig,
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
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

/// Main configuration for MediaDownloader
///
/// Every field has a default, so `Config::default()` works out of the box and
/// partial JSON documents deserialize.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output directory, concurrency and timeout
    #[serde(default)]
    pub download: DownloadConfig,

    /// External tool location and credentials
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Serialized platform queue
    #[serde(default)]
    pub queue: QueueConfig,

    /// Artifact discovery
    #[serde(default)]
    pub locator: LocatorConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// API server
    #[serde(default)]
    pub server: ServerIntegrationConfig,
}

impl Config {
    /// Output directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }

    /// Reject settings that would stall or break the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.download.max_concurrent_jobs == 0 {
            return Err(Error::Config {
                message: "max_concurrent_jobs must be at least 1".to_string(),
                key: Some("download.max_concurrent_jobs".to_string()),
            });
        }
        if self.queue.min_delay.is_zero() {
            return Err(Error::Config {
                message: "min_delay must be greater than zero".to_string(),
                key: Some("queue.min_delay".to_string()),
            });
        }
        if self.locator.recent_window.is_zero() {
            return Err(Error::Config {
                message: "recent_window must be greater than zero".to_string(),
                key: Some("locator.recent_window".to_string()),
            });
        }
        if !self.download.files_route.starts_with('/') {
            return Err(Error::Config {
                message: format!(
                    "files_route '{}' must start with '/'",
                    self.download.files_route
                ),
                key: Some("download.files_route".to_string()),
            });
        }
        Ok(())
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_process_timeout() -> Option<Duration> {
    Some(Duration::from_secs(15 * 60))
}

fn default_files_route() -> String {
    "/files".to_string()
}

fn default_cookies_file() -> PathBuf {
    PathBuf::from("./cookies.txt")
}

fn default_cookies_browser() -> String {
    "chrome".to_string()
}

fn default_serialized_platform() -> Platform {
    Platform::Instagram
}

fn default_min_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_inter_item_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_propagation_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_recent_window() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_placeholder_names() -> Vec<String> {
    vec![
        "test".to_string(),
        "placeholder".to_string(),
        "sample".to_string(),
    ]
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./media-dl.db")
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
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

// Millisecond Duration serialization helper
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
