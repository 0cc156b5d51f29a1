//! Artifact discovery in the shared output directory
//!
//! The tool is asked to prefix every file with the job token, but extractors
//! do not always honor the template, so discovery falls back through
//! progressively weaker heuristics.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use crate::config::LocatorConfig;

/// Suffix of the sidecar metadata file written by `--write-info-json`
pub const SIDECAR_SUFFIX: &str = ".info.json";

/// Shape of the prefix every job writes in front of its files
static JOB_TOKEN_PREFIX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^job\d+-[a-z0-9]{10}_").ok());

/// Keys copied from the sidecar into the job metadata
const METADATA_KEYS: &[&str] = &[
    "id",
    "uploader",
    "duration",
    "upload_date",
    "extractor",
    "webpage_url",
    "width",
    "height",
    "ext",
    "thumbnail",
];

/// Title and curated metadata read from a sidecar file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SidecarMetadata {
    /// Media title
    pub title: Option<String>,
    /// Curated subset of the sidecar keys
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl SidecarMetadata {
    /// Extract title and curated keys from a parsed sidecar document
    pub fn from_value(value: &serde_json::Value) -> Self {
        let title = value
            .get("title")
            .and_then(|t| t.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);

        let metadata = METADATA_KEYS
            .iter()
            .filter_map(|key| {
                value
                    .get(*key)
                    .filter(|v| !v.is_null())
                    .map(|v| (key.to_string(), v.clone()))
            })
            .collect();

        Self { title, metadata }
    }
}

struct Entry {
    path: PathBuf,
    name: String,
    modified: SystemTime,
}

/// Finds the file a job produced
#[derive(Clone, Debug)]
pub struct ArtifactLocator {
    propagation_delay: Duration,
    recent_window: Duration,
    placeholder_names: Vec<String>,
}

impl ArtifactLocator {
    /// Create a locator from configuration
    pub fn new(config: &LocatorConfig) -> Self {
        Self {
            propagation_delay: config.propagation_delay,
            recent_window: config.recent_window,
            placeholder_names: config
                .placeholder_names
                .iter()
                .map(|n| n.to_lowercase())
                .collect(),
        }
    }

    /// Locate the artifact for `token` in `output_dir`
    ///
    /// Waits the propagation delay, then tries in order: a filename starting
    /// with the token, the newest recently modified file, a filename
    /// containing the token. Sidecars and partial downloads never match,
    /// and the fallbacks skip files carrying another job's token.
    pub async fn locate(&self, output_dir: &Path, token: &str) -> Option<PathBuf> {
        if !self.propagation_delay.is_zero() {
            tokio::time::sleep(self.propagation_delay).await;
        }

        let mut entries = match scan(output_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    dir = %output_dir.display(),
                    error = %e,
                    "Failed to scan output directory"
                );
                return None;
            }
        };
        entries.retain(|e| !is_excluded(&e.name));
        // Newest first for every layer
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));

        if let Some(found) = entries.iter().find(|e| e.name.starts_with(token)) {
            tracing::debug!(token, file = %found.name, "Artifact matched by token prefix");
            return Some(found.path.clone());
        }

        let now = SystemTime::now();
        if let Some(found) = entries.iter().find(|e| {
            let age = now.duration_since(e.modified).unwrap_or(Duration::ZERO);
            age <= self.recent_window
                && !self.is_placeholder(&e.name)
                && !is_foreign_token(&e.name, token)
        }) {
            tracing::debug!(token, file = %found.name, "Artifact matched by recency");
            return Some(found.path.clone());
        }

        if let Some(found) = entries
            .iter()
            .find(|e| e.name.contains(token) && !is_foreign_token(&e.name, token))
        {
            tracing::debug!(token, file = %found.name, "Artifact matched by token substring");
            return Some(found.path.clone());
        }

        None
    }

    fn is_placeholder(&self, name: &str) -> bool {
        let stem = name.split('.').next().unwrap_or(name).to_lowercase();
        self.placeholder_names.iter().any(|p| *p == stem)
    }
}

/// Parse the sidecar for `token`, if one exists
///
/// Any failure yields `None`; the caller falls back to a synthesized title.
pub async fn read_sidecar(output_dir: &Path, token: &str) -> Option<SidecarMetadata> {
    let entries = scan(output_dir).await.ok()?;
    let sidecar = entries
        .iter()
        .find(|e| e.name.starts_with(token) && e.name.ends_with(SIDECAR_SUFFIX))?;

    let raw = match tokio::fs::read(&sidecar.path).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(file = %sidecar.name, error = %e, "Failed to read sidecar metadata");
            return None;
        }
    };

    match serde_json::from_slice::<serde_json::Value>(&raw) {
        Ok(value) => Some(SidecarMetadata::from_value(&value)),
        Err(e) => {
            tracing::warn!(file = %sidecar.name, error = %e, "Failed to parse sidecar metadata");
            None
        }
    }
}

fn is_excluded(name: &str) -> bool {
    name.starts_with('.')
        || name.ends_with(SIDECAR_SUFFIX)
        || name.ends_with(".part")
        || name.ends_with(".ytdl")
}

/// Whether `name` starts with some other job's token
fn is_foreign_token(name: &str, token: &str) -> bool {
    if name.starts_with(token) {
        return false;
    }
    JOB_TOKEN_PREFIX.as_ref().is_some_and(|re| re.is_match(name))
}

async fn scan(dir: &Path) -> std::io::Result<Vec<Entry>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(String::from) else {
            continue;
        };
        entries.push(Entry {
            path: entry.path(),
            name,
            modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    Ok(entries)
}
