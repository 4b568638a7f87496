use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::download::AllowedTypes;
use crate::zip::CompressionMethod;

/// How compressed entries are stored in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    #[default]
    Deflate,
    Stored,
}

impl CompressionKind {
    pub fn method(self) -> CompressionMethod {
        match self {
            CompressionKind::Deflate => CompressionMethod::Deflate,
            CompressionKind::Stored => CompressionMethod::Stored,
        }
    }
}

/// `[compress]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressOptions {
    pub method: CompressionKind,
    /// Deflate level, 0 (fastest) to 9 (smallest).
    pub level: u32,
    /// Read buffer used while copying each file into the archive.
    pub buffer_size: usize,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            method: CompressionKind::Deflate,
            level: 6,
            buffer_size: 8 * 1024,
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadPolicy {
    /// Extensions (without the dot) that may be served.
    pub allowed_types: AllowedTypes,
    /// Size of the chunks written to the response sink.
    pub chunk_size: usize,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            allowed_types: AllowedTypes::default(),
            chunk_size: 2048,
        }
    }
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Attempts per fetch (including the first); only connect and timeout errors are retried.
    pub max_attempts: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

/// Global configuration loaded from `~/.config/filekit/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileKitConfig {
    pub download: DownloadPolicy,
    pub compress: CompressOptions,
    pub fetch: FetchOptions,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("filekit")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from an explicit path. The file must exist.
pub fn load_from(path: &Path) -> Result<FileKitConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: FileKitConfig = toml::from_str(&data)?;
    Ok(cfg)
}

/// Load configuration from the XDG location, creating a default file if none exists.
pub fn load_or_init() -> Result<FileKitConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FileKitConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from(&path)
}
