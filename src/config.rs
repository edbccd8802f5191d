use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CAPTURE_SUBDIR: &str = "autolabel";
const DEFAULT_FRAME_INTERVAL: i64 = 1;
const DEFAULT_LIVE_INTERVAL_MS: i64 = 1000;
const DEFAULT_READ_TIMEOUT_MS: u64 = 2000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    download_dir: Option<PathBuf>,
    capture_dir: Option<PathBuf>,
    video: Option<VideoConfigFile>,
    live: Option<LiveConfigFile>,
    http: Option<HttpConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    frame_interval: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct LiveConfigFile {
    interval_ms: Option<i64>,
    read_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct HttpConfigFile {
    timeout_secs: Option<u64>,
}

/// Settings shared by the resolver and every source it creates.
///
/// `isolated` puts both directories under one root.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Download cache. Created on first fetch, never removed by this crate.
    pub download_dir: PathBuf,
    /// Where sliced frames land when saving is requested.
    pub capture_dir: PathBuf,
    /// Frames advanced between captures on video files.
    pub frame_interval: i64,
    /// Milliseconds between captures on live streams and screens.
    pub live_interval_ms: i64,
    /// How long a live capture waits for the next frame.
    pub read_timeout: Duration,
    pub http_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        let tmp = std::env::temp_dir();
        Self {
            capture_dir: tmp.join(DEFAULT_CAPTURE_SUBDIR),
            download_dir: tmp,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            live_interval_ms: DEFAULT_LIVE_INTERVAL_MS,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl SourceConfig {
    /// Load from `AUTOLABEL_CONFIG` (JSON) if set, then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("AUTOLABEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults with both directories under `root`.
    pub fn isolated(root: &Path) -> Self {
        Self {
            download_dir: root.join("downloads"),
            capture_dir: root.join("captures"),
            ..Self::default()
        }
    }

    fn from_file(file: SourceConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            download_dir: file.download_dir.unwrap_or(defaults.download_dir),
            capture_dir: file.capture_dir.unwrap_or(defaults.capture_dir),
            frame_interval: file
                .video
                .and_then(|video| video.frame_interval)
                .unwrap_or(defaults.frame_interval),
            live_interval_ms: file
                .live
                .as_ref()
                .and_then(|live| live.interval_ms)
                .unwrap_or(defaults.live_interval_ms),
            read_timeout: file
                .live
                .and_then(|live| live.read_timeout_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.read_timeout),
            http_timeout: file
                .http
                .and_then(|http| http.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("AUTOLABEL_DOWNLOAD_DIR") {
            if !dir.trim().is_empty() {
                self.download_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("AUTOLABEL_CAPTURE_DIR") {
            if !dir.trim().is_empty() {
                self.capture_dir = PathBuf::from(dir);
            }
        }
        if let Ok(interval) = std::env::var("AUTOLABEL_FRAME_INTERVAL") {
            self.frame_interval = interval
                .trim()
                .parse()
                .map_err(|_| anyhow!("AUTOLABEL_FRAME_INTERVAL must be an integer"))?;
        }
        if let Ok(interval) = std::env::var("AUTOLABEL_LIVE_INTERVAL_MS") {
            self.live_interval_ms = interval.trim().parse().map_err(|_| {
                anyhow!("AUTOLABEL_LIVE_INTERVAL_MS must be an integer number of milliseconds")
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_interval <= 0 {
            return Err(anyhow!(
                "video frame interval must be positive, got {}",
                self.frame_interval
            ));
        }
        if self.live_interval_ms <= 0 {
            return Err(anyhow!(
                "live interval must be positive, got {}",
                self.live_interval_ms
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(anyhow!("live read timeout must be greater than zero"));
        }
        if self.http_timeout.is_zero() {
            return Err(anyhow!("http timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SourceConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
