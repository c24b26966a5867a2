use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::SourceConfig;
use crate::preprocess::ResizeFilter;
use crate::watch::DEFAULT_VIBRATE_DURATION;

const DEFAULT_MODEL_PATH: &str = "best.onnx";

#[derive(Debug, Deserialize, Default)]
struct WatchConfigFile {
    model_path: Option<PathBuf>,
    source: Option<SourceConfigFile>,
    alert: Option<AlertConfigFile>,
    resize_filter: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    vibrate_ms: Option<u64>,
}

/// Resolved daemon configuration.
///
/// Sampling period, alert threshold and model input size are fixed constants
/// and deliberately absent here.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub model_path: PathBuf,
    pub source: SourceConfig,
    pub vibrate: Duration,
    pub resize_filter: ResizeFilter,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            source: SourceConfig::default(),
            vibrate: DEFAULT_VIBRATE_DURATION,
            resize_filter: ResizeFilter::default(),
        }
    }
}

impl WatchConfig {
    /// Defaults, then the JSON file named by `POTHOLE_CONFIG`, then env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("POTHOLE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchConfigFile) -> Result<Self> {
        let defaults = Self::default();
        let source = match file.source {
            Some(source) => SourceConfig {
                url: source.url.unwrap_or(defaults.source.url),
                target_fps: source.target_fps.unwrap_or(defaults.source.target_fps),
                width: source.width.unwrap_or(defaults.source.width),
                height: source.height.unwrap_or(defaults.source.height),
            },
            None => defaults.source,
        };
        let vibrate = file
            .alert
            .and_then(|alert| alert.vibrate_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.vibrate);
        let resize_filter = match file.resize_filter.as_deref() {
            Some(name) => ResizeFilter::parse(name)?,
            None => defaults.resize_filter,
        };
        Ok(Self {
            model_path: file.model_path.unwrap_or(defaults.model_path),
            source,
            vibrate,
            resize_filter,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("POTHOLE_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_path = PathBuf::from(path);
            }
        }
        if let Ok(url) = std::env::var("POTHOLE_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(vibrate) = std::env::var("POTHOLE_VIBRATE_MS") {
            let millis: u64 = vibrate.trim().parse().map_err(|_| {
                anyhow!("POTHOLE_VIBRATE_MS must be an integer number of milliseconds")
            })?;
            self.vibrate = Duration::from_millis(millis);
        }
        if let Ok(filter) = std::env::var("POTHOLE_RESIZE_FILTER") {
            if !filter.trim().is_empty() {
                self.resize_filter = ResizeFilter::parse(&filter)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(anyhow!("model_path must not be empty"));
        }
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.vibrate.is_zero() {
            return Err(anyhow!("vibrate duration must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_resolves_to_defaults() -> Result<()> {
        let cfg = WatchConfig::from_file(WatchConfigFile::default())?;
        assert_eq!(cfg.model_path, PathBuf::from("best.onnx"));
        assert_eq!(cfg.source, SourceConfig::default());
        assert_eq!(cfg.vibrate, Duration::from_millis(200));
        assert_eq!(cfg.resize_filter, ResizeFilter::Nearest);
        cfg.validate()
    }

    #[test]
    fn partial_source_section_keeps_other_defaults() -> Result<()> {
        let file: WatchConfigFile =
            serde_json::from_str(r#"{ "source": { "url": "/dev/video1" } }"#)?;
        let cfg = WatchConfig::from_file(file)?;
        assert_eq!(cfg.source.url, "/dev/video1");
        assert_eq!(cfg.source.target_fps, 10);
        assert_eq!((cfg.source.width, cfg.source.height), (640, 480));
        Ok(())
    }

    #[test]
    fn unknown_filter_in_file_is_rejected() {
        let file = WatchConfigFile {
            resize_filter: Some("bicubic".to_string()),
            ..WatchConfigFile::default()
        };
        assert!(WatchConfig::from_file(file).is_err());
    }

    #[test]
    fn zero_values_fail_validation() {
        let mut cfg = WatchConfig::default();
        cfg.source.target_fps = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = WatchConfig::default();
        cfg.vibrate = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = WatchConfig::default();
        cfg.model_path = PathBuf::new();
        assert!(cfg.validate().is_err());
    }
}
