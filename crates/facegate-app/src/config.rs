use facegate_hw::MediaConstraints;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Client configuration: an optional TOML file overlaid by `FACEGATE_*`
/// environment variables, falling back to defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend origin; requests go to `<api_base_url>/api`.
    pub api_base_url: String,
    /// V4L2 device path.
    pub camera_device: String,
    /// Preferred capture size.
    pub capture_width: u32,
    pub capture_height: u32,
    /// Frames discarded after opening the camera (AGC/AE stabilization).
    pub warmup_frames: usize,
    /// Seconds before a success message hides itself.
    pub message_dismiss_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000".to_string(),
            camera_device: "/dev/video0".to_string(),
            capture_width: 1280,
            capture_height: 720,
            warmup_frames: 4,
            message_dismiss_secs: 3,
        }
    }
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::default().overlay_env(|key| std::env::var(key).ok())
    }

    /// Load `path` (or `$FACEGATE_CONFIG` when `None`), then apply the
    /// environment on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("FACEGATE_CONFIG").ok().map(PathBuf::from));

        let Some(path) = path else {
            return Ok(Self::from_env());
        };
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(Self::from_toml_str(&text)?.overlay_env(|key| std::env::var(key).ok()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn overlay_env(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = get("FACEGATE_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = get("FACEGATE_CAMERA_DEVICE") {
            self.camera_device = v;
        }
        self.capture_width = parsed(&get, "FACEGATE_CAPTURE_WIDTH", self.capture_width);
        self.capture_height = parsed(&get, "FACEGATE_CAPTURE_HEIGHT", self.capture_height);
        self.warmup_frames = parsed(&get, "FACEGATE_WARMUP_FRAMES", self.warmup_frames);
        self.message_dismiss_secs =
            parsed(&get, "FACEGATE_MESSAGE_DISMISS_SECS", self.message_dismiss_secs);
        self
    }

    pub fn constraints(&self) -> MediaConstraints {
        MediaConstraints {
            ideal_width: self.capture_width,
            ideal_height: self.capture_height,
            ..MediaConstraints::default()
        }
    }

    pub fn message_dismiss(&self) -> Duration {
        Duration::from_secs(self.message_dismiss_secs)
    }
}

fn parsed<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match get(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable value");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.api_base_url, "http://127.0.0.1:5000");
        assert_eq!(cfg.message_dismiss(), Duration::from_secs(3));
        let c = cfg.constraints();
        assert_eq!((c.ideal_width, c.ideal_height), (1280, 720));
        assert!(!c.audio);
    }

    #[test]
    fn test_env_overrides_file() {
        let cfg = Config::from_toml_str(
            r#"
            api_base_url = "https://faces.example.com"
            warmup_frames = 8
            "#,
        )
        .unwrap()
        .overlay_env(env(&[
            ("FACEGATE_WARMUP_FRAMES", "2"),
            ("FACEGATE_CAPTURE_WIDTH", "wide"),
        ]));
        assert_eq!(cfg.api_base_url, "https://faces.example.com");
        assert_eq!(cfg.warmup_frames, 2);
        assert_eq!(cfg.capture_width, 1280);
        assert_eq!(cfg.camera_device, "/dev/video0");
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            Config::from_toml_str("warmup_frames = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_without_file_reads_env() {
        if std::env::var_os("FACEGATE_CONFIG").is_some() {
            return;
        }
        assert_eq!(Config::load(None).unwrap(), Config::from_env());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/facegate.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
