//! Configuration.
//!
//! The whole tool is driven by one JSON config file, deserialized into typed
//! structs and validated once at load. Unknown or missing keys fail fast with
//! a descriptive error instead of defaulting somewhere deep in the pipeline.
//! There is no global config value: the loaded `Config` is passed into each
//! component's constructor.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub remote_storage: RemoteStorageConfig,
    pub platform: PlatformConfig,
    pub upload: UploadConfig,
    pub cover: CoverConfig,
    pub platform_client: PlatformClientConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteStorageConfig {
    /// Name of the configured rclone remote.
    pub remote: String,
    /// Path within the remote that holds one folder per streamer.
    pub backup_path: String,
    /// Local directory the remote is mounted onto.
    pub mount_point: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// Category id posts are filed under.
    pub default_category: u32,
    pub default_tags: Vec<String>,
    /// Template for the "source" field; `{room_id}` is substituted.
    pub source_template: String,
    /// Template for the post description; `{streamer_name}` and `{date}`
    /// are substituted.
    pub description_template: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    /// Files larger than this are split before submission.
    pub max_file_size_gb: f64,
    /// Target size per split segment, kept under the platform's hard limit.
    pub split_margin_gb: f64,
    /// Attempts per video before it is recorded as failed.
    pub retry_times: u32,
    /// Scratch directory for downloads, split segments and covers.
    pub local_cache_path: PathBuf,
    /// Free space that must remain after a download.
    pub min_free_space_gb: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoverConfig {
    /// Timestamp the cover frame is taken at.
    pub extract_time_sec: f64,
    /// Image extension passed through to ffmpeg (jpg, png, ...).
    pub output_format: String,
    /// ffmpeg `-q:v` value.
    pub quality: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitMode {
    Client,
    App,
    Web,
}

impl SubmitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitMode::Client => "client",
            SubmitMode::App => "app",
            SubmitMode::Web => "web",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformClientConfig {
    /// Path to the uploader executable.
    pub executable: PathBuf,
    /// Cookie file handed to every invocation.
    pub cookie_file: PathBuf,
    pub default_submit_mode: SubmitMode,
    /// Optional proxy URL, passed to the tool when set.
    pub proxy: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Persist the configuration back to disk after a mutation (remote
    /// switch, proxy change).
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, raw + "\n")
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.upload.max_file_size_gb <= 0.0 {
            anyhow::bail!("upload.max_file_size_gb must be positive");
        }
        if self.upload.split_margin_gb <= 0.0 {
            anyhow::bail!("upload.split_margin_gb must be positive");
        }
        if self.upload.split_margin_gb > self.upload.max_file_size_gb {
            anyhow::bail!(
                "upload.split_margin_gb ({}) must not exceed upload.max_file_size_gb ({})",
                self.upload.split_margin_gb,
                self.upload.max_file_size_gb
            );
        }
        if self.upload.retry_times == 0 {
            anyhow::bail!("upload.retry_times must be at least 1");
        }
        if self.upload.min_free_space_gb < 0.0 {
            anyhow::bail!("upload.min_free_space_gb must not be negative");
        }
        if self.cover.quality == 0 {
            anyhow::bail!("cover.quality must be positive");
        }
        if self.remote_storage.remote.is_empty() {
            anyhow::bail!("remote_storage.remote must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "remote_storage": {
                "remote": "gdrive",
                "backup_path": "recordings",
                "mount_point": "/mnt/recordings"
            },
            "platform": {
                "default_category": 171,
                "default_tags": ["livestream", "archive"],
                "source_template": "https://live.example.com/{room_id}",
                "description_template": "{streamer_name} recorded {date}"
            },
            "upload": {
                "max_file_size_gb": 15.0,
                "split_margin_gb": 14.5,
                "retry_times": 3,
                "local_cache_path": "/tmp/vodrelay",
                "min_free_space_gb": 5.0
            },
            "cover": {
                "extract_time_sec": 1.0,
                "output_format": "jpg",
                "quality": 2
            },
            "platform_client": {
                "executable": "/usr/local/bin/uploader",
                "cookie_file": "/etc/vodrelay/cookies.json",
                "default_submit_mode": "client",
                "proxy": null
            }
        })
    }

    fn write_config(value: &serde_json::Value) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(value).unwrap()).unwrap();
        file
    }

    #[test]
    fn loads_valid_config() {
        let file = write_config(&sample_json());
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.remote_storage.remote, "gdrive");
        assert_eq!(config.platform_client.default_submit_mode, SubmitMode::Client);
        assert!(config.platform_client.proxy.is_none());
    }

    #[test]
    fn rejects_unknown_keys() {
        let mut value = sample_json();
        value["upload"]["max_filesize_gb"] = serde_json::json!(15.0);
        let file = write_config(&value);
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn rejects_missing_keys() {
        let mut value = sample_json();
        value["upload"].as_object_mut().unwrap().remove("retry_times");
        let file = write_config(&value);
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn rejects_invalid_submit_mode() {
        let mut value = sample_json();
        value["platform_client"]["default_submit_mode"] = serde_json::json!("carrier-pigeon");
        let file = write_config(&value);
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn rejects_margin_above_threshold() {
        let mut value = sample_json();
        value["upload"]["split_margin_gb"] = serde_json::json!(20.0);
        let file = write_config(&value);
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn save_round_trips() {
        let file = write_config(&sample_json());
        let mut config = Config::load(file.path()).unwrap();
        config.platform_client.proxy = Some("socks5://127.0.0.1:1080".to_string());
        config.save(file.path()).unwrap();
        let reloaded = Config::load(file.path()).unwrap();
        assert_eq!(
            reloaded.platform_client.proxy.as_deref(),
            Some("socks5://127.0.0.1:1080")
        );
    }
}
