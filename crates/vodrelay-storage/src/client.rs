//! rclone wrapper.
//!
//! Listing operations degrade to empty results on transport errors: an
//! unreachable remote means "nothing to do", never a crash. Mounting is
//! best-effort; when it fails the pipeline falls back to per-file download.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::process::Command;

use vodrelay_core::config::RemoteStorageConfig;
use vodrelay_core::process::{run_quiet, run_streaming};
use vodrelay_core::{Config, RelayError, RelayResult, VideoRecord};

const RCLONE_BIN: &str = "rclone";
const FUSERMOUNT_BIN: &str = "fusermount";
/// Container the recorder writes.
const VIDEO_EXT: &str = "flv";
/// Grace period for the daemonized mount to come up.
const MOUNT_SETTLE: Duration = Duration::from_secs(3);

pub struct RemoteStorageClient {
    remote: String,
    backup_path: String,
    mount_point: PathBuf,
    mounted: AtomicBool,
}

impl RemoteStorageClient {
    pub fn new(config: &Config) -> Self {
        let RemoteStorageConfig {
            remote,
            backup_path,
            mount_point,
        } = config.remote_storage.clone();
        RemoteStorageClient {
            remote,
            backup_path,
            mount_point,
            mounted: AtomicBool::new(false),
        }
    }

    fn remote_path(&self, sub_path: &str) -> String {
        if sub_path.is_empty() {
            format!("{}:{}", self.remote, self.backup_path)
        } else {
            format!("{}:{}/{}", self.remote, self.backup_path, sub_path)
        }
    }

    /// Streamer folders under the backup root. Empty on transport error.
    pub async fn list_folders(&self) -> Vec<String> {
        let mut cmd = Command::new(RCLONE_BIN);
        cmd.arg("lsd").arg(self.remote_path(""));
        match run_quiet(cmd).await {
            Ok((status, stdout, _)) if status.success() => {
                stdout.lines().filter_map(parse_lsd_line).collect()
            }
            Ok((_, _, stderr)) => {
                tracing::warn!(error = %stderr.trim(), "failed to list remote folders");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to invoke rclone lsd");
                Vec::new()
            }
        }
    }

    /// Video files in a folder, sorted lexicographically.
    ///
    /// With the recorder's `date-time-sequence` filenames this sort order is
    /// chronological, and multi-part appends depend on it: parts must land
    /// on the platform in recording order.
    pub async fn list_videos(&self, folder: &str) -> Vec<String> {
        let mut cmd = Command::new(RCLONE_BIN);
        cmd.args(["lsf", "--files-only", "--include"])
            .arg(format!("*.{VIDEO_EXT}"))
            .arg(self.remote_path(folder));
        match run_quiet(cmd).await {
            Ok((status, stdout, _)) if status.success() => {
                let mut videos: Vec<String> = stdout
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from)
                    .collect();
                videos.sort();
                videos
            }
            Ok((_, _, stderr)) => {
                tracing::warn!(folder, error = %stderr.trim(), "failed to list videos");
                Vec::new()
            }
            Err(err) => {
                tracing::warn!(folder, error = %err, "failed to invoke rclone lsf");
                Vec::new()
            }
        }
    }

    /// Size of a single file in bytes.
    pub async fn file_size(&self, folder: &str, filename: &str) -> RelayResult<u64> {
        let mut cmd = Command::new(RCLONE_BIN);
        cmd.args(["size", "--json"])
            .arg(self.remote_path(&format!("{folder}/{filename}")));
        let (status, stdout, stderr) = run_quiet(cmd).await?;
        if !status.success() {
            return Err(RelayError::Transport(format!(
                "rclone size failed for {folder}/{filename}: {}",
                stderr.trim()
            )));
        }
        let value: serde_json::Value = serde_json::from_str(&stdout)?;
        Ok(value.get("bytes").and_then(|b| b.as_u64()).unwrap_or(0))
    }

    /// Bulk size listing for a folder; one rclone call instead of one per
    /// file. Agrees with [`file_size`](Self::file_size) for every entry.
    pub async fn all_file_sizes(&self, folder: &str) -> HashMap<String, u64> {
        let mut cmd = Command::new(RCLONE_BIN);
        cmd.arg("ls").arg(self.remote_path(folder));
        match run_quiet(cmd).await {
            Ok((status, stdout, _)) if status.success() => {
                stdout.lines().filter_map(parse_ls_line).collect()
            }
            Ok((_, _, stderr)) => {
                tracing::warn!(folder, error = %stderr.trim(), "failed to fetch file sizes");
                HashMap::new()
            }
            Err(err) => {
                tracing::warn!(folder, error = %err, "failed to invoke rclone ls");
                HashMap::new()
            }
        }
    }

    /// Build the chronological upload plan for a folder.
    ///
    /// Sizes come from one bulk listing; files the bulk call missed fall
    /// back to a per-file probe. A file whose size cannot be determined is
    /// left out of the plan entirely: `(path, size)` is the history
    /// identity, so a guessed size would be recorded and break dedup on
    /// the next run.
    pub async fn plan_folder(&self, folder: &str) -> Vec<VideoRecord> {
        let videos = self.list_videos(folder).await;
        let sizes = self.all_file_sizes(folder).await;
        let (mut plan, missing) = sized_records(folder, &videos, &sizes);

        for name in missing {
            match self.file_size(folder, &name).await {
                Ok(size) => plan.push(VideoRecord::from_listing(folder, &name, size)),
                Err(err) => {
                    tracing::warn!(
                        folder,
                        file = name,
                        error = %err,
                        "could not determine size, leaving out of the plan"
                    );
                }
            }
        }
        plan.sort_by(|a, b| a.filename.cmp(&b.filename));
        plan
    }

    /// Mount the remote under the configured mount point. Best-effort: a
    /// failed mount returns false and the caller downloads instead.
    pub async fn mount(&self) -> bool {
        if self.is_mounted() {
            return true;
        }
        if let Err(err) = tokio::fs::create_dir_all(&self.mount_point).await {
            tracing::warn!(error = %err, "failed to create mount point");
            return false;
        }

        let mut cmd = Command::new(RCLONE_BIN);
        cmd.arg("mount")
            .arg(self.remote_path(""))
            .arg(&self.mount_point)
            .args(["--daemon", "--vfs-cache-mode", "writes", "--allow-other"]);
        match run_quiet(cmd).await {
            Ok((status, _, stderr)) if !status.success() => {
                tracing::warn!(error = %stderr.trim(), "rclone mount failed");
                return false;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to invoke rclone mount");
                return false;
            }
            _ => {}
        }

        tokio::time::sleep(MOUNT_SETTLE).await;

        // A populated mount point is the only signal the daemonized mount
        // gives us.
        if dir_is_populated(&self.mount_point) {
            self.mounted.store(true, Ordering::SeqCst);
            tracing::info!(mount_point = %self.mount_point.display(), "remote mounted");
            true
        } else {
            tracing::warn!("mount point is empty, falling back to download");
            false
        }
    }

    pub async fn unmount(&self) {
        if !self.is_mounted() {
            return;
        }
        let mut cmd = Command::new(FUSERMOUNT_BIN);
        cmd.arg("-u").arg(&self.mount_point);
        match run_quiet(cmd).await {
            Ok((status, _, stderr)) if !status.success() => {
                tracing::warn!(error = %stderr.trim(), "unmount failed");
            }
            Err(err) => tracing::warn!(error = %err, "failed to invoke fusermount"),
            _ => tracing::info!("remote unmounted"),
        }
        self.mounted.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Path of a file under the live mount, if mounted and present.
    pub fn mounted_path(&self, folder: &str, filename: &str) -> Option<PathBuf> {
        if !self.is_mounted() {
            return None;
        }
        let path = self.mount_point.join(folder).join(filename);
        path.exists().then_some(path)
    }

    /// Download one remote file next to `local_path`, streaming rclone's
    /// progress output. Nothing is recorded anywhere on failure; the caller
    /// owns all bookkeeping.
    pub async fn download(&self, remote_file: &str, local_path: &Path) -> RelayResult<()> {
        let parent = local_path
            .parent()
            .ok_or_else(|| RelayError::Transport(format!(
                "download target {} has no parent directory",
                local_path.display()
            )))?;
        tokio::fs::create_dir_all(parent).await?;

        tracing::info!(remote_file, dest = %local_path.display(), "downloading from remote");
        let mut cmd = Command::new(RCLONE_BIN);
        cmd.arg("copy")
            .arg(self.remote_path(remote_file))
            .arg(parent)
            .args(["--progress", "--stats", "1s"]);
        let (status, _) = run_streaming(cmd, RCLONE_BIN).await?;
        if !status.success() {
            return Err(RelayError::Transport(format!(
                "rclone copy exited with {status} for {remote_file}"
            )));
        }
        tracing::info!(dest = %local_path.display(), "download complete");
        Ok(())
    }

    /// Names of all configured rclone remotes.
    pub async fn list_remotes(&self) -> Vec<String> {
        let mut cmd = Command::new(RCLONE_BIN);
        cmd.arg("listremotes");
        match run_quiet(cmd).await {
            Ok((status, stdout, _)) if status.success() => stdout
                .lines()
                .map(|l| l.trim().trim_end_matches(':').to_string())
                .filter(|l| !l.is_empty())
                .collect(),
            _ => {
                tracing::warn!("failed to list rclone remotes");
                Vec::new()
            }
        }
    }

    /// Probe that a remote (default: the configured one) answers a listing.
    pub async fn test_connection(&self, remote: Option<&str>) -> bool {
        let remote = remote.unwrap_or(&self.remote);
        let mut cmd = Command::new(RCLONE_BIN);
        cmd.arg("lsd")
            .arg(format!("{}:{}", remote, self.backup_path))
            .args(["--max-depth", "1"]);
        matches!(run_quiet(cmd).await, Ok((status, _, _)) if status.success())
    }
}

/// Records for every video with a known size, plus the names the size
/// listing missed. Never invents a size.
fn sized_records(
    folder: &str,
    videos: &[String],
    sizes: &HashMap<String, u64>,
) -> (Vec<VideoRecord>, Vec<String>) {
    let mut records = Vec::with_capacity(videos.len());
    let mut missing = Vec::new();
    for name in videos {
        match sizes.get(name) {
            Some(size) => records.push(VideoRecord::from_listing(folder, name, *size)),
            None => missing.push(name.clone()),
        }
    }
    (records, missing)
}

/// True when `path` is a readable directory with at least one entry.
fn dir_is_populated(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Parse one `rclone lsd` line, e.g.
/// `          -1 2025-09-27 06:31:34        -1 42-somecaster`.
fn parse_lsd_line(line: &str) -> Option<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() >= 5 {
        Some(parts[4..].join(" "))
    } else {
        None
    }
}

/// Parse one `rclone ls` line: `<size> <name with spaces>`.
fn parse_ls_line(line: &str) -> Option<(String, u64)> {
    let (size, name) = line.trim().split_once(char::is_whitespace)?;
    let size = size.parse().ok()?;
    Some((name.trim().to_string(), size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lsd_output() {
        let line = "          -1 2025-09-27 06:31:34        -1 42-somecaster";
        assert_eq!(parse_lsd_line(line), Some("42-somecaster".to_string()));

        let spaced = "           0 2025-09-27 06:31:34        -1 42-some caster";
        assert_eq!(parse_lsd_line(spaced), Some("42-some caster".to_string()));

        assert_eq!(parse_lsd_line("garbage"), None);
    }

    #[test]
    fn parses_ls_output() {
        assert_eq!(
            parse_ls_line("8670013105 rec-42-20250101-120000-1-Title.flv"),
            Some(("rec-42-20250101-120000-1-Title.flv".to_string(), 8670013105))
        );
        assert_eq!(
            parse_ls_line("  12 name with spaces.flv"),
            Some(("name with spaces.flv".to_string(), 12))
        );
        assert_eq!(parse_ls_line(""), None);
        assert_eq!(parse_ls_line("notasize file.flv"), None);
    }

    #[test]
    fn plan_never_defaults_a_missing_size_to_zero() {
        let videos = vec!["a.flv".to_string(), "b.flv".to_string()];
        let sizes: HashMap<String, u64> = [("a.flv".to_string(), 5)].into_iter().collect();

        let (records, missing) = sized_records("42-x", &videos, &sizes);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size, 5);
        assert_eq!(missing, vec!["b.flv".to_string()]);

        // A degraded bulk listing defers every file to the per-file probe.
        let (records, missing) = sized_records("42-x", &videos, &HashMap::new());
        assert!(records.is_empty());
        assert_eq!(missing.len(), 2);
    }

    #[test]
    fn populated_dir_check_covers_empty_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!dir_is_populated(dir.path()));
        assert!(!dir_is_populated(&dir.path().join("does-not-exist")));

        std::fs::write(dir.path().join("a.flv"), b"x").unwrap();
        assert!(dir_is_populated(dir.path()));
    }

    #[test]
    fn mounted_path_requires_live_mount() {
        let config = test_config();
        let client = RemoteStorageClient::new(&config);
        assert!(client.mounted_path("folder", "a.flv").is_none());
    }

    #[test]
    fn remote_path_composition() {
        let config = test_config();
        let client = RemoteStorageClient::new(&config);
        assert_eq!(client.remote_path(""), "gdrive:recordings");
        assert_eq!(client.remote_path("42-x/a.flv"), "gdrive:recordings/42-x/a.flv");
    }

    fn test_config() -> Config {
        serde_json::from_value(serde_json::json!({
            "remote_storage": {
                "remote": "gdrive",
                "backup_path": "recordings",
                "mount_point": "/mnt/recordings"
            },
            "platform": {
                "default_category": 171,
                "default_tags": [],
                "source_template": "{room_id}",
                "description_template": "{streamer_name} {date}"
            },
            "upload": {
                "max_file_size_gb": 15.0,
                "split_margin_gb": 14.5,
                "retry_times": 3,
                "local_cache_path": "/tmp/vodrelay",
                "min_free_space_gb": 5.0
            },
            "cover": { "extract_time_sec": 1.0, "output_format": "jpg", "quality": 2 },
            "platform_client": {
                "executable": "/usr/local/bin/uploader",
                "cookie_file": "/tmp/cookies.json",
                "default_submit_mode": "client",
                "proxy": null
            }
        }))
        .unwrap()
    }
}
