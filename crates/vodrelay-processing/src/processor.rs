//! ffmpeg/ffprobe wrapper.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use vodrelay_core::config::CoverConfig;
use vodrelay_core::process::{run_quiet, run_streaming};
use vodrelay_core::{format_size, Config, RelayError, RelayResult};

use crate::segments::plan_segments;

const FFMPEG_BIN: &str = "ffmpeg";
const FFPROBE_BIN: &str = "ffprobe";

pub struct MediaProcessor {
    cover: CoverConfig,
    split_margin_gb: f64,
}

impl MediaProcessor {
    pub fn new(config: &Config) -> Self {
        MediaProcessor {
            cover: config.cover.clone(),
            split_margin_gb: config.upload.split_margin_gb,
        }
    }

    /// Total duration in seconds, from ffprobe's JSON output.
    ///
    /// A probe failure is deterministic: the same file will fail the same
    /// way on a retry, so callers treat this as fatal for splitting.
    pub async fn probe_duration(&self, path: &Path) -> RelayResult<f64> {
        let mut cmd = Command::new(FFPROBE_BIN);
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path);
        let (status, stdout, stderr) = run_quiet(cmd).await?;
        if !status.success() {
            return Err(RelayError::MediaProbe(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        let probe: serde_json::Value = serde_json::from_str(&stdout)
            .map_err(|e| RelayError::MediaProbe(format!("unparsable ffprobe output: {e}")))?;
        probe["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| *d > 0.0)
            .ok_or_else(|| {
                RelayError::MediaProbe(format!("no duration reported for {}", path.display()))
            })
    }

    /// Extract a still-frame cover image. Best-effort: a missing cover never
    /// blocks an upload, so failures only log.
    pub async fn extract_cover(&self, video_path: &Path, output_path: &Path) -> bool {
        if let Some(parent) = output_path.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(error = %err, "failed to create cover directory");
                return false;
            }
        }

        let mut cmd = Command::new(FFMPEG_BIN);
        cmd.arg("-y")
            .arg("-ss")
            .arg(self.cover.extract_time_sec.to_string())
            .arg("-i")
            .arg(video_path)
            .args(["-vframes", "1", "-q:v"])
            .arg(self.cover.quality.to_string())
            .arg(output_path);

        match run_quiet(cmd).await {
            Ok((status, _, stderr)) => {
                if !status.success() {
                    tracing::warn!(error = %stderr.trim(), "ffmpeg cover extraction reported errors");
                }
                // ffmpeg sometimes exits non-zero after still writing the
                // frame; the output file is the source of truth.
                if output_path.exists() {
                    tracing::info!(cover = %output_path.display(), "cover extracted");
                    true
                } else {
                    tracing::warn!(video = %video_path.display(), "cover file was not produced");
                    false
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to invoke ffmpeg for cover");
                false
            }
        }
    }

    /// Split a video into `ceil(size_gb / split_margin_gb)` stream-copied
    /// segments under `output_dir`, returning them in playback order.
    ///
    /// All-or-nothing: if any segment fails to materialize the whole split
    /// fails, because a partial split must never be submitted.
    pub async fn split_by_count(
        &self,
        video_path: &Path,
        output_dir: &Path,
        size_gb: f64,
    ) -> RelayResult<Vec<PathBuf>> {
        let duration = self.probe_duration(video_path).await?;
        let segments = plan_segments(duration, size_gb, self.split_margin_gb);

        tracing::info!(
            video = %video_path.display(),
            size = %format_size((size_gb * vodrelay_core::GIB) as u64),
            parts = segments.len(),
            part_minutes = format!("{:.1}", duration / segments.len() as f64 / 60.0),
            "splitting video"
        );

        tokio::fs::create_dir_all(output_dir).await?;

        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let ext = video_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "flv".to_string());

        let mut outputs = Vec::with_capacity(segments.len());
        for segment in &segments {
            let output = output_dir.join(format!("{stem}_part{}.{ext}", segment.index));
            tracing::info!(part = segment.index, total = segments.len(), "cutting segment");

            let mut cmd = Command::new(FFMPEG_BIN);
            cmd.arg("-y")
                .arg("-ss")
                .arg(segment.start.to_string())
                .arg("-i")
                .arg(video_path)
                .arg("-t")
                .arg(segment.duration.to_string())
                .args(["-c", "copy", "-loglevel", "warning"])
                .arg(&output);
            let (status, _) = run_streaming(cmd, FFMPEG_BIN).await?;

            if !status.success() || !output.exists() {
                return Err(RelayError::Split(format!(
                    "segment {} of {} failed for {}",
                    segment.index,
                    segments.len(),
                    video_path.display()
                )));
            }
            outputs.push(output);
        }

        tracing::info!(parts = outputs.len(), "split complete");
        Ok(outputs)
    }
}
