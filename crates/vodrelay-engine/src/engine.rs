//! Pipeline sequencing, retry and resume.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use vodrelay_core::{format_size, Config, RelayError, RelayResult, VideoRecord};
use vodrelay_history::HistoryStore;
use vodrelay_platform::{Copyright, UploadRequest};

use crate::capacity::CapacityGate;
use crate::stats::BatchStats;
use crate::traits::{MediaPreparer, PostPublisher, VideoAcquirer};

/// Where a batch's parts land.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitTarget {
    /// Each video becomes its own new post.
    NewPost,
    /// Every part of every video is appended to this existing post.
    Existing(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Done,
    Skipped,
    Failed,
    Cancelled,
}

/// Pipeline stage, for structured progress logs.
#[derive(Clone, Copy, Debug)]
enum Stage {
    Acquiring,
    Splitting,
    Submitting,
}

/// Submission progress for one video, carried across retry attempts so a
/// retry resumes appending at the first unsent part instead of creating a
/// second post. In-memory only: a process restart starts the video over.
#[derive(Clone, Debug, Default)]
struct Checkpoint {
    platform_id: Option<String>,
    parts_done: usize,
}

#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub max_file_size_gb: f64,
    pub retry_times: u32,
    pub retry_delay: Duration,
    /// Scratch root holding `downloads/`, `splits/` and `covers/`.
    pub scratch: PathBuf,
    pub category: u32,
    pub tags: Vec<String>,
    pub source_template: String,
    pub description_template: String,
    pub cover_format: String,
    pub copyright: Copyright,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        EngineSettings {
            max_file_size_gb: config.upload.max_file_size_gb,
            retry_times: config.upload.retry_times,
            retry_delay: Duration::from_secs(2),
            scratch: config.upload.local_cache_path.clone(),
            category: config.platform.default_category,
            tags: config.platform.default_tags.clone(),
            source_template: config.platform.source_template.clone(),
            description_template: config.platform.description_template.clone(),
            cover_format: config.cover.output_format.clone(),
            copyright: Copyright::Reprint,
        }
    }
}

pub struct UploadEngine<A, M, P> {
    acquirer: A,
    preparer: M,
    publisher: P,
    history: HistoryStore,
    gate: CapacityGate,
    settings: EngineSettings,
    cancel: CancellationToken,
}

impl<A, M, P> UploadEngine<A, M, P>
where
    A: VideoAcquirer,
    M: MediaPreparer,
    P: PostPublisher,
{
    pub fn new(
        acquirer: A,
        preparer: M,
        publisher: P,
        history: HistoryStore,
        gate: CapacityGate,
        settings: EngineSettings,
        cancel: CancellationToken,
    ) -> Self {
        UploadEngine {
            acquirer,
            preparer,
            publisher,
            history,
            gate,
            settings,
            cancel,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Process the batch in order, one video at a time. Videos are never
    /// interleaved: parts of a split file must land on the platform in
    /// recording order before the next video starts.
    pub async fn run_batch(&mut self, videos: &[VideoRecord], target: &SubmitTarget) -> BatchStats {
        let mut stats = BatchStats::default();
        for (i, video) in videos.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!("cancellation requested, stopping batch");
                break;
            }
            tracing::info!(
                progress = format!("{}/{}", i + 1, videos.len()),
                file = video.remote_path(),
                size = %format_size(video.size),
                "processing video"
            );
            let outcome = self.process_video(video, target).await;
            stats.record(outcome);
            tracing::info!(
                success = stats.success,
                failed = stats.failed,
                skipped = stats.skipped,
                "batch progress"
            );
            if outcome == Outcome::Cancelled {
                break;
            }
        }
        stats
    }

    /// One video end to end: skip check, then up to `retry_times` attempts
    /// at acquisition, preparation and submission. The checkpoint survives
    /// attempts, so a retry after a half-submitted split resumes appending
    /// rather than re-posting.
    pub async fn process_video(&mut self, video: &VideoRecord, target: &SubmitTarget) -> Outcome {
        let path = video.remote_path();
        if self.history.is_uploaded(&path, video.size) {
            tracing::info!(file = path, "already uploaded, skipping");
            return Outcome::Skipped;
        }

        let needs_split = video.size_gb() > self.settings.max_file_size_gb;
        let mut checkpoint = Checkpoint {
            platform_id: match target {
                SubmitTarget::Existing(id) => Some(id.clone()),
                SubmitTarget::NewPost => None,
            },
            parts_done: 0,
        };

        for attempt in 1..=self.settings.retry_times {
            if self.cancel.is_cancelled() {
                self.cleanup_video(video).await;
                return Outcome::Cancelled;
            }

            match self.attempt(video, needs_split, &mut checkpoint).await {
                Ok(parts) => {
                    let platform_id = checkpoint.platform_id.clone().unwrap_or_default();
                    if let Err(err) =
                        self.history
                            .record_success(&path, video.size, &platform_id, needs_split, parts)
                    {
                        tracing::error!(file = path, error = %err, "failed to persist history");
                    }
                    self.cleanup_video(video).await;
                    return Outcome::Done;
                }
                Err(RelayError::Cancelled) => {
                    self.cleanup_video(video).await;
                    return Outcome::Cancelled;
                }
                Err(err) if err.is_retryable() && attempt < self.settings.retry_times => {
                    tracing::warn!(
                        file = path,
                        attempt,
                        max_attempts = self.settings.retry_times,
                        error = %err,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Err(err) => {
                    tracing::error!(file = path, error = %err, "giving up on video");
                    if let Err(persist_err) = self.history.record_failure(&path, &err.to_string())
                    {
                        tracing::error!(file = path, error = %persist_err, "failed to persist failure");
                    }
                    self.cleanup_video(video).await;
                    return Outcome::Failed;
                }
            }
        }
        Outcome::Failed
    }

    /// One attempt: acquire bytes, prepare parts, submit whatever the
    /// checkpoint says is still unsent. Returns the submitted part names.
    async fn attempt(
        &mut self,
        video: &VideoRecord,
        needs_split: bool,
        checkpoint: &mut Checkpoint,
    ) -> RelayResult<Vec<String>> {
        tracing::debug!(file = video.remote_path(), stage = ?Stage::Acquiring);
        let local = self.acquire(video, needs_split).await?;
        if self.cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }

        let parts = if needs_split {
            tracing::debug!(file = video.remote_path(), stage = ?Stage::Splitting);
            let split_dir = self.split_dir(video);
            self.preparer
                .split(&local, &split_dir, video.size_gb())
                .await?
        } else {
            vec![local]
        };
        if self.cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }

        tracing::debug!(file = video.remote_path(), stage = ?Stage::Submitting, parts = parts.len());
        self.submit_parts(video, &parts, checkpoint).await?;

        Ok(parts
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
            .collect())
    }

    /// Prefer the live mount for files that can be submitted as-is;
    /// splitting reads the file several times over, which is what the local
    /// copy is for. Downloads pass the capacity gate first.
    async fn acquire(&self, video: &VideoRecord, needs_split: bool) -> RelayResult<PathBuf> {
        if !needs_split {
            if let Some(path) = self.acquirer.mounted_path(&video.folder, &video.filename) {
                tracing::info!(file = %path.display(), "using file from mount");
                return Ok(path);
            }
        }

        self.gate.ensure(&self.settings.scratch, video.size)?;
        let local = self.download_target(video);
        self.acquirer.download(&video.remote_path(), &local).await?;
        Ok(local)
    }

    /// Submit all parts past the checkpoint, in order. The first part of a
    /// new post carries the metadata and cover; every later part is an
    /// append to the id the first part returned.
    async fn submit_parts(
        &self,
        video: &VideoRecord,
        parts: &[PathBuf],
        checkpoint: &mut Checkpoint,
    ) -> RelayResult<()> {
        for (idx, part) in parts.iter().enumerate() {
            if idx < checkpoint.parts_done {
                continue;
            }
            if self.cancel.is_cancelled() {
                return Err(RelayError::Cancelled);
            }

            match checkpoint.platform_id.clone() {
                None => {
                    let cover = self.prepare_cover(video, part).await;
                    let title = if parts.len() > 1 {
                        video.part_title(idx + 1)
                    } else {
                        video.title.clone()
                    };
                    let mut tags = self.settings.tags.clone();
                    if !tags.contains(&video.streamer_name) {
                        tags.push(video.streamer_name.clone());
                    }
                    let request = UploadRequest {
                        path: part.clone(),
                        title,
                        description: video.description(&self.settings.description_template),
                        category: self.settings.category,
                        tags,
                        source: video.source(&self.settings.source_template),
                        cover,
                        copyright: self.settings.copyright,
                    };
                    let id = self.publisher.upload(&request).await?;
                    checkpoint.platform_id = Some(id);
                }
                Some(id) => {
                    self.publisher.append(&id, part).await?;
                }
            }
            checkpoint.parts_done = idx + 1;
        }
        Ok(())
    }

    async fn prepare_cover(&self, video: &VideoRecord, first_part: &Path) -> Option<PathBuf> {
        let cover = self.cover_target(video);
        if self.preparer.extract_cover(first_part, &cover).await {
            Some(cover)
        } else {
            None
        }
    }

    fn download_target(&self, video: &VideoRecord) -> PathBuf {
        self.settings.scratch.join("downloads").join(&video.filename)
    }

    fn split_dir(&self, video: &VideoRecord) -> PathBuf {
        self.settings.scratch.join("splits").join(self.stem(video))
    }

    fn cover_target(&self, video: &VideoRecord) -> PathBuf {
        self.settings
            .scratch
            .join("covers")
            .join(format!("{}.{}", self.stem(video), self.settings.cover_format))
    }

    fn stem(&self, video: &VideoRecord) -> String {
        Path::new(&video.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| video.filename.clone())
    }

    /// Drop this video's scratch artifacts. Mounted files are untouched.
    async fn cleanup_video(&self, video: &VideoRecord) {
        let _ = tokio::fs::remove_file(self.download_target(video)).await;
        let _ = tokio::fs::remove_dir_all(self.split_dir(video)).await;
        let _ = tokio::fs::remove_file(self.cover_target(video)).await;
    }

    /// Release the mount and clear the scratch directories.
    pub async fn shutdown(&self) {
        self.acquirer.release().await;
        for sub in ["downloads", "splits", "covers"] {
            let _ = tokio::fs::remove_dir_all(self.settings.scratch.join(sub)).await;
        }
        tracing::info!("engine shut down");
    }
}
