//! Seams between the pipeline and the external tools it drives.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use vodrelay_core::RelayResult;
use vodrelay_platform::UploadRequest;

/// Source of video bytes: a live mount or a per-file download.
#[async_trait]
pub trait VideoAcquirer: Send + Sync {
    /// Local path of the file under a live mount, if one is up and the file
    /// is visible there.
    fn mounted_path(&self, folder: &str, filename: &str) -> Option<PathBuf>;

    /// Copy one remote file (given as `folder/filename`) to `local_path`.
    async fn download(&self, remote_file: &str, local_path: &Path) -> RelayResult<()>;

    /// Tear down any mount held by this acquirer.
    async fn release(&self);
}

/// Media preparation: splitting and cover extraction.
#[async_trait]
pub trait MediaPreparer: Send + Sync {
    /// Split into size-bounded segments under `output_dir`, in playback
    /// order.
    async fn split(
        &self,
        video_path: &Path,
        output_dir: &Path,
        size_gb: f64,
    ) -> RelayResult<Vec<PathBuf>>;

    /// Best-effort cover frame; false means "submit without a cover".
    async fn extract_cover(&self, video_path: &Path, output_path: &Path) -> bool;
}

/// The platform side: create posts and append parts to them.
#[async_trait]
pub trait PostPublisher: Send + Sync {
    /// Create a new post, returning its platform id.
    async fn upload(&self, request: &UploadRequest) -> RelayResult<String>;

    /// Append one file to an existing post.
    async fn append(&self, platform_id: &str, path: &Path) -> RelayResult<()>;
}
