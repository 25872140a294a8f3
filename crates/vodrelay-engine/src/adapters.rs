//! Production implementations of the pipeline seams.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use vodrelay_core::RelayResult;
use vodrelay_platform::{PlatformClient, UploadRequest};
use vodrelay_processing::MediaProcessor;
use vodrelay_storage::RemoteStorageClient;

pub struct MountedStorage {
    pub client: RemoteStorageClient,
}

#[async_trait]
impl crate::VideoAcquirer for MountedStorage {
    fn mounted_path(&self, folder: &str, filename: &str) -> Option<PathBuf> {
        self.client.mounted_path(folder, filename)
    }

    async fn download(&self, remote_file: &str, local_path: &Path) -> RelayResult<()> {
        self.client.download(remote_file, local_path).await
    }

    async fn release(&self) {
        self.client.unmount().await;
    }
}

pub struct ProcessorPreparer {
    pub processor: MediaProcessor,
}

#[async_trait]
impl crate::MediaPreparer for ProcessorPreparer {
    async fn split(
        &self,
        video_path: &Path,
        output_dir: &Path,
        size_gb: f64,
    ) -> RelayResult<Vec<PathBuf>> {
        self.processor
            .split_by_count(video_path, output_dir, size_gb)
            .await
    }

    async fn extract_cover(&self, video_path: &Path, output_path: &Path) -> bool {
        self.processor.extract_cover(video_path, output_path).await
    }
}

pub struct UploaderPublisher {
    pub client: PlatformClient,
}

#[async_trait]
impl crate::PostPublisher for UploaderPublisher {
    async fn upload(&self, request: &UploadRequest) -> RelayResult<String> {
        self.client.upload(request).await
    }

    async fn append(&self, platform_id: &str, path: &Path) -> RelayResult<()> {
        self.client.append(platform_id, path).await
    }
}
