//! Remote storage access through the `rclone` executable.

mod client;

pub use client::RemoteStorageClient;
