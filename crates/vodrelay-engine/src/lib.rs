//! The upload pipeline.
//!
//! The engine walks a chronologically ordered batch of videos and, for each
//! one: skips it if history says it was already submitted, acquires the
//! bytes (live mount or download), splits oversized files, submits the parts
//! in order, and records the outcome durably. Acquisition, preparation and
//! publishing sit behind traits so the pipeline's sequencing, retry and
//! resume behavior is testable without rclone, ffmpeg or the uploader.

mod adapters;
mod capacity;
mod engine;
mod stats;
mod traits;

pub use adapters::{MountedStorage, ProcessorPreparer, UploaderPublisher};
pub use capacity::{CapacityGate, DiskProbe, SpaceProbe};
pub use engine::{EngineSettings, Outcome, SubmitTarget, UploadEngine};
pub use stats::BatchStats;
pub use traits::{MediaPreparer, PostPublisher, VideoAcquirer};
