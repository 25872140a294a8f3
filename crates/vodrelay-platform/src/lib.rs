//! Wrapper around the external uploader CLI.
//!
//! The uploader is the only path to the video platform; this crate drives it
//! as a child process and parses its human-oriented output. Everything that
//! parses is kept in `submission` as pure functions so the brittle part is
//! fully unit-tested.

mod client;
mod submission;

pub use client::{Copyright, PlatformClient, UploadRequest};
pub use submission::{parse_submission_id, strip_ansi, RemotePost};
