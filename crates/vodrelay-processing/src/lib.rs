//! Media probing, cover extraction and stream-copy splitting via
//! ffmpeg/ffprobe.

mod processor;
mod segments;

pub use processor::MediaProcessor;
pub use segments::{plan_segments, Segment};
