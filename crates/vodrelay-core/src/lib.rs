//! Core types for vodrelay: configuration, errors, domain models, and the
//! shared traits the other crates hang off of.

pub mod config;
pub mod error;
pub mod models;
pub mod process;
pub mod traits;

pub use config::{Config, SubmitMode};
pub use error::{RelayError, RelayResult};
pub use models::{FailureEntry, UploadHistoryEntry, VideoRecord};
pub use traits::PostValidator;

/// One gibibyte, the unit all size thresholds are expressed in.
pub const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Human-readable byte size for progress output.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.2} PB", value)
}
