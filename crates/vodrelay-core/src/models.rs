//! Domain models.
//!
//! `VideoRecord` is rebuilt from remote listings on every run and never
//! persisted; the history and failure entries are the durable records.

use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Filename grammar produced by the recorder:
/// `prefix-{streamerId}-{YYYYMMDD}-{HHMMSS}-{sequence}-{title}.{ext}`.
fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^-]+-(\d+)-(\d{8})-(\d{6})-(\d+)-(.+)\.[^.]+$")
            .expect("filename pattern is valid")
    })
}

/// One source video on the remote store.
///
/// Parsing never fails: a filename outside the grammar degrades to an
/// `"unknown"` streamer id with the file stem as title.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoRecord {
    pub folder: String,
    pub filename: String,
    pub size: u64,
    /// Live-room id, taken from the folder name (`{roomId}-{streamerName}`).
    pub room_id: String,
    pub streamer_name: String,
    /// Streamer id embedded in the filename; `"unknown"` when unparsable.
    pub streamer_id: String,
    pub captured_at: Option<NaiveDateTime>,
    pub sequence: u32,
    pub title: String,
}

impl VideoRecord {
    pub fn from_listing(folder: &str, filename: &str, size: u64) -> Self {
        let (room_id, streamer_name) = match folder.split_once('-') {
            Some((room, name)) => (room.to_string(), name.to_string()),
            None => (folder.to_string(), folder.to_string()),
        };

        if let Some(caps) = filename_pattern().captures(filename) {
            let captured_at = NaiveDateTime::parse_from_str(
                &format!("{}{}", &caps[2], &caps[3]),
                "%Y%m%d%H%M%S",
            )
            .ok();
            VideoRecord {
                folder: folder.to_string(),
                filename: filename.to_string(),
                size,
                room_id,
                streamer_name,
                streamer_id: caps[1].to_string(),
                captured_at,
                sequence: caps[4].parse().unwrap_or(0),
                title: caps[5].to_string(),
            }
        } else {
            let stem = Path::new(filename)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| filename.to_string());
            VideoRecord {
                folder: folder.to_string(),
                filename: filename.to_string(),
                size,
                room_id,
                streamer_name,
                streamer_id: "unknown".to_string(),
                captured_at: None,
                sequence: 0,
                title: stem,
            }
        }
    }

    /// Path relative to the remote backup root, the identity used in history.
    pub fn remote_path(&self) -> String {
        format!("{}/{}", self.folder, self.filename)
    }

    pub fn size_gb(&self) -> f64 {
        self.size as f64 / crate::GIB
    }

    pub fn formatted_date(&self) -> String {
        match self.captured_at {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "unknown".to_string(),
        }
    }

    /// Title for the n-th part of a split submission (1-based).
    pub fn part_title(&self, part: usize) -> String {
        format!("{} - P{}", self.title, part)
    }

    pub fn description(&self, template: &str) -> String {
        template
            .replace("{streamer_name}", &self.streamer_name)
            .replace("{date}", &self.formatted_date())
    }

    pub fn source(&self, template: &str) -> String {
        template.replace("{room_id}", &self.room_id)
    }
}

/// Durable proof that a given `(path, size)` was submitted successfully.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadHistoryEntry {
    pub file_path: String,
    pub file_size: u64,
    pub platform_id: String,
    pub upload_time: DateTime<Utc>,
    pub is_split: bool,
    #[serde(default)]
    pub parts: Vec<String>,
}

impl UploadHistoryEntry {
    pub fn new(
        file_path: String,
        file_size: u64,
        platform_id: String,
        is_split: bool,
        parts: Vec<String>,
    ) -> Self {
        UploadHistoryEntry {
            file_path,
            file_size,
            platform_id,
            upload_time: Utc::now(),
            is_split,
            parts,
        }
    }

    pub fn matches(&self, path: &str, size: u64) -> bool {
        self.file_path == path && self.file_size == size
    }
}

/// Append-only failure record; the same path may appear multiple times.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FailureEntry {
    pub file_path: String,
    pub error_message: String,
    pub failed_time: DateTime<Utc>,
}

impl FailureEntry {
    pub fn new(file_path: String, error_message: String) -> Self {
        FailureEntry {
            file_path,
            error_message,
            failed_time: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_filename() {
        let record =
            VideoRecord::from_listing("42-somecaster", "rec-42-20250101-120000-1-Title.media", 5);
        assert_eq!(record.streamer_id, "42");
        assert_eq!(record.sequence, 1);
        assert_eq!(record.title, "Title");
        assert_eq!(record.room_id, "42");
        assert_eq!(record.streamer_name, "somecaster");
        assert_eq!(record.formatted_date(), "2025-01-01 12:00:00");
        assert_eq!(record.remote_path(), "42-somecaster/rec-42-20250101-120000-1-Title.media");
    }

    #[test]
    fn title_may_contain_dashes() {
        let record = VideoRecord::from_listing(
            "42-somecaster",
            "rec-42-20250101-120000-2-late-night-run.flv",
            5,
        );
        assert_eq!(record.title, "late-night-run");
        assert_eq!(record.sequence, 2);
    }

    #[test]
    fn degrades_on_unparsable_filename() {
        let record = VideoRecord::from_listing("oddfolder", "freestyle session.flv", 9);
        assert_eq!(record.streamer_id, "unknown");
        assert_eq!(record.title, "freestyle session");
        assert!(record.captured_at.is_none());
        assert_eq!(record.formatted_date(), "unknown");
        assert_eq!(record.room_id, "oddfolder");
        assert_eq!(record.streamer_name, "oddfolder");
    }

    #[test]
    fn lexicographic_order_is_chronological() {
        // The date-time-sequence layout makes plain string sort chronological.
        let mut names = vec![
            "rec-42-20250102-080000-1-b.flv".to_string(),
            "rec-42-20250101-235900-3-a.flv".to_string(),
            "rec-42-20250101-120000-1-c.flv".to_string(),
            "rec-42-20250101-120000-2-d.flv".to_string(),
        ];
        names.sort();

        let times: Vec<_> = names
            .iter()
            .map(|n| {
                let r = VideoRecord::from_listing("42-x", n, 0);
                (r.captured_at.unwrap(), r.sequence)
            })
            .collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[test]
    fn templates_substitute_fields() {
        let record =
            VideoRecord::from_listing("42-somecaster", "rec-42-20250101-120000-1-Title.flv", 5);
        assert_eq!(
            record.description("{streamer_name} live on {date}"),
            "somecaster live on 2025-01-01 12:00:00"
        );
        assert_eq!(
            record.source("https://live.example.com/{room_id}"),
            "https://live.example.com/42"
        );
        assert_eq!(record.part_title(3), "Title - P3");
    }

    #[test]
    fn history_identity_is_path_and_size() {
        let entry = UploadHistoryEntry::new("f/a.flv".into(), 100, "POST1".into(), false, vec![]);
        assert!(entry.matches("f/a.flv", 100));
        assert!(!entry.matches("f/a.flv", 101));
        assert!(!entry.matches("f/b.flv", 100));
    }
}
