//! History persistence.
//!
//! Both files are flat JSON arrays, rewritten in full (atomically, via a
//! temp file in the same directory) after every single append. The upload
//! history is the system's only idempotency gate: a crash may lose at most
//! the in-flight video, never a recorded one.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use vodrelay_core::{FailureEntry, PostValidator, RelayResult, UploadHistoryEntry};

pub struct HistoryStore {
    history_path: PathBuf,
    failed_path: PathBuf,
    entries: Vec<UploadHistoryEntry>,
    failures: Vec<FailureEntry>,
}

impl HistoryStore {
    /// Load both files. Missing files start empty; a corrupt file is logged
    /// and treated as empty rather than blocking all uploads.
    pub fn load(history_path: PathBuf, failed_path: PathBuf) -> Self {
        let entries = load_list(&history_path);
        let failures = load_list(&failed_path);
        HistoryStore {
            history_path,
            failed_path,
            entries,
            failures,
        }
    }

    /// Exact match on both path and size. A file re-recorded at the same
    /// path with a different size is a different upload.
    pub fn is_uploaded(&self, path: &str, size: u64) -> bool {
        self.entries.iter().any(|e| e.matches(path, size))
    }

    pub fn entries(&self) -> &[UploadHistoryEntry] {
        &self.entries
    }

    pub fn failures(&self) -> &[FailureEntry] {
        &self.failures
    }

    /// Append a success record and persist immediately.
    pub fn record_success(
        &mut self,
        path: &str,
        size: u64,
        platform_id: &str,
        is_split: bool,
        parts: Vec<String>,
    ) -> RelayResult<()> {
        self.entries.push(UploadHistoryEntry::new(
            path.to_string(),
            size,
            platform_id.to_string(),
            is_split,
            parts,
        ));
        persist(&self.history_path, &self.entries)?;
        tracing::info!(path, platform_id, "upload recorded");
        Ok(())
    }

    /// Append a failure record and persist immediately.
    pub fn record_failure(&mut self, path: &str, message: &str) -> RelayResult<()> {
        self.failures
            .push(FailureEntry::new(path.to_string(), message.to_string()));
        persist(&self.failed_path, &self.failures)?;
        tracing::warn!(path, message, "failure recorded");
        Ok(())
    }

    /// Sweep the history against the platform: entries whose post id no
    /// longer resolves are dropped and logged to the failure file, which
    /// re-opens them for upload on the next run.
    ///
    /// Returns `(checked, removed)`.
    pub async fn prune_invalid(
        &mut self,
        validator: &dyn PostValidator,
    ) -> RelayResult<(usize, usize)> {
        let mut checked = 0usize;
        let mut valid = Vec::with_capacity(self.entries.len());
        let mut invalid = Vec::new();

        for entry in self.entries.drain(..) {
            checked += 1;
            if !entry.platform_id.is_empty() && validator.validate(&entry.platform_id).await {
                valid.push(entry);
            } else {
                invalid.push(entry);
            }
        }
        self.entries = valid;

        let removed = invalid.len();
        if removed > 0 {
            persist(&self.history_path, &self.entries)?;
            for entry in invalid {
                tracing::warn!(
                    path = entry.file_path,
                    platform_id = entry.platform_id,
                    "history entry no longer resolves on the platform, removing"
                );
                self.record_failure(
                    &entry.file_path,
                    &format!(
                        "history validation failed: post {} no longer exists",
                        entry.platform_id
                    ),
                )?;
            }
        }

        Ok((checked, removed))
    }

    /// `(uploaded, pending)` tallies for a folder listing, by path only.
    pub fn uploaded_count(&self, folder: &str, videos: &[String]) -> (usize, usize) {
        let uploaded = videos
            .iter()
            .filter(|v| {
                let path = format!("{folder}/{v}");
                self.entries.iter().any(|e| e.file_path == path)
            })
            .count();
        (uploaded, videos.len() - uploaded)
    }
}

fn load_list<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(list) => list,
            Err(err) => {
                tracing::warn!(file = %path.display(), error = %err, "corrupt record file, starting empty");
                Vec::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(err) => {
            tracing::warn!(file = %path.display(), error = %err, "unreadable record file, starting empty");
            Vec::new()
        }
    }
}

/// Full rewrite through a temp file in the target directory, then rename.
fn persist<T: Serialize>(path: &Path, list: &[T]) -> RelayResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&file, list)?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;

    struct StubValidator {
        valid_ids: HashSet<String>,
    }

    #[async_trait]
    impl PostValidator for StubValidator {
        async fn validate(&self, platform_id: &str) -> bool {
            self.valid_ids.contains(platform_id)
        }
    }

    fn store_in(dir: &Path) -> HistoryStore {
        HistoryStore::load(dir.join("upload_history.json"), dir.join("failed_uploads.json"))
    }

    #[test]
    fn records_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store
            .record_success("f/a.flv", 100, "POST1", false, vec![])
            .unwrap();
        store.record_failure("f/b.flv", "transport error").unwrap();

        let reloaded = store_in(dir.path());
        assert!(reloaded.is_uploaded("f/a.flv", 100));
        assert_eq!(reloaded.failures().len(), 1);
        assert_eq!(reloaded.failures()[0].file_path, "f/b.flv");
    }

    #[test]
    fn dedup_key_uses_path_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store
            .record_success("f/a.flv", 100, "POST1", false, vec![])
            .unwrap();
        store
            .record_success("f/a.flv", 200, "POST2", false, vec![])
            .unwrap();

        // Same path, different size: both retained, only the exact pair hits.
        assert_eq!(store.entries().len(), 2);
        assert!(store.is_uploaded("f/a.flv", 100));
        assert!(store.is_uploaded("f/a.flv", 200));
        assert!(!store.is_uploaded("f/a.flv", 300));
    }

    #[test]
    fn missing_and_corrupt_files_start_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.entries().is_empty());

        std::fs::write(dir.path().join("upload_history.json"), "not json").unwrap();
        let store = store_in(dir.path());
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn prune_removes_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        for (path, id) in [("f/a.flv", "KEEP1"), ("f/b.flv", "GONE1"), ("f/c.flv", "KEEP2"), ("f/d.flv", "GONE2")] {
            store.record_success(path, 1, id, false, vec![]).unwrap();
        }

        let validator = StubValidator {
            valid_ids: ["KEEP1".to_string(), "KEEP2".to_string()].into_iter().collect(),
        };
        let (checked, removed) = store.prune_invalid(&validator).await.unwrap();

        assert_eq!((checked, removed), (4, 2));
        assert_eq!(store.entries().len(), 2);
        assert!(store.entries().iter().all(|e| e.platform_id.starts_with("KEEP")));
        assert_eq!(store.failures().len(), 2);
        assert!(store.failures()[0].error_message.contains("GONE1"));

        // The rewrite is durable.
        let reloaded = store_in(dir.path());
        assert_eq!(reloaded.entries().len(), 2);
        assert_eq!(reloaded.failures().len(), 2);
    }

    #[tokio::test]
    async fn prune_keeps_everything_when_all_valid() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.record_success("f/a.flv", 1, "KEEP1", false, vec![]).unwrap();

        let validator = StubValidator {
            valid_ids: ["KEEP1".to_string()].into_iter().collect(),
        };
        let (checked, removed) = store.prune_invalid(&validator).await.unwrap();
        assert_eq!((checked, removed), (1, 0));
        assert!(store.failures().is_empty());
    }

    #[test]
    fn uploaded_count_matches_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.record_success("f/a.flv", 1, "POST1", false, vec![]).unwrap();

        let videos = vec!["a.flv".to_string(), "b.flv".to_string()];
        assert_eq!(store.uploaded_count("f", &videos), (1, 1));
    }
}
