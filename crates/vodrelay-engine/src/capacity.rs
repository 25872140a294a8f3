//! Disk-space gate for downloads.
//!
//! A download that fills the scratch disk takes the whole host down with it,
//! so every download is preceded by a capacity check: incoming bytes plus
//! the configured floor must fit in what the scratch volume has free.

use std::path::Path;

use vodrelay_core::{format_size, RelayError, RelayResult, GIB};

pub trait SpaceProbe: Send + Sync {
    /// Free bytes on the volume holding `path`.
    fn available_bytes(&self, path: &Path) -> u64;
}

/// sysinfo-backed probe. The owning disk is the one whose mount point is the
/// longest prefix of the queried path.
pub struct DiskProbe;

impl SpaceProbe for DiskProbe {
    fn available_bytes(&self, path: &Path) -> u64 {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
            .unwrap_or(0)
    }
}

pub struct CapacityGate {
    probe: Box<dyn SpaceProbe>,
    min_free_bytes: u64,
}

impl CapacityGate {
    pub fn new(probe: Box<dyn SpaceProbe>, min_free_space_gb: f64) -> Self {
        CapacityGate {
            probe,
            min_free_bytes: (min_free_space_gb * GIB) as u64,
        }
    }

    /// Fail before the download starts if `incoming_bytes` would leave less
    /// than the configured floor free at `path`.
    pub fn ensure(&self, path: &Path, incoming_bytes: u64) -> RelayResult<()> {
        let available = self.probe.available_bytes(path);
        let required = incoming_bytes.saturating_add(self.min_free_bytes);
        if available < required {
            return Err(RelayError::Space {
                available,
                required,
            });
        }
        tracing::debug!(
            path = %path.display(),
            available = %format_size(available),
            incoming = %format_size(incoming_bytes),
            "capacity check passed"
        );
        Ok(())
    }
}
