use camino::Utf8PathBuf;
use sysinfo::Disks;

/// Capacity snapshot of one mounted volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeUsage {
    pub mount_point: Utf8PathBuf,
    pub total: u64,
    pub available: u64,
}

impl VolumeUsage {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    /// `C:\ - Total: 476.34 GB, Used: 301.10 GB, Free: 175.24 GB`
    pub fn summary(&self) -> String {
        format!(
            "{} - Total: {}, Used: {}, Free: {}",
            self.mount_point,
            format_size(self.total),
            format_size(self.used()),
            format_size(self.available)
        )
    }
}

/// Usage of every volume with a UTF-8 mount point, sorted by mount point.
pub fn volume_usage() -> Vec<VolumeUsage> {
    let disks = Disks::new_with_refreshed_list();
    let mut usage: Vec<VolumeUsage> = disks
        .list()
        .iter()
        .filter_map(|disk| {
            let mount_point = disk.mount_point().to_str()?;
            Some(VolumeUsage {
                mount_point: Utf8PathBuf::from(mount_point),
                total: disk.total_space(),
                available: disk.available_space(),
            })
        })
        .collect();
    usage.sort_by(|a, b| a.mount_point.cmp(&b.mount_point));
    usage.dedup_by(|a, b| a.mount_point == b.mount_point);
    usage
}

/// Format byte count as human-readable string.
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_099_511_627_776 {
        format!("{:.2} TB", bytes as f64 / 1_099_511_627_776.0)
    } else if bytes >= 1_073_741_824 {
        format!("{:.2} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.2} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1_024 {
        format!("{:.2} KB", bytes as f64 / 1_024.0)
    } else {
        format!("{} B", bytes)
    }
}
