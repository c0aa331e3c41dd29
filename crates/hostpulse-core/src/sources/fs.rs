//! FsSource: usage of every mounted filesystem, from `/proc/mounts` and
//! `statvfs(3)`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::reading::{MetricName, Reading};
use crate::source::{MetricSource, ProcFs, SourceInfo};

use super::helpers::{decode_octal_escapes, keyed_delta};

/// Value reported for size, used and avail when a mount point cannot be
/// queried.
pub const USAGE_UNAVAILABLE: i64 = -1;

/// Device names skipped by default.
pub const DEFAULT_IGNORED_DEVICES: &[&str] = &["", "none", "gvfs-fuse-daemon", "fusectl", "cgroup"];

/// Filesystem types skipped by default (virtual and pseudo filesystems).
pub const DEFAULT_IGNORED_TYPES: &[&str] = &[
    "binfmt_misc",
    "devpts",
    "iso9660",
    "none",
    "proc",
    "sysfs",
    "usbfs",
    "rootfs",
    "autofs",
    "devtmpfs",
];

/// Which mounts the filesystem source leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsFilter {
    devices: BTreeSet<String>,
    types: BTreeSet<String>,
}

impl FsFilter {
    pub fn new<D, T>(devices: D, types: T) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            devices: devices.into_iter().map(Into::into).collect(),
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    /// A filter that keeps every mount.
    pub fn none() -> Self {
        Self::new(Vec::<String>::new(), Vec::<String>::new())
    }

    pub fn excludes(&self, device: &str, fs_type: &str) -> bool {
        self.devices.contains(device) || self.types.contains(fs_type)
    }
}

impl Default for FsFilter {
    fn default() -> Self {
        Self::new(
            DEFAULT_IGNORED_DEVICES.iter().copied(),
            DEFAULT_IGNORED_TYPES.iter().copied(),
        )
    }
}

/// Capacity of one mounted filesystem, in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsUsage {
    #[serde(rename = "type")]
    pub fs_type: String,
    #[serde(rename = "mnt_point")]
    pub mount_point: String,
    pub size: i64,
    pub used: i64,
    pub avail: i64,
}

/// Size/used/avail difference for one filesystem, labelled with the type
/// and mount point of the newer sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsUsageDelta {
    #[serde(rename = "type")]
    pub fs_type: String,
    #[serde(rename = "mnt_point")]
    pub mount_point: String,
    pub size: i64,
    pub used: i64,
    pub avail: i64,
}

impl FsUsage {
    pub fn delta(&self, new: &FsUsage) -> FsUsageDelta {
        FsUsageDelta {
            fs_type: new.fs_type.clone(),
            mount_point: new.mount_point.clone(),
            size: new.size - self.size,
            used: new.used - self.used,
            avail: new.avail - self.avail,
        }
    }
}

/// Usage keyed by device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FsStats(pub BTreeMap<String, FsUsage>);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FsDelta(pub BTreeMap<String, FsUsageDelta>);

impl FsStats {
    pub fn delta(&self, new: &FsStats) -> FsDelta {
        FsDelta(keyed_delta(&self.0, &new.0, FsUsage::delta))
    }
}

/// One row of `/proc/mounts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

/// Parse `/proc/mounts` (`device mountpoint fstype options dump pass`).
pub fn parse_mounts(raw: &str) -> Vec<MountEntry> {
    raw.lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let device = cols.next()?;
            let mount_point = cols.next()?;
            let fs_type = cols.next()?;
            Some(MountEntry {
                device: decode_octal_escapes(device),
                mount_point: decode_octal_escapes(mount_point),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Total, used and available bytes of the filesystem holding `mount_point`.
#[cfg(unix)]
pub fn usage(mount_point: &Path) -> Option<(i64, i64, i64)> {
    use std::os::unix::ffi::OsStrExt;

    let c_path = std::ffi::CString::new(mount_point.as_os_str().as_bytes()).ok()?;
    // SAFETY: `statvfs` is a plain C struct; all-zero is a valid bit pattern.
    let mut st: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: `c_path` is NUL-terminated and `st` is a valid out pointer.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut st) };
    if rc != 0 {
        return None;
    }
    let frsize = st.f_frsize as i64;
    let size = st.f_blocks as i64 * frsize;
    let used = (st.f_blocks as i64 - st.f_bfree as i64) * frsize;
    let avail = st.f_bavail as i64 * frsize;
    Some((size, used, avail))
}

#[cfg(not(unix))]
pub fn usage(_mount_point: &Path) -> Option<(i64, i64, i64)> {
    None
}

/// Build an [`FsStats`] from mount entries, querying each mount point.
/// A later entry for the same device replaces an earlier one.
pub fn collect_fs_stats(mounts: &[MountEntry], filter: &FsFilter) -> FsStats {
    let mut filesystems = BTreeMap::new();
    for mount in mounts {
        if filter.excludes(&mount.device, &mount.fs_type) {
            continue;
        }
        let (size, used, avail) = usage(Path::new(&mount.mount_point)).unwrap_or((
            USAGE_UNAVAILABLE,
            USAGE_UNAVAILABLE,
            USAGE_UNAVAILABLE,
        ));
        filesystems.insert(
            mount.device.clone(),
            FsUsage {
                fs_type: mount.fs_type.clone(),
                mount_point: mount.mount_point.clone(),
                size,
                used,
                avail,
            },
        );
    }
    FsStats(filesystems)
}

static FS_INFO: SourceInfo = SourceInfo {
    name: MetricName::Fs,
    description: "Size, used and available bytes per mounted filesystem",
    proc_files: &["mounts"],
};

/// Samples `/proc/mounts` and stats every mount that passes the filter.
pub struct FsSource {
    procfs: ProcFs,
    filter: FsFilter,
}

impl FsSource {
    pub fn new(procfs: ProcFs, filter: FsFilter) -> Self {
        Self { procfs, filter }
    }

    pub fn filter(&self) -> &FsFilter {
        &self.filter
    }
}

impl Default for FsSource {
    fn default() -> Self {
        Self::new(ProcFs::default(), FsFilter::default())
    }
}

impl MetricSource for FsSource {
    fn info(&self) -> &SourceInfo {
        &FS_INFO
    }

    fn sample(&self) -> Result<Reading, SourceError> {
        let raw = self.procfs.read("mounts")?;
        let mounts = parse_mounts(&raw);
        Ok(Reading::Fs(collect_fs_stats(&mounts, &self.filter)))
    }
}
