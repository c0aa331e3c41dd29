//! DiskSource: per-device I/O counters from `/proc/diskstats`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::reading::{MetricName, Reading};
use crate::source::{MetricSource, ProcFs, SourceInfo};

use super::helpers::keyed_delta;

/// `/proc/diskstats` always counts 512-byte sectors, whatever the device's
/// real sector size.
const SECTOR_BYTES: i64 = 512;

/// Read/write volume, operation count and time spent for one block device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCounters {
    #[serde(rename = "rb")]
    pub read_bytes: i64,
    #[serde(rename = "wb")]
    pub write_bytes: i64,
    #[serde(rename = "rc")]
    pub read_count: i64,
    #[serde(rename = "wc")]
    pub write_count: i64,
    /// Milliseconds spent reading.
    #[serde(rename = "rt")]
    pub read_time: i64,
    /// Milliseconds spent writing.
    #[serde(rename = "wt")]
    pub write_time: i64,
}

impl DiskCounters {
    pub fn delta(&self, new: &DiskCounters) -> DiskCounters {
        DiskCounters {
            read_bytes: new.read_bytes - self.read_bytes,
            write_bytes: new.write_bytes - self.write_bytes,
            read_count: new.read_count - self.read_count,
            write_count: new.write_count - self.write_count,
            read_time: new.read_time - self.read_time,
            write_time: new.write_time - self.write_time,
        }
    }
}

/// Counters keyed by device name (`sda`, `sda1`, `nvme0n1`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiskStats(pub BTreeMap<String, DiskCounters>);

pub type DiskDelta = DiskStats;

impl DiskStats {
    pub fn delta(&self, new: &DiskStats) -> DiskDelta {
        DiskStats(keyed_delta(&self.0, &new.0, DiskCounters::delta))
    }
}

/// Parse a `/proc/diskstats` dump:
/// `major minor name reads merged sectors ms writes merged sectors ms ...`.
pub fn parse_diskstats(raw: &str) -> DiskStats {
    let mut devices = BTreeMap::new();
    for line in raw.lines() {
        let mut parts = line.split_whitespace();
        let (Some(_major), Some(_minor), Some(name)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let fields: Vec<i64> = parts.map_while(|p| p.parse().ok()).collect();
        if fields.len() < 8 {
            continue;
        }
        devices.insert(
            name.to_string(),
            DiskCounters {
                read_count: fields[0],
                read_bytes: fields[2] * SECTOR_BYTES,
                read_time: fields[3],
                write_count: fields[4],
                write_bytes: fields[6] * SECTOR_BYTES,
                write_time: fields[7],
            },
        );
    }
    DiskStats(devices)
}

static DISK_INFO: SourceInfo = SourceInfo {
    name: MetricName::Disk,
    description: "Bytes, operations and time spent reading and writing per block device",
    proc_files: &["diskstats"],
};

/// Samples `/proc/diskstats`.
pub struct DiskSource {
    procfs: ProcFs,
}

impl DiskSource {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

impl Default for DiskSource {
    fn default() -> Self {
        Self::new(ProcFs::default())
    }
}

impl MetricSource for DiskSource {
    fn info(&self) -> &SourceInfo {
        &DISK_INFO
    }

    fn sample(&self) -> Result<Reading, SourceError> {
        let raw = self.procfs.read("diskstats")?;
        Ok(Reading::Disk(parse_diskstats(&raw)))
    }
}
