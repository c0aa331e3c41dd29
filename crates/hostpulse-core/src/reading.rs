//! Metric names and the reading/delta envelopes that flow from sources to
//! transports.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::sources::cpu::{CpuDelta, CpuStats};
use crate::sources::disk::{DiskDelta, DiskStats};
use crate::sources::fs::{FsDelta, FsStats};
use crate::sources::mem::{MemDelta, MemStats};
use crate::sources::net::{NetDelta, NetStats};

/// Identifier of one of the five sampled metrics.
///
/// The declaration order is the order a cycle processes metrics in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricName {
    Cpu,
    Mem,
    Net,
    Disk,
    Fs,
}

impl MetricName {
    /// Every metric, in cycle order.
    pub const ALL: [MetricName; 5] = [
        MetricName::Cpu,
        MetricName::Mem,
        MetricName::Net,
        MetricName::Disk,
        MetricName::Fs,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Mem => "mem",
            Self::Net => "net",
            Self::Disk => "disk",
            Self::Fs => "fs",
        }
    }
}

impl std::fmt::Display for MetricName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown metric name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric '{0}' (expected one of cpu, mem, net, disk, fs)")]
pub struct UnknownMetric(pub String);

impl std::str::FromStr for MetricName {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cpu" => Ok(Self::Cpu),
            "mem" => Ok(Self::Mem),
            "net" => Ok(Self::Net),
            "disk" => Ok(Self::Disk),
            "fs" => Ok(Self::Fs),
            other => Err(UnknownMetric(other.to_string())),
        }
    }
}

/// Absolute snapshot of one metric. Serializes as the inner mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Cpu(CpuStats),
    Mem(MemStats),
    Net(NetStats),
    Disk(DiskStats),
    Fs(FsStats),
}

impl Reading {
    pub fn name(&self) -> MetricName {
        match self {
            Self::Cpu(_) => MetricName::Cpu,
            Self::Mem(_) => MetricName::Mem,
            Self::Net(_) => MetricName::Net,
            Self::Disk(_) => MetricName::Disk,
            Self::Fs(_) => MetricName::Fs,
        }
    }

    /// Difference from `self` (the older reading) to `new`.
    pub fn delta(&self, new: &Reading) -> Result<DeltaReading, SourceError> {
        match (self, new) {
            (Self::Cpu(old), Self::Cpu(new)) => Ok(DeltaReading::Cpu(old.delta(new))),
            (Self::Mem(old), Self::Mem(new)) => Ok(DeltaReading::Mem(old.delta(new))),
            (Self::Net(old), Self::Net(new)) => Ok(DeltaReading::Net(old.delta(new))),
            (Self::Disk(old), Self::Disk(new)) => Ok(DeltaReading::Disk(old.delta(new))),
            (Self::Fs(old), Self::Fs(new)) => Ok(DeltaReading::Fs(old.delta(new))),
            (old, new) => Err(SourceError::ShapeMismatch {
                old: old.name(),
                new: new.name(),
            }),
        }
    }
}

/// Field-wise difference between two readings of the same metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeltaReading {
    Cpu(CpuDelta),
    Mem(MemDelta),
    Net(NetDelta),
    Disk(DiskDelta),
    Fs(FsDelta),
}

impl DeltaReading {
    pub fn name(&self) -> MetricName {
        match self {
            Self::Cpu(_) => MetricName::Cpu,
            Self::Mem(_) => MetricName::Mem,
            Self::Net(_) => MetricName::Net,
            Self::Disk(_) => MetricName::Disk,
            Self::Fs(_) => MetricName::Fs,
        }
    }
}

/// Difference of two optional fields: present only when both sides are.
pub(crate) fn optional_delta<T>(old: Option<T>, new: Option<T>) -> Option<T>
where
    T: std::ops::Sub<Output = T>,
{
    match (old, new) {
        (Some(old), Some(new)) => Some(new - old),
        _ => None,
    }
}
