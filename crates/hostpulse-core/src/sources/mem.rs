//! MemSource: physical memory and swap usage from `/proc/meminfo`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::reading::{MetricName, Reading, optional_delta};
use crate::source::{MetricSource, ProcFs, SourceInfo};

/// Physical memory usage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemUsage {
    /// Buffers plus page cache, `-1` when the kernel does not report them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<i64>,
    pub total: i64,
    pub used: i64,
    pub free: i64,
    pub percent: f64,
}

impl MemUsage {
    pub fn delta(&self, new: &MemUsage) -> MemUsage {
        MemUsage {
            cache: optional_delta(self.cache, new.cache),
            total: new.total - self.total,
            used: new.used - self.used,
            free: new.free - self.free,
            percent: new.percent - self.percent,
        }
    }
}

/// Swap usage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SwapUsage {
    pub total: i64,
    pub used: i64,
    pub free: i64,
    pub percent: f64,
}

impl SwapUsage {
    pub fn delta(&self, new: &SwapUsage) -> SwapUsage {
        SwapUsage {
            total: new.total - self.total,
            used: new.used - self.used,
            free: new.free - self.free,
            percent: new.percent - self.percent,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemStats {
    pub cache: i64,
    pub mem: MemUsage,
    pub swap: SwapUsage,
}

/// Same shape as [`MemStats`].
pub type MemDelta = MemStats;

impl MemStats {
    pub fn delta(&self, new: &MemStats) -> MemDelta {
        MemStats {
            cache: new.cache - self.cache,
            mem: self.mem.delta(&new.mem),
            swap: self.swap.delta(&new.swap),
        }
    }
}

fn percent(used: i64, total: i64) -> f64 {
    if total > 0 {
        used as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Parse a `/proc/meminfo` dump. Values are reported in kB.
pub fn parse_meminfo(raw: &str) -> Option<MemStats> {
    let fields: HashMap<&str, i64> = raw
        .lines()
        .filter_map(|line| {
            let (key, rest) = line.split_once(':')?;
            let kb = rest.split_whitespace().next()?.parse::<i64>().ok()?;
            Some((key.trim(), kb * 1024))
        })
        .collect();

    let total = *fields.get("MemTotal")?;
    let free = *fields.get("MemFree")?;
    let buffers = fields.get("Buffers").copied();
    let cached = fields.get("Cached").copied();
    let cache = match (buffers, cached) {
        (Some(b), Some(c)) => b + c,
        _ => -1,
    };
    let used = match fields.get("MemAvailable") {
        Some(available) => total - available,
        None => total - free - buffers.unwrap_or(0) - cached.unwrap_or(0),
    };

    let swap_total = fields.get("SwapTotal").copied().unwrap_or(0);
    let swap_free = fields.get("SwapFree").copied().unwrap_or(0);
    let swap_used = swap_total - swap_free;

    Some(MemStats {
        cache,
        mem: MemUsage {
            cache: Some(cache),
            total,
            used,
            free,
            percent: percent(used, total),
        },
        swap: SwapUsage {
            total: swap_total,
            used: swap_used,
            free: swap_free,
            percent: percent(swap_used, swap_total),
        },
    })
}

static MEM_INFO: SourceInfo = SourceInfo {
    name: MetricName::Mem,
    description: "Physical memory and swap totals, usage and cache",
    proc_files: &["meminfo"],
};

/// Samples `/proc/meminfo`.
pub struct MemSource {
    procfs: ProcFs,
}

impl MemSource {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

impl Default for MemSource {
    fn default() -> Self {
        Self::new(ProcFs::default())
    }
}

impl MetricSource for MemSource {
    fn info(&self) -> &SourceInfo {
        &MEM_INFO
    }

    fn sample(&self) -> Result<Reading, SourceError> {
        let raw = self.procfs.read("meminfo")?;
        parse_meminfo(&raw).map(Reading::Mem).ok_or_else(|| {
            SourceError::malformed(self.procfs.path("meminfo"), "MemTotal/MemFree missing")
        })
    }
}
