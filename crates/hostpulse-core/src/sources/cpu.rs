//! CpuSource: global and per-core CPU times from `/proc/stat`.

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::reading::{MetricName, Reading, optional_delta};
use crate::source::{MetricSource, ProcFs, SourceInfo};

use super::helpers::{clk_tck, leading_numbers};

/// Seconds spent in each CPU mode since boot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuTimes {
    pub kernel: f64,
    pub user: f64,
    pub idle: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nice: Option<f64>,
}

impl CpuTimes {
    pub fn delta(&self, new: &CpuTimes) -> CpuTimes {
        CpuTimes {
            kernel: new.kernel - self.kernel,
            user: new.user - self.user,
            idle: new.idle - self.idle,
            nice: optional_delta(self.nice, new.nice),
        }
    }
}

/// Whole-machine CPU times plus one entry per core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub global: CpuTimes,
    pub percpu: Vec<CpuTimes>,
}

/// Same shape as [`CpuStats`].
pub type CpuDelta = CpuStats;

impl CpuStats {
    /// Per-core entries are paired by position. When the core count changed
    /// between the two samples the shorter list decides how many are diffed.
    pub fn delta(&self, new: &CpuStats) -> CpuDelta {
        CpuStats {
            global: self.global.delta(&new.global),
            percpu: self
                .percpu
                .iter()
                .zip(&new.percpu)
                .map(|(old, new)| old.delta(new))
                .collect(),
        }
    }
}

static CPU_INFO: SourceInfo = SourceInfo {
    name: MetricName::Cpu,
    description: "Kernel, user, idle and nice time for the machine and every core",
    proc_files: &["stat"],
};

/// Samples `/proc/stat`.
pub struct CpuSource {
    procfs: ProcFs,
}

impl CpuSource {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

impl Default for CpuSource {
    fn default() -> Self {
        Self::new(ProcFs::default())
    }
}

fn parse_times(raw: &str, ticks_per_sec: f64) -> Option<CpuTimes> {
    let ticks: Vec<f64> = leading_numbers(raw);
    if ticks.len() < 4 {
        return None;
    }
    Some(CpuTimes {
        user: ticks[0] / ticks_per_sec,
        nice: Some(ticks[1] / ticks_per_sec),
        kernel: ticks[2] / ticks_per_sec,
        idle: ticks[3] / ticks_per_sec,
    })
}

/// Parse the `cpu` and `cpuN` lines of a `/proc/stat` dump.
pub fn parse_proc_stat(raw: &str, ticks_per_sec: f64) -> Option<CpuStats> {
    let mut global = None;
    let mut percpu = Vec::new();

    for line in raw.lines() {
        let Some((label, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let Some(suffix) = label.strip_prefix("cpu") else {
            continue;
        };
        if suffix.is_empty() {
            global = parse_times(rest, ticks_per_sec);
        } else if suffix.bytes().all(|b| b.is_ascii_digit())
            && let Some(times) = parse_times(rest, ticks_per_sec)
        {
            percpu.push(times);
        }
    }

    global.map(|global| CpuStats { global, percpu })
}

impl MetricSource for CpuSource {
    fn info(&self) -> &SourceInfo {
        &CPU_INFO
    }

    fn sample(&self) -> Result<Reading, SourceError> {
        let raw = self.procfs.read("stat")?;
        parse_proc_stat(&raw, clk_tck())
            .map(Reading::Cpu)
            .ok_or_else(|| SourceError::malformed(self.procfs.path("stat"), "no aggregate cpu line"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "\
cpu  400 20 100 1000 30 0 5 0 0 0
cpu0 200 10 50 500 15 0 3 0 0 0
cpu1 200 10 50 500 15 0 2 0 0 0
intr 12345 0 0
ctxt 999
btime 1700000000
";

    fn times(kernel: f64, user: f64, idle: f64, nice: Option<f64>) -> CpuTimes {
        CpuTimes {
            kernel,
            user,
            idle,
            nice,
        }
    }

    #[test]
    fn parses_global_and_cores() {
        let stats = parse_proc_stat(STAT, 100.0).unwrap();
        assert_eq!(stats.global, times(1.0, 4.0, 10.0, Some(0.2)));
        assert_eq!(stats.percpu.len(), 2);
        assert_eq!(stats.percpu[1], times(0.5, 2.0, 5.0, Some(0.1)));
    }

    #[test]
    fn missing_aggregate_line_is_none() {
        assert!(parse_proc_stat("cpu0 1 2 3 4\n", 100.0).is_none());
        assert!(parse_proc_stat("cpu  1 2\n", 100.0).is_none());
    }

    #[test]
    fn delta_subtracts_every_field() {
        let old = times(1.0, 2.0, 3.0, Some(0.5));
        let new = times(1.5, 4.0, 3.25, Some(1.0));
        assert_eq!(old.delta(&new), times(0.5, 2.0, 0.25, Some(0.5)));
    }

    #[test]
    fn delta_drops_nice_when_one_side_lacks_it() {
        let old = times(1.0, 1.0, 1.0, None);
        let new = times(2.0, 2.0, 2.0, Some(1.0));
        assert_eq!(old.delta(&new).nice, None);
    }

    #[test]
    fn core_count_change_truncates_to_shorter_list() {
        let old = CpuStats {
            global: times(1.0, 1.0, 1.0, None),
            percpu: vec![times(1.0, 1.0, 1.0, None); 4],
        };
        let new = CpuStats {
            global: times(2.0, 2.0, 2.0, None),
            percpu: vec![times(3.0, 3.0, 3.0, None); 2],
        };
        let d = old.delta(&new);
        assert_eq!(d.percpu.len(), 2);
        assert_eq!(d.percpu[0], times(2.0, 2.0, 2.0, None));
        assert_eq!(new.delta(&old).percpu.len(), 2);
    }

    #[test]
    fn source_reads_proc_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stat"), STAT).unwrap();
        let source = CpuSource::new(ProcFs::new(dir.path()));
        let Reading::Cpu(stats) = source.sample().unwrap() else {
            panic!("expected cpu reading");
        };
        assert_eq!(stats.percpu.len(), 2);
        assert_eq!(source.name(), MetricName::Cpu);
    }

    #[test]
    fn garbage_stat_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stat"), "nothing here\n").unwrap();
        let source = CpuSource::new(ProcFs::new(dir.path()));
        assert!(matches!(
            source.sample(),
            Err(SourceError::Malformed { .. })
        ));
    }
}
