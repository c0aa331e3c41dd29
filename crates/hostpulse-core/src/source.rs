//! Abstract metric source trait and the proc root it reads from.
//!
//! Every metric source implements the [`MetricSource`] trait, which provides
//! metadata via [`SourceInfo`], a point-in-time [`sample`](MetricSource::sample)
//! and the paired [`delta`](MetricSource::delta) between two samples.

use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::reading::{DeltaReading, MetricName, Reading};

/// Metadata about a metric source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Metric this source produces. Also the cache and routing key.
    pub name: MetricName,
    /// One-line human-readable description.
    pub description: &'static str,
    /// Files under the proc root the source reads.
    pub proc_files: &'static [&'static str],
}

/// Trait that every metric source must implement.
pub trait MetricSource: Send {
    /// Source metadata.
    fn info(&self) -> &SourceInfo;

    /// Read the current counters. Must not mutate shared state.
    fn sample(&self) -> Result<Reading, SourceError>;

    /// Difference between two readings of this source.
    fn delta(&self, old: &Reading, new: &Reading) -> Result<DeltaReading, SourceError> {
        old.delta(new)
    }

    /// Convenience: name from info.
    fn name(&self) -> MetricName {
        self.info().name
    }
}

/// Root of the procfs tree sources read from (`/proc` on a live host).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `relative` under the root.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Read a whole proc file, mapping failures to [`SourceError::Unavailable`].
    pub fn read(&self, relative: &str) -> Result<String, SourceError> {
        let path = self.path(relative);
        std::fs::read_to_string(&path).map_err(|e| SourceError::unavailable(path, e))
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_root_is_proc() {
        assert_eq!(ProcFs::default().root(), Path::new("/proc"));
        assert_eq!(ProcFs::default().path("net/dev"), Path::new("/proc/net/dev"));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let procfs = ProcFs::new(dir.path());
        let err = procfs.read("stat").unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }));
        assert!(err.to_string().contains("stat"));
    }
}
