//! The five procfs-backed metric sources.

pub mod helpers;

pub mod cpu;
pub mod disk;
pub mod fs;
pub mod mem;
pub mod net;

use crate::source::{MetricSource, ProcFs};

use self::fs::FsFilter;

/// All metric source constructors, in cycle order.
pub fn default_sources(procfs: &ProcFs, fs_filter: FsFilter) -> Vec<Box<dyn MetricSource>> {
    vec![
        Box::new(cpu::CpuSource::new(procfs.clone())),
        Box::new(mem::MemSource::new(procfs.clone())),
        Box::new(net::NetSource::new(procfs.clone())),
        Box::new(disk::DiskSource::new(procfs.clone())),
        Box::new(fs::FsSource::new(procfs.clone(), fs_filter)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::MetricName;

    #[test]
    fn default_sources_cover_every_metric_in_order() {
        let names: Vec<MetricName> = default_sources(&ProcFs::default(), FsFilter::default())
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, MetricName::ALL);
    }

    #[test]
    fn every_source_documents_itself() {
        for source in default_sources(&ProcFs::default(), FsFilter::default()) {
            assert!(!source.info().description.is_empty());
            assert!(!source.info().proc_files.is_empty());
        }
    }
}
