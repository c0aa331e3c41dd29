pub mod console;
pub mod http;
pub mod info;
pub mod listen;
pub mod mqtt;
pub mod snapshot;

use std::sync::mpsc;
use std::time::Duration;

use hostpulse_core::sources::fs::{DEFAULT_IGNORED_DEVICES, DEFAULT_IGNORED_TYPES};
use hostpulse_core::{Checker, FsFilter, ProcFs, Scheduler, Transport, display_chain};

/// Set up `env_logger`. `RUST_LOG` wins over `-v`.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

/// Where and what to sample, shared by every collecting command.
pub struct SamplingArgs {
    pub procfs: ProcFs,
    pub fs_filter: FsFilter,
}

impl SamplingArgs {
    pub fn from_cli(
        proc_root: &str,
        ignore_fsname: Option<Vec<String>>,
        ignore_fstype: Option<Vec<String>>,
    ) -> Self {
        let defaults = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            procfs: ProcFs::new(proc_root),
            fs_filter: FsFilter::new(
                ignore_fsname.unwrap_or_else(|| defaults(DEFAULT_IGNORED_DEVICES)),
                ignore_fstype.unwrap_or_else(|| defaults(DEFAULT_IGNORED_TYPES)),
            ),
        }
    }

    pub fn checker(&self, transport: Box<dyn Transport>) -> Checker {
        Checker::with_default_sources(&self.procfs, self.fs_filter.clone(), transport)
    }
}

/// Run `checker` every `interval_secs` until Ctrl+C, then stop, join and
/// shut the transport down.
pub fn run_until_interrupted(checker: Checker, interval_secs: u64) {
    let (tx, rx) = mpsc::channel();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = tx.send(());
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    let interval = Duration::from_secs(interval_secs.max(1));
    let handle = match Scheduler::new(interval).start(checker) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error starting checker thread: {}", display_chain(&e));
            std::process::exit(1);
        }
    };

    let _ = rx.recv();
    log::info!("interrupted, stopping");
    match handle.join() {
        Ok(checker) => log::info!("stopped after {} cycles", checker.cycles()),
        Err(_) => {
            eprintln!("Checker thread panicked");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_lists_replace_defaults_independently() {
        let args = SamplingArgs::from_cli("/proc", None, Some(vec!["tmpfs".to_string()]));
        assert!(args.fs_filter.excludes("tmpfs-dev", "tmpfs"));
        assert!(!args.fs_filter.excludes("/dev/sda1", "proc"));
        assert!(args.fs_filter.excludes("cgroup", "cgroup2"));
    }

    #[test]
    fn proc_root_is_honoured() {
        let args = SamplingArgs::from_cli("/tmp/fake-proc", None, None);
        assert_eq!(args.procfs.root(), std::path::Path::new("/tmp/fake-proc"));
        assert_eq!(args.fs_filter, FsFilter::default());
    }
}
