//! # hostpulse-core
//!
//! Periodic host metrics sampling: CPU times, memory, network and disk
//! counters, and filesystem usage, read from procfs.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hostpulse_core::{Checker, ConsoleTransport, FsFilter, ProcFs};
//!
//! let mut checker = Checker::with_default_sources(
//!     &ProcFs::default(),
//!     FsFilter::default(),
//!     Box::new(ConsoleTransport::stdout()),
//! );
//!
//! // First cycle: absolute readings only.
//! checker.check();
//! // Later cycles also send the delta against the previous reading.
//! let report = checker.check();
//! println!("{} deltas sent", report.deltas_sent());
//! ```
//!
//! ## Architecture
//!
//! Sources → Checker (DeltaCache) → Transport
//!
//! Every source implements the [`MetricSource`] trait. The [`Checker`] runs
//! one cycle over all registered sources, sending each absolute [`Reading`]
//! and, from the second successful sample on, its [`DeltaReading`]. The
//! [`Scheduler`] drives the checker at a fixed interval on its own thread.

pub mod cache;
pub mod checker;
pub mod error;
pub mod platform;
pub mod pretty;
pub mod reading;
pub mod scheduler;
pub mod source;
pub mod sources;
pub mod topic;
pub mod transport;

pub use cache::DeltaCache;
pub use checker::{Checker, CycleReport, MetricOutcome};
pub use error::{BoxError, SendError, SourceError, display_chain};
pub use platform::{HostInfo, detect_host_info};
pub use reading::{DeltaReading, MetricName, Reading, UnknownMetric};
pub use scheduler::{DEFAULT_INTERVAL, Scheduler, SchedulerHandle};
pub use source::{MetricSource, ProcFs, SourceInfo};
pub use sources::default_sources;
pub use sources::fs::FsFilter;
pub use topic::TopicTemplate;
pub use transport::{ConsoleTransport, Transport};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
