//! One sampling cycle: sample every source, send absolute readings, diff
//! against the cache, send deltas.
//!
//! Cycle, per source, in metric order (cpu, mem, net, disk, fs):
//! 1. `sample()`; on failure log it and leave the cache entry alone
//! 2. `send_absolute()`
//! 3. if the cache holds a previous reading, `delta()` and `send_delta()`
//! 4. store the new reading, replacing the previous one
//!
//! A failure for one metric never stops the others. A delta is only sent
//! after its absolute reading went out in the same cycle. Any failure
//! leaves the cache entry alone, so the next delta is taken against the
//! last reading the receiver actually got.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::cache::DeltaCache;
use crate::error::{SendError, SourceError, display_chain};
use crate::reading::MetricName;
use crate::source::{MetricSource, ProcFs};
use crate::sources::default_sources;
use crate::sources::fs::FsFilter;
use crate::transport::Transport;

/// What happened to one metric during a cycle.
#[derive(Debug)]
pub enum MetricOutcome {
    /// The absolute reading was sent; `delta` tells whether a delta followed.
    Sent { delta: bool },
    /// The source could not be read. The cache keeps its previous entry.
    SampleFailed(SourceError),
    /// The absolute reading went out but the delta could not be computed.
    /// The cache keeps its previous entry.
    DeltaFailed(SourceError),
    /// The transport rejected the absolute reading; no delta was attempted
    /// and the cache keeps its previous entry.
    AbsoluteSendFailed(SendError),
    /// The absolute reading went out, the delta did not. The cache keeps
    /// its previous entry.
    DeltaSendFailed(SendError),
}

impl MetricOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Sent { .. })
    }
}

/// Summary of one [`Checker::check`] call.
#[derive(Debug)]
pub struct CycleReport {
    /// 1-based cycle counter.
    pub cycle: u64,
    pub elapsed: Duration,
    pub metrics: Vec<(MetricName, MetricOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, name: MetricName) -> Option<&MetricOutcome> {
        self.metrics
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> usize {
        self.metrics.iter().filter(|(_, o)| o.is_failure()).count()
    }

    pub fn deltas_sent(&self) -> usize {
        self.metrics
            .iter()
            .filter(|(_, o)| matches!(o, MetricOutcome::Sent { delta: true }))
            .count()
    }
}

/// Orchestrates sampling cycles over a set of metric sources.
///
/// Owns the [`DeltaCache`]; cycles are serialized by `&mut self`.
pub struct Checker {
    sources: Vec<Box<dyn MetricSource>>,
    transport: Box<dyn Transport>,
    cache: DeltaCache,
    cycles: u64,
    shut_down: bool,
}

impl Checker {
    /// Create a checker with no sources.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            sources: Vec::new(),
            transport,
            cache: DeltaCache::new(),
            cycles: 0,
            shut_down: false,
        }
    }

    /// Create a checker over the given sources.
    pub fn with_sources(
        sources: Vec<Box<dyn MetricSource>>,
        transport: Box<dyn Transport>,
    ) -> Self {
        let mut checker = Self::new(transport);
        for source in sources {
            checker.register(source);
        }
        checker
    }

    /// Create a checker over the five procfs sources.
    pub fn with_default_sources(
        procfs: &ProcFs,
        fs_filter: FsFilter,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self::with_sources(default_sources(procfs, fs_filter), transport)
    }

    /// Register a source, replacing any source already registered for the
    /// same metric. Sources stay in metric order.
    pub fn register(&mut self, source: Box<dyn MetricSource>) {
        let name = source.name();
        match self.sources.binary_search_by_key(&name, |s| s.name()) {
            Ok(i) => self.sources[i] = source,
            Err(i) => self.sources.insert(i, source),
        }
    }

    /// Registered metric names, in cycle order.
    pub fn source_names(&self) -> Vec<MetricName> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn cache(&self) -> &DeltaCache {
        &self.cache
    }

    /// Number of cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Run exactly one cycle over every registered source.
    pub fn check(&mut self) -> CycleReport {
        self.cycles += 1;
        let started = Instant::now();
        let mut metrics = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let name = source.name();
            let outcome = check_one(source.as_ref(), self.transport.as_mut(), &mut self.cache);
            log_outcome(name, &outcome);
            metrics.push((name, outcome));
        }

        let report = CycleReport {
            cycle: self.cycles,
            elapsed: started.elapsed(),
            metrics,
        };
        debug!(
            "cycle {} finished in {:?}: {} metrics, {} deltas, {} failures",
            report.cycle,
            report.elapsed,
            report.metrics.len(),
            report.deltas_sent(),
            report.failures()
        );
        report
    }

    /// Hand shutdown to the transport. Only the first call reaches it.
    pub fn on_shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("shutting down transport after {} cycles", self.cycles);
        self.transport.on_shutdown();
    }
}

fn check_one(
    source: &dyn MetricSource,
    transport: &mut dyn Transport,
    cache: &mut DeltaCache,
) -> MetricOutcome {
    let name = source.name();
    let reading = match source.sample() {
        Ok(reading) => reading,
        Err(e) => return MetricOutcome::SampleFailed(e),
    };

    if let Err(e) = transport.send_absolute(name, &reading) {
        return MetricOutcome::AbsoluteSendFailed(e);
    }

    let delta = match cache.get(name) {
        None => false,
        Some(previous) => {
            let delta = match source.delta(previous, &reading) {
                Ok(delta) => delta,
                Err(e) => return MetricOutcome::DeltaFailed(e),
            };
            if let Err(e) = transport.send_delta(name, &delta) {
                return MetricOutcome::DeltaSendFailed(e);
            }
            true
        }
    };

    cache.store(name, reading);
    MetricOutcome::Sent { delta }
}

fn log_outcome(name: MetricName, outcome: &MetricOutcome) {
    match outcome {
        MetricOutcome::Sent { delta } => debug!("{name}: sent (delta: {delta})"),
        MetricOutcome::SampleFailed(e) => {
            error!("error fetching data from {name}: {}", display_chain(e))
        }
        MetricOutcome::DeltaFailed(e) => {
            warn!("error computing {name} delta: {}", display_chain(e))
        }
        MetricOutcome::AbsoluteSendFailed(e) => {
            error!("error sending {name}: {}", display_chain(e))
        }
        MetricOutcome::DeltaSendFailed(e) => {
            error!("error sending {name} delta: {}", display_chain(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::reading::{DeltaReading, Reading};
    use crate::source::SourceInfo;
    use crate::sources::net::{NetCounters, NetStats};
    use std::sync::{Arc, Mutex};

    static NET: SourceInfo = SourceInfo {
        name: MetricName::Net,
        description: "scripted net source",
        proc_files: &[],
    };

    /// Returns scripted results in order, then repeats the last one.
    struct ScriptedNet {
        script: Mutex<Vec<Option<i64>>>,
    }

    impl ScriptedNet {
        fn new(script: Vec<Option<i64>>) -> Self {
            Self {
                script: Mutex::new(script),
            }
        }
    }

    fn net(rx: i64) -> Reading {
        Reading::Net(NetStats(
            [(
                "eth0".to_string(),
                NetCounters {
                    rx_bytes: rx,
                    ..Default::default()
                },
            )]
            .into(),
        ))
    }

    impl MetricSource for ScriptedNet {
        fn info(&self) -> &SourceInfo {
            &NET
        }

        fn sample(&self) -> Result<Reading, SourceError> {
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0]
            };
            next.map(net).ok_or_else(|| {
                SourceError::unavailable(
                    "/proc/net/dev",
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                )
            })
        }
    }

    #[derive(Clone, Default)]
    struct Sink {
        deltas: Arc<Mutex<Vec<DeltaReading>>>,
        shutdowns: Arc<Mutex<u32>>,
        /// Fail `send_absolute` from this (0-based) call on.
        fail_absolute_from: Option<usize>,
        fail_delta: bool,
        absolutes: Arc<Mutex<usize>>,
    }

    impl Transport for Sink {
        fn send_absolute(&mut self, _: MetricName, _: &Reading) -> Result<(), SendError> {
            let mut absolutes = self.absolutes.lock().unwrap();
            let call = *absolutes;
            *absolutes += 1;
            match self.fail_absolute_from {
                Some(from) if call >= from => Err(SendError::Status(500)),
                _ => Ok(()),
            }
        }

        fn send_delta(&mut self, _: MetricName, delta: &DeltaReading) -> Result<(), SendError> {
            if self.fail_delta {
                return Err(SendError::Status(503));
            }
            self.deltas.lock().unwrap().push(delta.clone());
            Ok(())
        }

        fn on_shutdown(&mut self) {
            *self.shutdowns.lock().unwrap() += 1;
        }
    }

    #[test]
    fn failed_sample_keeps_last_good_baseline() {
        let sink = Sink::default();
        let source = ScriptedNet::new(vec![Some(100), None, None, Some(250)]);
        let mut checker = Checker::with_sources(vec![Box::new(source)], Box::new(sink.clone()));

        assert!(matches!(
            checker.check().outcome(MetricName::Net),
            Some(MetricOutcome::Sent { delta: false })
        ));
        assert!(matches!(
            checker.check().outcome(MetricName::Net),
            Some(MetricOutcome::SampleFailed(_))
        ));
        assert_eq!(checker.cache().get(MetricName::Net), Some(&net(100)));
        checker.check();
        let report = checker.check();
        assert_eq!(report.cycle, 4);
        assert_eq!(report.deltas_sent(), 1);

        let deltas = sink.deltas.lock().unwrap();
        let DeltaReading::Net(d) = &deltas[0] else {
            panic!("expected net delta");
        };
        assert_eq!(d.0["eth0"].rx_bytes, 150);
    }

    #[test]
    fn absolute_failure_skips_delta_and_keeps_baseline() {
        let sink = Sink {
            fail_absolute_from: Some(1),
            ..Default::default()
        };
        let source = ScriptedNet::new(vec![Some(100), Some(200)]);
        let mut checker = Checker::with_sources(vec![Box::new(source)], Box::new(sink.clone()));

        checker.check();
        let report = checker.check();
        assert!(matches!(
            report.outcome(MetricName::Net),
            Some(MetricOutcome::AbsoluteSendFailed(SendError::Status(500)))
        ));
        assert!(sink.deltas.lock().unwrap().is_empty());
        assert_eq!(checker.cache().get(MetricName::Net), Some(&net(100)));
    }

    #[test]
    fn delta_send_failure_keeps_baseline() {
        let sink = Sink {
            fail_delta: true,
            ..Default::default()
        };
        let source = ScriptedNet::new(vec![Some(100), Some(200)]);
        let mut checker = Checker::with_sources(vec![Box::new(source)], Box::new(sink.clone()));

        checker.check();
        let report = checker.check();
        assert!(matches!(
            report.outcome(MetricName::Net),
            Some(MetricOutcome::DeltaSendFailed(SendError::Status(503)))
        ));
        assert_eq!(checker.cache().get(MetricName::Net), Some(&net(100)));
    }

    #[test]
    fn register_replaces_same_metric() {
        let mut checker = Checker::new(Box::new(Sink::default()));
        checker.register(Box::new(ScriptedNet::new(vec![Some(1)])));
        checker.register(Box::new(ScriptedNet::new(vec![Some(2)])));
        assert_eq!(checker.source_names(), vec![MetricName::Net]);
        checker.check();
        assert_eq!(checker.cache().get(MetricName::Net), Some(&net(2)));
    }

    #[test]
    fn shutdown_reaches_transport_once() {
        let sink = Sink::default();
        let mut checker = Checker::new(Box::new(sink.clone()));
        checker.on_shutdown();
        checker.on_shutdown();
        assert!(checker.is_shut_down());
        assert_eq!(*sink.shutdowns.lock().unwrap(), 1);
    }
}
