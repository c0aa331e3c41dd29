//! `hostpulse snapshot`: one cycle that prints every absolute reading, a
//! wait, then a second cycle that prints only the deltas.
//! Per-metric failures are reported through the log.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use hostpulse_core::{
    ConsoleTransport, DeltaReading, MetricName, Reading, SendError, Transport,
};

use super::SamplingArgs;

/// Forwards deltas always and absolute readings only while `absolutes` is set.
struct DeltasAfterFirst<T> {
    inner: T,
    absolutes: Arc<AtomicBool>,
}

impl<T: Transport> Transport for DeltasAfterFirst<T> {
    fn send_absolute(&mut self, name: MetricName, reading: &Reading) -> Result<(), SendError> {
        if self.absolutes.load(Ordering::Relaxed) {
            self.inner.send_absolute(name, reading)
        } else {
            Ok(())
        }
    }

    fn send_delta(&mut self, name: MetricName, delta: &DeltaReading) -> Result<(), SendError> {
        self.inner.send_delta(name, delta)
    }

    fn on_shutdown(&mut self) {
        self.inner.on_shutdown();
    }
}

pub fn run(sampling: &SamplingArgs, wait: Duration) {
    let absolutes = Arc::new(AtomicBool::new(true));
    let mut checker = sampling.checker(Box::new(DeltasAfterFirst {
        inner: ConsoleTransport::stdout(),
        absolutes: Arc::clone(&absolutes),
    }));

    checker.check();
    std::thread::sleep(wait);
    absolutes.store(false, Ordering::Relaxed);
    let second = checker.check();
    checker.on_shutdown();

    if second.failures() == second.metrics.len() {
        eprintln!(
            "No metric could be sampled from {}",
            sampling.procfs.root().display()
        );
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostpulse_core::sources::mem::MemStats;

    #[test]
    fn second_pass_prints_only_deltas() {
        let absolutes = Arc::new(AtomicBool::new(true));
        let mut transport = DeltasAfterFirst {
            inner: ConsoleTransport::new(Vec::new()),
            absolutes: Arc::clone(&absolutes),
        };
        let reading = Reading::Mem(MemStats::default());
        let Reading::Mem(stats) = &reading else {
            unreachable!()
        };

        transport.send_absolute(MetricName::Mem, &reading).unwrap();
        absolutes.store(false, Ordering::Relaxed);
        transport.send_absolute(MetricName::Mem, &reading).unwrap();
        transport
            .send_delta(MetricName::Mem, &DeltaReading::Mem(stats.delta(stats)))
            .unwrap();

        let text = String::from_utf8(transport.inner.into_inner()).unwrap();
        assert_eq!(text.matches("mem\n===\n").count(), 1);
        assert_eq!(text.matches("mem diff\n").count(), 1);
    }
}
