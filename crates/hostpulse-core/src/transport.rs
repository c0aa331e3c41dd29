//! Transport contract and the console transport.
//!
//! A [`Transport`] receives every absolute reading and every delta the
//! [`Checker`](crate::checker::Checker) produces. Concrete transports own
//! their connection or session state; the checker only observes whether a
//! send succeeded.

use std::io::Write;

use crate::error::SendError;
use crate::pretty;
use crate::reading::{DeltaReading, MetricName, Reading};

/// Delivery mechanism for readings.
pub trait Transport: Send {
    /// Deliver an absolute reading.
    fn send_absolute(&mut self, name: MetricName, reading: &Reading) -> Result<(), SendError>;

    /// Deliver a delta reading.
    fn send_delta(&mut self, name: MetricName, delta: &DeltaReading) -> Result<(), SendError>;

    /// Release connections and sessions. Called once, after the last cycle.
    fn on_shutdown(&mut self) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send_absolute(&mut self, name: MetricName, reading: &Reading) -> Result<(), SendError> {
        (**self).send_absolute(name, reading)
    }

    fn send_delta(&mut self, name: MetricName, delta: &DeltaReading) -> Result<(), SendError> {
        (**self).send_delta(name, delta)
    }

    fn on_shutdown(&mut self) {
        (**self).on_shutdown();
    }
}

/// Pretty-prints readings to a writer (stdout by default).
pub struct ConsoleTransport<W: Write + Send = std::io::Stdout> {
    out: W,
}

impl ConsoleTransport {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::stdout()
    }
}

impl<W: Write + Send> ConsoleTransport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print<T: serde::Serialize>(&mut self, title: &str, value: &T) -> Result<(), SendError> {
        let value = serde_json::to_value(value).map_err(|e| SendError::Encode(Box::new(e)))?;
        let text = pretty::render(title, &value, 0);
        self.out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|e| SendError::Delivery(Box::new(e)))
    }
}

impl<W: Write + Send> Transport for ConsoleTransport<W> {
    fn send_absolute(&mut self, name: MetricName, reading: &Reading) -> Result<(), SendError> {
        self.print(name.as_str(), reading)
    }

    fn send_delta(&mut self, name: MetricName, delta: &DeltaReading) -> Result<(), SendError> {
        self.print(&format!("{name} diff"), delta)
    }

    fn on_shutdown(&mut self) {
        let _ = writeln!(self.out, "closing");
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::net::{NetCounters, NetStats};

    fn net_reading() -> Reading {
        Reading::Net(NetStats(
            [(
                "eth0".to_string(),
                NetCounters {
                    rx_bytes: 10,
                    tx_bytes: 20,
                    rx_packets: 1,
                    tx_packets: 2,
                },
            )]
            .into(),
        ))
    }

    #[test]
    fn console_prints_absolute_and_diff_titles() {
        let mut console = ConsoleTransport::new(Vec::new());
        let reading = net_reading();
        let Reading::Net(stats) = &reading else {
            unreachable!()
        };
        let delta = DeltaReading::Net(stats.delta(stats));

        console.send_absolute(MetricName::Net, &reading).unwrap();
        console.send_delta(MetricName::Net, &delta).unwrap();
        console.on_shutdown();

        let text = String::from_utf8(console.into_inner()).unwrap();
        assert!(text.starts_with("net\n===\n\neth0\n----\n\nrb: 10\n"));
        assert!(text.contains("net diff\n========\n\neth0\n----\n\nrb: 0\n"));
        assert!(text.ends_with("closing\n"));
    }

    #[test]
    fn boxed_transport_forwards() {
        let mut boxed: Box<dyn Transport> = Box::new(ConsoleTransport::new(Vec::new()));
        assert!(boxed.send_absolute(MetricName::Net, &net_reading()).is_ok());
    }
}
