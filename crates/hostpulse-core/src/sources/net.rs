//! NetSource: per-interface traffic counters from `/proc/net/dev`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::reading::{MetricName, Reading};
use crate::source::{MetricSource, ProcFs, SourceInfo};

use super::helpers::{keyed_delta, leading_numbers};

/// Byte and packet counters for one interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetCounters {
    #[serde(rename = "rb")]
    pub rx_bytes: i64,
    #[serde(rename = "tb")]
    pub tx_bytes: i64,
    #[serde(rename = "rc")]
    pub rx_packets: i64,
    #[serde(rename = "tc")]
    pub tx_packets: i64,
}

impl NetCounters {
    pub fn delta(&self, new: &NetCounters) -> NetCounters {
        NetCounters {
            rx_bytes: new.rx_bytes - self.rx_bytes,
            tx_bytes: new.tx_bytes - self.tx_bytes,
            rx_packets: new.rx_packets - self.rx_packets,
            tx_packets: new.tx_packets - self.tx_packets,
        }
    }
}

/// Counters keyed by interface name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetStats(pub BTreeMap<String, NetCounters>);

/// Same shape as [`NetStats`], restricted to interfaces seen in both samples.
pub type NetDelta = NetStats;

impl NetStats {
    pub fn delta(&self, new: &NetStats) -> NetDelta {
        NetStats(keyed_delta(&self.0, &new.0, NetCounters::delta))
    }
}

/// Parse a `/proc/net/dev` dump (two header lines, then one row per interface).
pub fn parse_net_dev(raw: &str) -> NetStats {
    let mut interfaces = BTreeMap::new();
    for line in raw.lines().skip(2) {
        let Some((iface, counters)) = line.split_once(':') else {
            continue;
        };
        let fields: Vec<i64> = leading_numbers(counters);
        if fields.len() < 16 {
            continue;
        }
        interfaces.insert(
            iface.trim().to_string(),
            NetCounters {
                rx_bytes: fields[0],
                rx_packets: fields[1],
                tx_bytes: fields[8],
                tx_packets: fields[9],
            },
        );
    }
    NetStats(interfaces)
}

static NET_INFO: SourceInfo = SourceInfo {
    name: MetricName::Net,
    description: "Received/transmitted bytes and packets per network interface",
    proc_files: &["net/dev"],
};

/// Samples `/proc/net/dev`.
pub struct NetSource {
    procfs: ProcFs,
}

impl NetSource {
    pub fn new(procfs: ProcFs) -> Self {
        Self { procfs }
    }
}

impl Default for NetSource {
    fn default() -> Self {
        Self::new(ProcFs::default())
    }
}

impl MetricSource for NetSource {
    fn info(&self) -> &SourceInfo {
        &NET_INFO
    }

    fn sample(&self) -> Result<Reading, SourceError> {
        let raw = self.procfs.read("net/dev")?;
        Ok(Reading::Net(parse_net_dev(&raw)))
    }
}
