//! Interface byte counters read from `/proc/net/dev`

use crate::core::{Error, Result};

const PROC_NET_DEV: &str = "/proc/net/dev";

/// Cumulative byte counters of one interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkCounters {
    pub received: u64,
    pub transmitted: u64,
}

impl NetworkCounters {
    /// Bytes moved between `earlier` and `self`
    pub fn since(&self, earlier: &NetworkCounters) -> NetworkCounters {
        NetworkCounters {
            received: self.received.saturating_sub(earlier.received),
            transmitted: self.transmitted.saturating_sub(earlier.transmitted),
        }
    }
}

/// Extract an interface's counters from the contents of `/proc/net/dev`
pub fn parse_proc_net_dev(content: &str, interface: &str) -> Option<NetworkCounters> {
    content.lines().skip(2).find_map(|line| {
        let (name, stats) = line.split_once(':')?;
        if name.trim() != interface {
            return None;
        }
        let fields: Vec<u64> = stats
            .split_whitespace()
            .map(|f| f.parse().ok())
            .collect::<Option<Vec<_>>>()?;
        // 8 receive columns precede the transmit block
        Some(NetworkCounters {
            received: *fields.first()?,
            transmitted: *fields.get(8)?,
        })
    })
}

/// Read the current counters of `interface`
pub async fn sample(interface: &str) -> Result<NetworkCounters> {
    let content = tokio::fs::read_to_string(PROC_NET_DEV).await?;
    parse_proc_net_dev(&content, interface).ok_or_else(|| {
        Error::configuration(format!("interface '{interface}' not found in {PROC_NET_DEV}"))
    })
}
