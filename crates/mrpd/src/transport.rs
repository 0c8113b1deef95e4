//! Transport and bridge-table backends for the daemon.
//!
//! The real packet path (raw sockets or a switch SDK) plugs in behind
//! [`mrp_core::MrpTransport`]; until one is wired up the daemon runs with
//! a logging transport and an in-memory VLAN membership table, which is
//! also what the tests drive.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::{debug, info};

use mrp_core::{MrpTransport, MvrpCallbacks, PortNo};

/// Transport that logs and counts transmitted PDUs instead of sending them.
#[derive(Debug, Default)]
pub struct LoggingTransport {
    sent: Mutex<u64>,
}

impl LoggingTransport {
    pub fn sent(&self) -> u64 {
        *self.sent.lock().unwrap()
    }
}

impl MrpTransport for LoggingTransport {
    fn send(&self, port: PortNo, frame: Vec<u8>) -> Result<(), String> {
        *self.sent.lock().unwrap() += 1;
        debug!(port, len = frame.len(), "PDU transmitted");
        Ok(())
    }
}

/// In-memory VLAN membership table fed by MVRP indications.
#[derive(Debug, Default)]
pub struct VlanTable {
    members: Mutex<HashMap<u16, HashSet<PortNo>>>,
}

impl VlanTable {
    pub fn members(&self, vid: u16) -> Vec<PortNo> {
        let mut ports: Vec<PortNo> = self
            .members
            .lock()
            .unwrap()
            .get(&vid)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        ports.sort_unstable();
        ports
    }
}

impl MvrpCallbacks for VlanTable {
    fn vlan_member_add(&self, port: PortNo, vid: u16) -> Result<(), String> {
        self.members
            .lock()
            .unwrap()
            .entry(vid)
            .or_default()
            .insert(port);
        info!(port, vid, "VLAN member registered");
        Ok(())
    }

    fn vlan_member_remove(&self, port: PortNo, vid: u16) {
        let mut members = self.members.lock().unwrap();
        if let Some(set) = members.get_mut(&vid) {
            set.remove(&port);
            if set.is_empty() {
                members.remove(&vid);
            }
        }
        info!(port, vid, "VLAN member deregistered");
    }
}
