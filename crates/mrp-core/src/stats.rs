//! Per-port protocol statistics.

use crate::types::WireEvent;

/// Counters for one direction, broken down by attribute event kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounters {
    pub new: u64,
    pub join_in: u64,
    pub r#in: u64,
    pub join_mt: u64,
    pub mt: u64,
    pub leave: u64,
    pub leave_all: u64,
}

impl EventCounters {
    fn record(&mut self, event: WireEvent) {
        match event {
            WireEvent::New => self.new += 1,
            WireEvent::JoinIn => self.join_in += 1,
            WireEvent::In => self.r#in += 1,
            WireEvent::JoinMt => self.join_mt += 1,
            WireEvent::Mt => self.mt += 1,
            WireEvent::Leave => self.leave += 1,
            WireEvent::None => {}
        }
    }
}

/// Per-port statistics for one protocol instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStats {
    /// PDUs received (including later-rejected ones).
    pub pdus_rx: u64,
    /// PDUs transmitted.
    pub pdus_tx: u64,
    /// Received frames dropped as malformed.
    pub pdus_dropped_rx: u64,
    /// Registrations that could not be installed by the application.
    pub failed_registrations: u64,
    pub rx: EventCounters,
    pub tx: EventCounters,
}

impl PortStats {
    pub(crate) fn record_rx_event(&mut self, event: WireEvent) {
        self.rx.record(event);
    }

    pub(crate) fn record_tx_event(&mut self, event: WireEvent) {
        self.tx.record(event);
    }

    pub(crate) fn record_rx_leave_all(&mut self) {
        self.rx.leave_all += 1;
    }

    pub(crate) fn record_tx_leave_all(&mut self) {
        self.tx.leave_all += 1;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
