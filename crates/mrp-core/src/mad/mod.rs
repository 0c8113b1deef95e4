//! MAD - per-port Multiple Attribute Declaration state.
//!
//! A `PortMad` exists while the protocol is enabled on the port (and
//! globally). It owns one [`AttributeSlot`] per attribute index, the
//! port-level Join/LeaveAll/Periodic timers and the two port-level FSMs.
//! Event dispatch through the transition tables happens here; cross-port
//! effects (indications, ring propagation) are returned to the caller as
//! [`RegistrarIndication`] / [`ApplicantAction`] values and interpreted by
//! the engine.

mod machines;
mod types;

pub use types::{
    ApplicantEvent, ApplicantState, AttributeSlot, LeaveAllEvent, LeaveAllState, PeriodicEvent,
    PeriodicState, RegistrarEvent, RegistrarState, Timer,
};

pub(crate) use types::ApplicantAction;
use types::{LeaveAllAction, PeriodicAction, RegistrarAction};

use rand::Rng;
use tracing::trace;

use crate::stats::PortStats;
use crate::types::{AdminStatus, PortNo, TimerConfig, PERIODIC_INTERVAL_MS};

/// Cross-port effect of a registrar transition, interpreted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegistrarIndication {
    None,
    Join { is_new: bool },
    Leave,
}

/// Per-port attribute declaration state.
#[derive(Debug)]
pub struct PortMad {
    pub(crate) port: PortNo,
    pub(crate) slots: Vec<AttributeSlot>,
    pub(crate) join_timer: Timer,
    pub(crate) leaveall_timer: Timer,
    pub(crate) periodic_timer: Timer,
    pub(crate) leaveall_state: LeaveAllState,
    pub(crate) periodic_state: PeriodicState,
    pub(crate) point_to_point: bool,
    pub(crate) peer_mac: Option<[u8; 6]>,
    pub(crate) stats: PortStats,
    pub(crate) timers: TimerConfig,
}

impl PortMad {
    /// Creates the MAD for a port. Every applicant starts in `VO`; the
    /// registrar of a Fixed attribute starts registered. The LeaveAll timer
    /// is armed immediately, the Periodic timer only if periodic
    /// transmission is administratively enabled.
    pub(crate) fn new(
        port: PortNo,
        admin: &[AdminStatus],
        timers: TimerConfig,
        periodic_enabled: bool,
    ) -> Self {
        let slots = admin.iter().map(|a| AttributeSlot::new(*a)).collect();
        let mut mad = Self {
            port,
            slots,
            join_timer: Timer::default(),
            leaveall_timer: Timer::default(),
            periodic_timer: Timer::default(),
            leaveall_state: LeaveAllState::Passive,
            periodic_state: PeriodicState::Passive,
            point_to_point: false,
            peer_mac: None,
            stats: PortStats::default(),
            timers,
        };
        mad.start_leaveall_timer();
        if periodic_enabled {
            mad.periodic_event(PeriodicEvent::Begin);
        }
        mad
    }

    /// Requests a transmit opportunity. The Join timer runs for a random
    /// duration up to the configured timeout; a timer already running is
    /// left as is, which speeds up aggregation of pending events.
    pub(crate) fn request_tx(&mut self) {
        if self.join_timer.is_running() {
            return;
        }
        let timeout = rand::thread_rng().gen_range(1..=self.timers.join_ms.max(1));
        self.join_timer.start(timeout, false);
        trace!(port = self.port, timeout_ms = timeout, "join timer started");
    }

    /// (Re)arms the LeaveAll timer with a random duration in
    /// `[leaveall, 1.5 * leaveall]`.
    pub(crate) fn start_leaveall_timer(&mut self) {
        let base = self.timers.leaveall_ms;
        let timeout = base + rand::thread_rng().gen_range(0..=base / 2);
        self.leaveall_timer.start(timeout, true);
        trace!(port = self.port, timeout_ms = timeout, "leaveall timer started");
    }

    pub(crate) fn start_periodic_timer(&mut self) {
        self.periodic_timer.start(PERIODIC_INTERVAL_MS, true);
    }

    pub(crate) fn update_peer_mac(&mut self, mac: [u8; 6]) {
        self.peer_mac = Some(mac);
    }

    pub fn peer_mac(&self) -> Option<[u8; 6]> {
        self.peer_mac
    }

    pub fn slot(&self, index: usize) -> Option<&AttributeSlot> {
        self.slots.get(index)
    }

    /// Applies one applicant event to one attribute and returns the staged
    /// transmit action (meaningful only for the `Tx*` events).
    ///
    /// Two dispatcher-level exceptions to the table: transitions into the
    /// half-participation states `AO`/`AP` are discarded on a
    /// point-to-point link, and on a shared medium `AA` ignores `rIn`
    /// (an In observed there does not cover this station's declaration).
    pub(crate) fn applicant_event(&mut self, index: usize, event: ApplicantEvent) -> ApplicantAction {
        let current = self.slots[index].applicant;
        let (next, action) = machines::applicant_transition(current, event);
        let Some(next) = next else {
            return action;
        };
        if self.point_to_point && matches!(next, ApplicantState::Ao | ApplicantState::Ap) {
            return ApplicantAction::None;
        }
        if !self.point_to_point && current == ApplicantState::Aa && event == ApplicantEvent::RxIn {
            return ApplicantAction::None;
        }
        self.slots[index].applicant = next;
        if next != current {
            trace!(
                port = self.port,
                index,
                from = current.as_str(),
                to = next.as_str(),
                "applicant transition"
            );
        }
        if machines::requires_tx(next) {
            self.request_tx();
        }
        action
    }

    /// Applies one registrar event to one attribute. Leave-timer actions
    /// are handled locally; join/leave indications are returned for the
    /// engine to deliver and propagate. Callers gate this on
    /// `admin == Normal`.
    pub(crate) fn registrar_event(
        &mut self,
        index: usize,
        event: RegistrarEvent,
    ) -> RegistrarIndication {
        let current = self.slots[index].registrar;
        let (next, action) = machines::registrar_transition(current, event);
        if let Some(next) = next {
            if next != current {
                trace!(
                    port = self.port,
                    index,
                    from = current.as_str(),
                    to = next.as_str(),
                    "registrar transition"
                );
            }
            self.slots[index].registrar = next;
        }
        match action {
            RegistrarAction::None => RegistrarIndication::None,
            RegistrarAction::NewIndication => RegistrarIndication::Join { is_new: true },
            RegistrarAction::JoinIndication => RegistrarIndication::Join { is_new: false },
            RegistrarAction::LeaveIndication => RegistrarIndication::Leave,
            RegistrarAction::StartLeaveTimer => {
                let timeout = self.timers.leave_ms;
                self.slots[index].leave_timer.start(timeout, true);
                RegistrarIndication::None
            }
            RegistrarAction::StopLeaveTimer => {
                self.slots[index].leave_timer.stop();
                RegistrarIndication::None
            }
            RegistrarAction::StopLeaveTimerJoin => {
                self.slots[index].leave_timer.stop();
                RegistrarIndication::Join { is_new: false }
            }
        }
    }

    /// Applies one event to the port's LeaveAll FSM. Entering `Active`
    /// requests a transmit opportunity; the LeaveAll itself is emitted by
    /// the transmit walk.
    pub(crate) fn leaveall_event(&mut self, event: LeaveAllEvent) {
        let (next, action) = machines::leaveall_transition(self.leaveall_state, event);
        if let Some(next) = next {
            self.leaveall_state = next;
            if next == LeaveAllState::Active {
                self.request_tx();
            }
        }
        if action == LeaveAllAction::StartTimer {
            self.start_leaveall_timer();
        }
    }

    /// Applies one event to the port's Periodic FSM. Returns true when the
    /// caller must fire `periodic!` on every applicant of this port.
    pub(crate) fn periodic_event(&mut self, event: PeriodicEvent) -> bool {
        let (next, action) = machines::periodic_transition(self.periodic_state, event);
        if let Some(next) = next {
            self.periodic_state = next;
        }
        match action {
            PeriodicAction::None => false,
            PeriodicAction::StartTimer => {
                self.start_periodic_timer();
                false
            }
            PeriodicAction::StartTimerAndTrigger => {
                self.start_periodic_timer();
                true
            }
        }
    }
}
