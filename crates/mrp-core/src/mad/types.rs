//! States, events and timers of the per-attribute state machines.

use crate::types::AdminStatus;

/// Registrar states. `Lv` keeps the attribute registered while its leave
/// timer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegistrarState {
    In = 0,
    Lv = 1,
    Mt = 2,
}

impl RegistrarState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Lv => "LV",
            Self::Mt => "MT",
        }
    }
}

/// Applicant states of the 802.1Q-2014 table. The quiet states (`Qa`, `Qo`,
/// `Qp`) suppress transmission once another station's declaration has been
/// observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApplicantState {
    Vo = 0,
    Vp = 1,
    Vn = 2,
    An = 3,
    Aa = 4,
    Qa = 5,
    La = 6,
    Ao = 7,
    Qo = 8,
    Ap = 9,
    Qp = 10,
    Lo = 11,
}

impl ApplicantState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vo => "VO",
            Self::Vp => "VP",
            Self::Vn => "VN",
            Self::An => "AN",
            Self::Aa => "AA",
            Self::Qa => "QA",
            Self::La => "LA",
            Self::Ao => "AO",
            Self::Qo => "QO",
            Self::Ap => "AP",
            Self::Qp => "QP",
            Self::Lo => "LO",
        }
    }

    /// States in which the applicant is not declaring the attribute.
    pub fn not_declaring(&self) -> bool {
        matches!(self, Self::Vo | Self::Ao | Self::Qo | Self::Lo)
    }
}

/// LeaveAll FSM state. `Active` means the next transmit opportunity carries
/// a LeaveAll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LeaveAllState {
    Passive = 0,
    Active = 1,
}

/// Periodic FSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PeriodicState {
    Passive = 0,
    Active = 1,
}

/// Registrar FSM events, in transition-table column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegistrarEvent {
    Begin = 0,
    RxNew = 1,
    RxJoinIn = 2,
    RxJoinMt = 3,
    RxLeave = 4,
    RxLeaveAll = 5,
    TxLeaveAll = 6,
    Redeclare = 7,
    Flush = 8,
    TimerExpired = 9,
}

pub(crate) const REGISTRAR_EVENT_COUNT: usize = 10;

/// Applicant FSM events, in transition-table column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApplicantEvent {
    Begin = 0,
    New = 1,
    Join = 2,
    Leave = 3,
    RxNew = 4,
    RxJoinIn = 5,
    RxIn = 6,
    RxJoinMt = 7,
    RxMt = 8,
    RxLeave = 9,
    RxLeaveAll = 10,
    Redeclare = 11,
    Periodic = 12,
    Tx = 13,
    TxLeaveAll = 14,
    TxLeaveAllFull = 15,
}

pub(crate) const APPLICANT_EVENT_COUNT: usize = 16;

/// LeaveAll FSM events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LeaveAllEvent {
    Begin = 0,
    Tx = 1,
    Rx = 2,
    TimerExpired = 3,
}

pub(crate) const LEAVEALL_EVENT_COUNT: usize = 4;

/// Periodic FSM events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PeriodicEvent {
    Begin = 0,
    Enabled = 1,
    Disabled = 2,
    TimerExpired = 3,
}

pub(crate) const PERIODIC_EVENT_COUNT: usize = 4;

/// Side effect of a registrar transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegistrarAction {
    None,
    /// Join indication with the new-declaration flag set.
    NewIndication,
    /// Join indication without the new flag.
    JoinIndication,
    /// Leave indication.
    LeaveIndication,
    StartLeaveTimer,
    StopLeaveTimer,
    /// Stop the leave timer and raise a join indication.
    StopLeaveTimerJoin,
}

/// Side effect of an applicant transition. The `Send*` actions only occur
/// in the transmit-opportunity columns and name the event to stage for
/// encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplicantAction {
    None,
    SendNew,
    /// JoinIn if the registrar is `In`, JoinMt otherwise.
    SendJoin,
    /// In if the registrar is `In`, Mt otherwise.
    Send,
    SendLeave,
    /// Stage the explicit no-event sentinel for this index.
    SendInvalid,
}

/// Side effect of a LeaveAll transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LeaveAllAction {
    None,
    StartTimer,
    /// The LeaveAll itself is emitted by the transmit walk.
    SendLeaveAll,
}

/// Side effect of a Periodic transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PeriodicAction {
    None,
    StartTimer,
    /// Restart the timer and fire `periodic!` on every applicant.
    StartTimerAndTrigger,
}

/// One protocol timer. Decremented by the tick pass; the kick flag protects
/// a timer armed mid-cycle from losing its first interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    running: bool,
    kick: bool,
    remaining: i64,
}

impl Timer {
    /// Arms the timer. A running timer is left untouched unless `restart`.
    pub fn start(&mut self, timeout_ms: u32, restart: bool) {
        if self.running && !restart {
            return;
        }
        self.running = true;
        self.kick = true;
        self.remaining = i64::from(timeout_ms);
    }

    /// Idempotent stop.
    pub fn stop(&mut self) {
        self.running = false;
        self.kick = false;
        self.remaining = 0;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advances the timer by `elapsed_ms` and reports expiry. The caller is
    /// expected to `stop` or restart an expired timer.
    pub fn advance(&mut self, elapsed_ms: u32) -> bool {
        if !self.running {
            return false;
        }
        if self.kick {
            self.kick = false;
        } else {
            self.remaining -= i64::from(elapsed_ms);
        }
        self.remaining <= 0
    }

    /// Remaining time if the timer is running and has not expired.
    pub fn remaining_ms(&self) -> Option<u32> {
        if self.running && self.remaining > 0 {
            Some(self.remaining as u32)
        } else {
            None
        }
    }
}

/// State of one `(port, attribute)` pair: the two per-attribute machines,
/// the administrative status and the attribute's leave timer.
#[derive(Debug, Clone, Copy)]
pub struct AttributeSlot {
    pub applicant: ApplicantState,
    pub registrar: RegistrarState,
    pub admin: AdminStatus,
    pub leave_timer: Timer,
}

impl AttributeSlot {
    /// Quiescent starting point: applicant `VO`, registrar `IN` for a Fixed
    /// attribute and `MT` otherwise.
    pub fn new(admin: AdminStatus) -> Self {
        let registrar = if admin == AdminStatus::Fixed {
            RegistrarState::In
        } else {
            RegistrarState::Mt
        };
        Self {
            applicant: ApplicantState::Vo,
            registrar,
            admin,
            leave_timer: Timer::default(),
        }
    }

    /// The attribute is registered while the registrar is not `MT`.
    pub fn registered(&self) -> bool {
        self.registrar != RegistrarState::Mt
    }
}
