//! Shared identifiers, wire event codes and timer configuration.

use serde::{Deserialize, Serialize};

use crate::error::MrpError;

/// Bridge port number.
pub type PortNo = u32;

/// Multiple Spanning Tree Instance identifier.
pub type Msti = u8;

/// Number of spanning-tree instances a ring is kept for.
pub const MSTI_COUNT: usize = 8;

/// Index of an attribute within an application's attribute table.
/// For MVRP this is `VID - 1`.
pub type AttributeIndex = u16;

/// Periodic timer interval. Fixed by the standard, not configurable.
pub const PERIODIC_INTERVAL_MS: u32 = 1000;

/// MRP application protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Protocol {
    Mvrp = 0,
    Gvrp = 1,
}

/// Number of protocols the engine can host.
pub const PROTOCOL_COUNT: usize = 2;

impl Protocol {
    /// Parses a protocol from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mvrp" | "MVRP" => Some(Self::Mvrp),
            "gvrp" | "GVRP" => Some(Self::Gvrp),
            _ => None,
        }
    }

    /// Converts to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mvrp => "mvrp",
            Self::Gvrp => "gvrp",
        }
    }
}

/// Registrar administrative status of one attribute on one port.
///
/// `Fixed` pins the registrar to `IN` and ignores Leave events; `Forbidden`
/// pins it to `MT` and ignores registration events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminStatus {
    #[default]
    Normal,
    Fixed,
    Forbidden,
}

impl AdminStatus {
    /// Parses an admin status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "fixed" => Some(Self::Fixed),
            "forbidden" => Some(Self::Forbidden),
            _ => None,
        }
    }

    /// Converts to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fixed => "fixed",
            Self::Forbidden => "forbidden",
        }
    }
}

/// Spanning-tree port state as seen by the propagation ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StpPortState {
    Forwarding,
    Discarding,
}

/// Spanning-tree port role. A change to `Designated` flushes the port's
/// registrations for the instance; a change away from it re-declares them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StpPortRole {
    Designated,
    RootOrAlternate,
}

/// Attribute event codes as they appear on the wire, plus the in-memory
/// `None` sentinel used in the per-attribute staging buffer ("no event for
/// this index"). The numeric values of the first six variants are the
/// protocol's packed event codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireEvent {
    New = 0,
    JoinIn = 1,
    In = 2,
    JoinMt = 3,
    Mt = 4,
    Leave = 5,
    None = 6,
}

impl WireEvent {
    /// Decodes a packed event code. Codes 6 and 7 can occur in a packed
    /// byte without the frame being malformed; they decode to `None`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::New,
            1 => Self::JoinIn,
            2 => Self::In,
            3 => Self::JoinMt,
            4 => Self::Mt,
            5 => Self::Leave,
            _ => Self::None,
        }
    }

    /// Converts to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::JoinIn => "JoinIn",
            Self::In => "In",
            Self::JoinMt => "JoinMt",
            Self::Mt => "Mt",
            Self::Leave => "Leave",
            Self::None => "None",
        }
    }
}

/// Per-port protocol timer configuration, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    pub join_ms: u32,
    pub leave_ms: u32,
    pub leaveall_ms: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            join_ms: 200,
            leave_ms: 600,
            leaveall_ms: 10_000,
        }
    }
}

impl TimerConfig {
    pub const JOIN_MIN_MS: u32 = 100;
    pub const JOIN_MAX_MS: u32 = 2_000;
    pub const LEAVE_MIN_MS: u32 = 300;
    pub const LEAVE_MAX_MS: u32 = 6_000;
    pub const LEAVEALL_MIN_MS: u32 = 5_000;
    pub const LEAVEALL_MAX_MS: u32 = 50_000;

    /// Validates the configured timeouts. The leave timeout must be at
    /// least twice the join timeout so a declaring station gets two
    /// transmit opportunities before its registration times out.
    pub fn validate(&self) -> Result<(), MrpError> {
        if self.join_ms < Self::JOIN_MIN_MS || self.join_ms > Self::JOIN_MAX_MS {
            return Err(MrpError::InvalidTimerConfig(format!(
                "join {}ms outside {}..={}ms",
                self.join_ms,
                Self::JOIN_MIN_MS,
                Self::JOIN_MAX_MS
            )));
        }
        if self.leave_ms < Self::LEAVE_MIN_MS || self.leave_ms > Self::LEAVE_MAX_MS {
            return Err(MrpError::InvalidTimerConfig(format!(
                "leave {}ms outside {}..={}ms",
                self.leave_ms,
                Self::LEAVE_MIN_MS,
                Self::LEAVE_MAX_MS
            )));
        }
        if self.leaveall_ms < Self::LEAVEALL_MIN_MS || self.leaveall_ms > Self::LEAVEALL_MAX_MS {
            return Err(MrpError::InvalidTimerConfig(format!(
                "leaveall {}ms outside {}..={}ms",
                self.leaveall_ms,
                Self::LEAVEALL_MIN_MS,
                Self::LEAVEALL_MAX_MS
            )));
        }
        if self.leave_ms < 2 * self.join_ms {
            return Err(MrpError::InvalidTimerConfig(format!(
                "leave {}ms below twice join {}ms",
                self.leave_ms, self.join_ms
            )));
        }
        Ok(())
    }
}
