//! MRP - Multiple Registration Protocol engine (IEEE 802.1Q clause 10).
//!
//! Control-plane engine for GARP-derived registration protocols on a
//! multi-port, multi-spanning-tree-instance bridge. MVRP declares and
//! registers VLAN membership; GVRP does the same for generic group
//! attributes.
//!
//! # Architecture
//!
//! ```text
//! topology / VLAN config / received PDUs
//!        │
//!        ▼
//! [applications] ──> [engine] ──> [mad]  per-port FSMs + timers
//!                       │          │
//!                       │          ▼
//!                       │        [map]  per-MSTI propagation ring
//!                       ▼
//!                     [pdu]  vector-attribute codec ──> transport
//! ```
//!
//! # Key components
//!
//! - [`engine::MrpEngine`]: the context object; management API, event
//!   dispatch and the timer tick
//! - [`mad`]: per-port attribute store and the Applicant / Registrar /
//!   LeaveAll / Periodic state machines
//! - [`map`]: the attribute-propagation ring over forwarding ports
//! - [`pdu`]: wire encode/decode of attribute event vectors
//! - [`applications`]: the adapter trait with the MVRP and GVRP
//!   implementations
//!
//! One external timer thread drives [`engine::MrpEngine::tick`]; receive
//! callbacks enter through [`engine::MrpEngine::receive`]; management calls
//! may come from any thread. A single internal mutex serializes all of it.

pub mod applications;
pub mod engine;
pub mod error;
pub mod mad;
pub mod map;
pub mod pdu;
pub mod stats;
pub mod types;

pub use applications::{
    AdminStatusProvider, Gvrp, GvrpCallbacks, MrpApplication, MrpTransport, Mvrp, MvrpCallbacks,
    NormalAdminStatus,
};
pub use engine::{AttributeStateView, MrpEngine};
pub use error::{MrpError, Result};
pub use stats::PortStats;
pub use types::{
    AdminStatus, AttributeIndex, Msti, PortNo, Protocol, StpPortRole, StpPortState, TimerConfig,
    WireEvent,
};
