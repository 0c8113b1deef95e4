//! Application adapter - the capability set a concrete MRP application
//! (MVRP or GVRP) plugs into the engine, plus the collaborator seams for
//! packet transport and the VLAN-configuration snapshot.

mod gvrp;
mod mvrp;

pub use gvrp::{Gvrp, GvrpCallbacks};
pub use mvrp::{Mvrp, MvrpCallbacks};

use crate::pdu::PduFormat;
use crate::types::{AdminStatus, AttributeIndex, Msti, PortNo, Protocol};

/// Capabilities of one MRP application. Exactly one instance per protocol
/// is registered with the engine.
pub trait MrpApplication: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Size of the attribute table; valid indices are `0..max`.
    fn max_attribute_index(&self) -> AttributeIndex;

    /// Protocol-fixed wire constants for the codec.
    fn pdu_format(&self) -> PduFormat;

    /// Spanning-tree instance whose ring propagates this attribute.
    fn msti_for_index(&self, index: AttributeIndex) -> Msti;

    /// An attribute became registered on the port. `is_new` marks a
    /// genuinely new declaration (topology change). An error counts as a
    /// failed registration.
    fn join_indication(&self, port: PortNo, index: AttributeIndex, is_new: bool)
        -> Result<(), String>;

    /// An attribute's registration timed out or was withdrawn.
    fn leave_indication(&self, port: PortNo, index: AttributeIndex);

    fn port_added(&self, port: PortNo);
    fn port_removed(&self, port: PortNo);
}

/// Packet transport consumed by the engine. Transmission is
/// fire-and-forget: allocate, hand over, done.
pub trait MrpTransport: Send + Sync {
    /// Allocates a transmit buffer. `None` makes the engine skip this
    /// transmit opportunity.
    fn alloc(&self, _port: PortNo, max_len: usize) -> Option<Vec<u8>> {
        Some(Vec::with_capacity(max_len))
    }

    /// Source MAC to stamp into transmitted PDUs. A transport backed by a
    /// driver that rewrites the source may leave the default.
    fn source_mac(&self, _port: PortNo) -> [u8; 6] {
        [0; 6]
    }

    fn send(&self, port: PortNo, frame: Vec<u8>) -> Result<(), String>;
}

/// Supplies the initial per-attribute admin status when a port is enabled
/// (the VLAN-configuration snapshot for MVRP).
pub trait AdminStatusProvider: Send + Sync {
    fn admin_status_snapshot(&self, port: PortNo, count: AttributeIndex) -> Vec<AdminStatus>;
}

/// Provider reporting every attribute as `Normal`.
#[derive(Debug, Default)]
pub struct NormalAdminStatus;

impl AdminStatusProvider for NormalAdminStatus {
    fn admin_status_snapshot(&self, _port: PortNo, count: AttributeIndex) -> Vec<AdminStatus> {
        vec![AdminStatus::Normal; count as usize]
    }
}
