//! GVRP - generic group attribute registration over the MRP engine.
//!
//! Carried as a second application instance with its own protocol
//! constants; frames use the LLC 0x42/0x42 discriminator instead of an
//! ethertype. GVRP predates multiple spanning trees, so every attribute
//! propagates over instance 0.

use std::sync::Arc;

use tracing::debug;

use super::MrpApplication;
use crate::pdu::PduFormat;
use crate::types::{AttributeIndex, Msti, PortNo, Protocol};

/// Bridge-side operations GVRP drives on registration changes.
pub trait GvrpCallbacks: Send + Sync {
    fn group_add(&self, port: PortNo, index: AttributeIndex) -> Result<(), String>;
    fn group_remove(&self, port: PortNo, index: AttributeIndex);
}

/// The GVRP application.
pub struct Gvrp {
    callbacks: Arc<dyn GvrpCallbacks>,
    max_index: AttributeIndex,
}

impl Gvrp {
    pub const DESTINATION: [u8; 6] = [0x01, 0x80, 0xC2, 0x00, 0x00, 0x21];
    /// LLC DSAP/SSAP pair used as the frame discriminator.
    pub const LLC_DISCRIMINATOR: [u8; 2] = [0x42, 0x42];
    pub const PROTOCOL_VERSION: u8 = 0;
    pub const ATTRIBUTE_TYPE_GROUP: u8 = 1;
    pub const ATTRIBUTE_LENGTH_GROUP: u8 = 2;
    pub const DEFAULT_MAX_INDEX: AttributeIndex = 4094;

    pub fn new(callbacks: Arc<dyn GvrpCallbacks>) -> Self {
        Self {
            callbacks,
            max_index: Self::DEFAULT_MAX_INDEX,
        }
    }

    pub fn with_max_index(mut self, max_index: AttributeIndex) -> Self {
        self.max_index = max_index;
        self
    }
}

impl MrpApplication for Gvrp {
    fn protocol(&self) -> Protocol {
        Protocol::Gvrp
    }

    fn max_attribute_index(&self) -> AttributeIndex {
        self.max_index
    }

    fn pdu_format(&self) -> PduFormat {
        PduFormat {
            destination: Self::DESTINATION,
            discriminator: Self::LLC_DISCRIMINATOR,
            version: Self::PROTOCOL_VERSION,
            attribute_type: Self::ATTRIBUTE_TYPE_GROUP,
            attribute_length: Self::ATTRIBUTE_LENGTH_GROUP,
            first_value_base: 1,
        }
    }

    fn msti_for_index(&self, _index: AttributeIndex) -> Msti {
        0
    }

    fn join_indication(
        &self,
        port: PortNo,
        index: AttributeIndex,
        is_new: bool,
    ) -> Result<(), String> {
        debug!(port, index, is_new, "GVRP join indication");
        self.callbacks.group_add(port, index)
    }

    fn leave_indication(&self, port: PortNo, index: AttributeIndex) {
        debug!(port, index, "GVRP leave indication");
        self.callbacks.group_remove(port, index);
    }

    fn port_added(&self, port: PortNo) {
        debug!(port, "GVRP participant added");
    }

    fn port_removed(&self, port: PortNo) {
        debug!(port, "GVRP participant removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;
    impl GvrpCallbacks for Nop {
        fn group_add(&self, _port: PortNo, _index: AttributeIndex) -> Result<(), String> {
            Ok(())
        }
        fn group_remove(&self, _port: PortNo, _index: AttributeIndex) {}
    }

    #[test]
    fn test_llc_discriminator() {
        let gvrp = Gvrp::new(Arc::new(Nop));
        let format = gvrp.pdu_format();
        assert_eq!(format.discriminator, [0x42, 0x42]);
        assert_eq!(format.destination, Gvrp::DESTINATION);
    }

    #[test]
    fn test_bounded_table() {
        let gvrp = Gvrp::new(Arc::new(Nop)).with_max_index(64);
        assert_eq!(gvrp.max_attribute_index(), 64);
        assert_eq!(gvrp.msti_for_index(7), 0);
    }
}
