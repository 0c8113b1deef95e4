//! MVRP - VLAN registration over the MRP engine.
//!
//! Attribute indices map 1:1 to VLAN IDs: `index = VID - 1`.

use std::sync::Arc;

use tracing::debug;

use super::MrpApplication;
use crate::pdu::PduFormat;
use crate::types::{AttributeIndex, Msti, PortNo, Protocol};

/// Bridge-side operations MVRP drives on registration changes.
pub trait MvrpCallbacks: Send + Sync {
    /// Adds the port to the VLAN's member set. Failing counts against the
    /// port's failed-registration statistic.
    fn vlan_member_add(&self, port: PortNo, vid: u16) -> Result<(), String>;

    fn vlan_member_remove(&self, port: PortNo, vid: u16);

    /// MSTI the VLAN maps to. Single-instance bridges keep the default.
    fn msti_for_vid(&self, _vid: u16) -> Msti {
        0
    }

    /// A genuinely new declaration was registered; give the filtering
    /// database a chance to age out stale entries.
    fn flush_fdb(&self, _port: PortNo, _vid: u16) {}
}

/// The MVRP application.
pub struct Mvrp {
    callbacks: Arc<dyn MvrpCallbacks>,
}

impl Mvrp {
    /// 01:80:C2:00:00:21, the Nearest Customer Bridge group address.
    pub const DESTINATION: [u8; 6] = [0x01, 0x80, 0xC2, 0x00, 0x00, 0x21];
    pub const ETHER_TYPE: [u8; 2] = [0x88, 0xF5];
    pub const PROTOCOL_VERSION: u8 = 0;
    pub const ATTRIBUTE_TYPE_VLAN: u8 = 1;
    pub const ATTRIBUTE_LENGTH_VLAN: u8 = 2;
    /// VIDs 1..=4094 are registrable.
    pub const MAX_VLAN_ID: u16 = 4094;

    pub fn new(callbacks: Arc<dyn MvrpCallbacks>) -> Self {
        Self { callbacks }
    }

    fn vid(index: AttributeIndex) -> u16 {
        index + 1
    }
}

impl MrpApplication for Mvrp {
    fn protocol(&self) -> Protocol {
        Protocol::Mvrp
    }

    fn max_attribute_index(&self) -> AttributeIndex {
        Self::MAX_VLAN_ID
    }

    fn pdu_format(&self) -> PduFormat {
        PduFormat {
            destination: Self::DESTINATION,
            discriminator: Self::ETHER_TYPE,
            version: Self::PROTOCOL_VERSION,
            attribute_type: Self::ATTRIBUTE_TYPE_VLAN,
            attribute_length: Self::ATTRIBUTE_LENGTH_VLAN,
            first_value_base: 1,
        }
    }

    fn msti_for_index(&self, index: AttributeIndex) -> Msti {
        self.callbacks.msti_for_vid(Self::vid(index))
    }

    fn join_indication(
        &self,
        port: PortNo,
        index: AttributeIndex,
        is_new: bool,
    ) -> Result<(), String> {
        let vid = Self::vid(index);
        debug!(port, vid, is_new, "MVRP join indication");
        self.callbacks.vlan_member_add(port, vid)?;
        if is_new {
            self.callbacks.flush_fdb(port, vid);
        }
        Ok(())
    }

    fn leave_indication(&self, port: PortNo, index: AttributeIndex) {
        let vid = Self::vid(index);
        debug!(port, vid, "MVRP leave indication");
        self.callbacks.vlan_member_remove(port, vid);
    }

    fn port_added(&self, port: PortNo) {
        debug!(port, "MVRP participant added");
    }

    fn port_removed(&self, port: PortNo) {
        debug!(port, "MVRP participant removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        added: Mutex<Vec<(PortNo, u16)>>,
        removed: Mutex<Vec<(PortNo, u16)>>,
        flushed: Mutex<Vec<(PortNo, u16)>>,
    }

    impl MvrpCallbacks for Recorder {
        fn vlan_member_add(&self, port: PortNo, vid: u16) -> Result<(), String> {
            self.added.lock().unwrap().push((port, vid));
            Ok(())
        }
        fn vlan_member_remove(&self, port: PortNo, vid: u16) {
            self.removed.lock().unwrap().push((port, vid));
        }
        fn flush_fdb(&self, port: PortNo, vid: u16) {
            self.flushed.lock().unwrap().push((port, vid));
        }
    }

    #[test]
    fn test_vid_mapping() {
        let rec = Arc::new(Recorder::default());
        let mvrp = Mvrp::new(rec.clone());
        mvrp.join_indication(3, 99, false).unwrap();
        mvrp.leave_indication(3, 99);
        assert_eq!(rec.added.lock().unwrap().as_slice(), &[(3, 100)]);
        assert_eq!(rec.removed.lock().unwrap().as_slice(), &[(3, 100)]);
        assert!(rec.flushed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_new_declaration_flushes_fdb() {
        let rec = Arc::new(Recorder::default());
        let mvrp = Mvrp::new(rec.clone());
        mvrp.join_indication(1, 0, true).unwrap();
        assert_eq!(rec.flushed.lock().unwrap().as_slice(), &[(1, 1)]);
    }

    #[test]
    fn test_format_constants() {
        let mvrp = Mvrp::new(Arc::new(Recorder::default()));
        let format = mvrp.pdu_format();
        assert_eq!(format.destination[5], 0x21);
        assert_eq!(format.discriminator, [0x88, 0xF5]);
        assert_eq!(format.first_value_base, 1);
        assert_eq!(mvrp.max_attribute_index(), 4094);
    }
}
