//! MAP - Multiple Attribute Propagation ring.
//!
//! One ring per spanning-tree instance over the ports currently forwarding
//! in that instance. Declarations learned on one port are flooded to the
//! other ring members. Membership is arena-indexed: a dense per-port record
//! with an explicit next-port index per instance, so removing a port can
//! never leave a dangling reference.

use tracing::debug;

use crate::types::{Msti, PortNo, MSTI_COUNT};

#[derive(Debug, Clone, Copy)]
struct MapPort {
    connected: [bool; MSTI_COUNT],
    next: [Option<PortNo>; MSTI_COUNT],
}

impl MapPort {
    fn new() -> Self {
        Self {
            connected: [false; MSTI_COUNT],
            next: [None; MSTI_COUNT],
        }
    }
}

/// Ring membership records for every port of the bridge.
#[derive(Debug)]
pub struct PortMap {
    ports: Vec<MapPort>,
}

impl PortMap {
    pub fn new(max_ports: usize) -> Self {
        Self {
            ports: vec![MapPort::new(); max_ports],
        }
    }

    pub fn is_connected(&self, msti: Msti, port: PortNo) -> bool {
        self.ports
            .get(port as usize)
            .map(|p| p.connected[msti as usize])
            .unwrap_or(false)
    }

    /// Number of ports connected to the instance.
    pub fn connected_count(&self, msti: Msti) -> usize {
        self.ports
            .iter()
            .filter(|p| p.connected[msti as usize])
            .count()
    }

    /// Connects a port to an instance's ring. The other ports are scanned
    /// in port-index order, wrapping, and the new port is spliced in right
    /// after the last connected port found; with no other member the port
    /// loops to itself. Idempotent.
    pub fn connect(&mut self, msti: Msti, port: PortNo) {
        let m = msti as usize;
        let n = self.ports.len();
        let p = port as usize;
        if p >= n || self.ports[p].connected[m] {
            return;
        }

        let mut last: Option<usize> = None;
        for offset in 1..n {
            let other = (p + offset) % n;
            if self.ports[other].connected[m] {
                last = Some(other);
            }
        }

        match last {
            Some(prev) => {
                self.ports[p].next[m] = self.ports[prev].next[m];
                self.ports[prev].next[m] = Some(port);
            }
            None => {
                self.ports[p].next[m] = Some(port);
            }
        }
        self.ports[p].connected[m] = true;
        debug!(msti, port, "port connected to map ring");
    }

    /// Splices a port out of an instance's ring. Idempotent.
    pub fn disconnect(&mut self, msti: Msti, port: PortNo) {
        let m = msti as usize;
        let p = port as usize;
        if p >= self.ports.len() || !self.ports[p].connected[m] {
            return;
        }

        let next = self.ports[p].next[m];
        if next == Some(port) {
            // Sole member: the ring becomes empty.
            self.ports[p].connected[m] = false;
            self.ports[p].next[m] = None;
            debug!(msti, port, "last port removed, map ring empty");
            return;
        }

        // Walk from the port's successor around to its predecessor.
        let mut cursor = next;
        while let Some(c) = cursor {
            let c = c as usize;
            if self.ports[c].next[m] == Some(port) {
                self.ports[c].next[m] = next;
                break;
            }
            cursor = self.ports[c].next[m];
        }
        self.ports[p].connected[m] = false;
        self.ports[p].next[m] = None;
        debug!(msti, port, "port disconnected from map ring");
    }

    /// The other members of the instance's ring, in ring order starting at
    /// the given port's successor. Empty if the port is not connected.
    pub fn ring_from(&self, msti: Msti, port: PortNo) -> Vec<PortNo> {
        let m = msti as usize;
        let p = port as usize;
        if p >= self.ports.len() || !self.ports[p].connected[m] {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut cursor = self.ports[p].next[m];
        while let Some(c) = cursor {
            if c == port {
                break;
            }
            out.push(c);
            cursor = self.ports[c as usize].next[m];
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walking the ring from any member must return to the start in
    /// exactly `connected_count` steps without visiting outsiders.
    fn assert_ring_invariant(map: &PortMap, msti: Msti) {
        let members: Vec<PortNo> = (0..map.ports.len() as PortNo)
            .filter(|p| map.is_connected(msti, *p))
            .collect();
        for start in &members {
            let walk = map.ring_from(msti, *start);
            assert_eq!(walk.len(), members.len() - 1, "walk from {start}");
            for p in &walk {
                assert!(map.is_connected(msti, *p), "disconnected port {p} visited");
            }
        }
        for p in 0..map.ports.len() as PortNo {
            if !map.is_connected(msti, p) {
                assert!(map.ring_from(msti, p).is_empty());
            }
        }
    }

    #[test]
    fn test_single_port_self_loops() {
        let mut map = PortMap::new(4);
        map.connect(0, 2);
        assert!(map.is_connected(0, 2));
        assert_eq!(map.connected_count(0), 1);
        assert!(map.ring_from(0, 2).is_empty());
        assert_ring_invariant(&map, 0);
    }

    #[test]
    fn test_insertion_keeps_index_order() {
        let mut map = PortMap::new(8);
        map.connect(0, 5);
        map.connect(0, 1);
        map.connect(0, 3);
        assert_eq!(map.ring_from(0, 1), vec![3, 5]);
        assert_eq!(map.ring_from(0, 3), vec![5, 1]);
        assert_eq!(map.ring_from(0, 5), vec![1, 3]);
        assert_ring_invariant(&map, 0);
    }

    #[test]
    fn test_disconnect_splices() {
        let mut map = PortMap::new(8);
        for p in [0, 2, 4, 6] {
            map.connect(1, p);
        }
        map.disconnect(1, 4);
        assert_eq!(map.ring_from(1, 0), vec![2, 6]);
        assert_ring_invariant(&map, 1);

        map.disconnect(1, 0);
        map.disconnect(1, 6);
        assert_eq!(map.connected_count(1), 1);
        assert_ring_invariant(&map, 1);

        map.disconnect(1, 2);
        assert_eq!(map.connected_count(1), 0);
        assert_ring_invariant(&map, 1);
    }

    #[test]
    fn test_connect_disconnect_interleaving() {
        let mut map = PortMap::new(8);
        let ops: [(bool, PortNo); 12] = [
            (true, 3),
            (true, 7),
            (true, 0),
            (false, 7),
            (true, 5),
            (true, 7),
            (false, 0),
            (false, 3),
            (true, 1),
            (false, 5),
            (true, 2),
            (false, 7),
        ];
        for (add, port) in ops {
            if add {
                map.connect(2, port);
            } else {
                map.disconnect(2, port);
            }
            assert_ring_invariant(&map, 2);
        }
        assert_eq!(map.connected_count(2), 2);
        assert_eq!(map.ring_from(2, 1), vec![2]);
    }

    #[test]
    fn test_idempotent_operations() {
        let mut map = PortMap::new(4);
        map.connect(0, 1);
        map.connect(0, 1);
        assert_eq!(map.connected_count(0), 1);
        map.disconnect(0, 3);
        map.disconnect(0, 1);
        map.disconnect(0, 1);
        assert_eq!(map.connected_count(0), 0);
    }

    #[test]
    fn test_instances_are_independent() {
        let mut map = PortMap::new(4);
        map.connect(0, 1);
        map.connect(1, 2);
        assert!(map.is_connected(0, 1));
        assert!(!map.is_connected(1, 1));
        assert!(map.is_connected(1, 2));
        map.disconnect(0, 1);
        assert!(map.is_connected(1, 2));
    }

    #[test]
    fn test_out_of_range_port_ignored() {
        let mut map = PortMap::new(2);
        map.connect(0, 9);
        assert!(!map.is_connected(0, 9));
        assert_eq!(map.connected_count(0), 0);
    }
}
