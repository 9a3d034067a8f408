// static shortest-path routing over the topology graph

use std::collections::VecDeque;

use hashbrown::HashMap;
use log::debug;

use crate::ws_interface::{Addr, InterfaceId, NodeId, SimError, Subnet};
use crate::ws_topology::Topology;

/// One forwarding rule: packets for `destination` leave through `next_hop`
#[derive(Debug, Clone, Copy)]
pub struct RoutingEntry {
    pub destination: Subnet,
    pub next_hop: InterfaceId,
}

/// Per-node forwarding tables, computed once after the topology is final
///
/// Hop-count shortest path (BFS) from every node; read-only for the rest of
/// the run. The topology never changes mid-run, so there is no
/// re-convergence path.
pub struct RoutingTable {
    // indexed by NodeId, entries longest-prefix first
    entries: Vec<Vec<RoutingEntry>>,
}

impl RoutingTable {
    /// Populate forwarding tables for every node in the topology
    ///
    /// Run after all channels are connected and all addresses assigned;
    /// interfaces without an address do not produce destinations but still
    /// carry transit traffic.
    pub fn compute_global(topo: &Topology) -> Self {
        let entries = topo
            .nodes()
            .iter()
            .map(|n| Self::compute_for_node(topo, n.id))
            .collect();
        Self { entries }
    }

    fn compute_for_node(topo: &Topology, origin: NodeId) -> Vec<RoutingEntry> {
        // BFS tree: distance and the local interface the path leaves through
        let mut reach: Vec<Option<(u32, InterfaceId)>> = vec![None; topo.nodes().len()];
        reach[origin as usize] = Some((0, InterfaceId::MAX));

        let mut frontier = VecDeque::new();
        frontier.push_back(origin);

        while let Some(at) = frontier.pop_front() {
            let (dist, via) = reach[at as usize].unwrap_or((0, InterfaceId::MAX));
            for &iface in &topo.node(at).interfaces {
                let channel = topo.channel(topo.iface(iface).channel);
                let peer = topo.iface(channel.peer_of(iface)).node;
                if reach[peer as usize].is_some() {
                    continue;
                }
                // first hop is inherited past the origin's own neighbors
                let first_hop = if at == origin { iface } else { via };
                reach[peer as usize] = Some((dist + 1, first_hop));
                frontier.push_back(peer);
            }
        }

        // nearest owner wins per subnet; both ends of a link advertise it
        let mut best: HashMap<Subnet, (u32, InterfaceId)> = HashMap::new();
        for iface in topo.interfaces() {
            let Some(subnet) = iface.subnet else { continue };
            let candidate = if iface.node == origin {
                // on-link destination: leave through the attached interface
                Some((0, iface.id))
            } else {
                reach[iface.node as usize]
            };
            if let Some((dist, via)) = candidate {
                match best.get(&subnet) {
                    Some((d, _)) if *d <= dist => {}
                    _ => {
                        best.insert(subnet, (dist, via));
                    }
                }
            }
        }

        let mut table: Vec<RoutingEntry> = best
            .into_iter()
            .map(|(destination, (_, next_hop))| RoutingEntry {
                destination,
                next_hop,
            })
            .collect();
        // longest prefix first, then base address: deterministic lookup and
        // deterministic table dumps independent of map iteration order
        table.sort_by(|a, b| {
            b.destination
                .mask
                .cmp(&a.destination.mask)
                .then(a.destination.base.cmp(&b.destination.base))
        });

        debug!("node {}: {} routing entries", origin, table.len());
        table
    }

    /// Next-hop lookup for `dst` at `node`
    pub fn resolve(&self, node: NodeId, dst: Addr) -> Result<InterfaceId, SimError> {
        self.entries[node as usize]
            .iter()
            .find(|e| e.destination.contains(dst))
            .map(|e| e.next_hop)
            .ok_or(SimError::NoRoute)
    }

    pub fn entries(&self, node: NodeId) -> &[RoutingEntry] {
        &self.entries[node as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_interface::DataRate;

    const MASK_24: u32 = 0xFFFF_FF00;

    fn subnet(a: u8, b: u8, c: u8) -> Subnet {
        Subnet::new(Addr::new(a, b, c, 0), MASK_24)
    }

    /// Triangle of routers with one host hanging off each
    fn triangle() -> (Topology, Vec<NodeId>, Vec<NodeId>) {
        let mut topo = Topology::new();
        let routers: Vec<NodeId> = (0..3).map(|_| topo.create_node()).collect();
        let hosts: Vec<NodeId> = (0..3).map(|_| topo.create_node()).collect();

        let rate = DataRate::from_mbps(100);
        for i in 0..3 {
            let ch = topo.connect(routers[i], routers[(i + 1) % 3], rate, 0, 4);
            topo.assign_link(ch, subnet(10, 2, i as u8 + 1)).unwrap();
        }
        for i in 0..3 {
            let ch = topo.connect(hosts[i], routers[i], rate, 0, 4);
            topo.assign_link(ch, subnet(172, 16, i as u8 + 1)).unwrap();
        }
        (topo, routers, hosts)
    }

    #[test]
    fn every_pair_resolves_on_a_connected_graph() {
        let (topo, _, _) = triangle();
        let routes = RoutingTable::compute_global(&topo);

        for node in topo.nodes() {
            for iface in topo.interfaces() {
                let addr = iface.addr.unwrap();
                assert!(
                    routes.resolve(node.id, addr).is_ok(),
                    "node {} cannot reach {}",
                    node.id,
                    addr
                );
            }
        }
    }

    #[test]
    fn next_hop_points_at_the_destination_side() {
        let (topo, routers, hosts) = triangle();
        let routes = RoutingTable::compute_global(&topo);

        // host 0 -> host 1's address must leave host 0 through its only
        // interface, and router 0 must forward it on the 0-1 backbone edge
        let dst = topo.node_addr(hosts[1]).unwrap();

        let host_if = routes.resolve(hosts[0], dst).unwrap();
        assert_eq!(topo.iface(host_if).node, hosts[0]);

        let router_if = routes.resolve(routers[0], dst).unwrap();
        let channel = topo.channel(topo.iface(router_if).channel);
        let peer_node = topo.iface(channel.peer_of(router_if)).node;
        assert_eq!(peer_node, routers[1]);
    }

    #[test]
    fn one_hop_beats_two_on_the_triangle() {
        let (topo, routers, _) = triangle();
        let routes = RoutingTable::compute_global(&topo);

        // router 0 -> the 10.2.2.0 link (between routers 1 and 2): nearest
        // owner is one hop away on either edge, never routed back locally
        let via = routes.resolve(routers[0], Addr::new(10, 2, 2, 1)).unwrap();
        assert_eq!(topo.iface(via).node, routers[0]);
    }

    #[test]
    fn disconnected_destination_has_no_route() {
        let (mut topo, _, hosts) = triangle();
        let island = topo.create_node();
        let lonely = topo.create_node();
        let ch = topo.connect(island, lonely, DataRate::from_mbps(10), 0, 4);
        topo.assign_link(ch, subnet(192, 168, 1)).unwrap();

        let routes = RoutingTable::compute_global(&topo);
        assert_eq!(
            routes.resolve(hosts[0], Addr::new(192, 168, 1, 1)),
            Err(SimError::NoRoute)
        );
        assert_eq!(
            routes.resolve(island, topo.node_addr(hosts[0]).unwrap()),
            Err(SimError::NoRoute)
        );
        // the island still routes internally
        assert!(routes.resolve(island, Addr::new(192, 168, 1, 2)).is_ok());
    }
}
