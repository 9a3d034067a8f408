// nodes, interfaces and point-to-point channels

use crate::ws_interface::{
    Addr, ChannelId, DataRate, InterfaceId, NodeId, SimError, SimTime, Subnet,
};

/// Default device queue depth per channel direction, in packets, counting
/// the packet currently on the wire
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

// ============================================================================
// Structural pieces
// ============================================================================

/// An addressable endpoint or router; pure bookkeeping
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub interfaces: Vec<InterfaceId>,
}

/// One end of a point-to-point channel, owned by exactly one node
#[derive(Debug, Clone)]
pub struct Interface {
    pub id: InterfaceId,
    pub node: NodeId,
    pub channel: ChannelId,
    pub addr: Option<Addr>,
    pub subnet: Option<Subnet>,
}

/// Per-direction wire occupancy
///
/// `in_flight` counts packets waiting in the device queue plus the one being
/// serialized; `busy_until` is when the wire frees up for the next packet.
#[derive(Debug, Clone, Copy, Default)]
struct WireState {
    busy_until: SimTime,
    in_flight: usize,
}

/// Point-to-point transmission medium between exactly two interfaces
///
/// Each direction is an independent, non-preemptible resource (full duplex
/// across directions, strict FIFO within one). The device queue bound is the
/// only loss source in the model.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub data_rate: DataRate,
    pub delay: SimTime,
    pub queue_capacity: usize,
    pub endpoints: [InterfaceId; 2],
    wire: [WireState; 2],
}

/// Outcome of handing a packet to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Packet accepted: when its serialization finishes (wire free again)
    /// and when it arrives at the peer interface
    Scheduled {
        serialized_at: SimTime,
        delivered_at: SimTime,
    },

    /// Device queue full in this direction
    QueueFull,
}

impl Channel {
    fn direction_from(&self, from: InterfaceId) -> usize {
        if self.endpoints[0] == from {
            0
        } else {
            1
        }
    }

    /// The interface on the other side of the wire
    pub fn peer_of(&self, from: InterfaceId) -> InterfaceId {
        if self.endpoints[0] == from {
            self.endpoints[1]
        } else {
            self.endpoints[0]
        }
    }

    /// Admit a packet for transmission out of `from` at time `now`
    ///
    /// Serialization starts once the wire is free in this direction, never
    /// earlier than `now`; delivery is serialization end plus propagation.
    pub fn admit(&mut self, from: InterfaceId, now: SimTime, bytes: u32) -> Admission {
        let dir = self.direction_from(from);
        let wire = &mut self.wire[dir];

        if wire.in_flight >= self.queue_capacity {
            return Admission::QueueFull;
        }
        wire.in_flight += 1;

        let start = now.max(wire.busy_until);
        let serialized_at = start + self.data_rate.serialization_delay(bytes);
        wire.busy_until = serialized_at;

        Admission::Scheduled {
            serialized_at,
            delivered_at: serialized_at + self.delay,
        }
    }

    /// A packet finished serializing out of `from`; frees its queue slot
    pub fn tx_complete(&mut self, from: InterfaceId) {
        let dir = self.direction_from(from);
        debug_assert!(self.wire[dir].in_flight > 0);
        self.wire[dir].in_flight = self.wire[dir].in_flight.saturating_sub(1);
    }

    pub fn queued(&self, from: InterfaceId) -> usize {
        self.wire[self.direction_from(from)].in_flight
    }
}

// ============================================================================
// Topology
// ============================================================================

/// The static node/interface/channel graph
///
/// Built once before the run; the interface set of a node and the endpoint
/// pair of a channel never change afterwards.
pub struct Topology {
    nodes: Vec<Node>,
    interfaces: Vec<Interface>,
    channels: Vec<Channel>,
}

impl Topology {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            interfaces: Vec::new(),
            channels: Vec::new(),
        }
    }

    pub fn create_node(&mut self) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node {
            id,
            interfaces: Vec::new(),
        });
        id
    }

    /// Install a point-to-point channel between two nodes
    ///
    /// Creates one interface on each node and wires them to a fresh channel.
    pub fn connect(
        &mut self,
        a: NodeId,
        b: NodeId,
        data_rate: DataRate,
        delay: SimTime,
        queue_capacity: usize,
    ) -> ChannelId {
        let channel_id = self.channels.len() as ChannelId;
        let iface_a = self.attach_interface(a, channel_id);
        let iface_b = self.attach_interface(b, channel_id);

        self.channels.push(Channel {
            id: channel_id,
            data_rate,
            delay,
            queue_capacity,
            endpoints: [iface_a, iface_b],
            wire: [WireState::default(), WireState::default()],
        });

        channel_id
    }

    fn attach_interface(&mut self, node: NodeId, channel: ChannelId) -> InterfaceId {
        let id = self.interfaces.len() as InterfaceId;
        self.interfaces.push(Interface {
            id,
            node,
            channel,
            addr: None,
            subnet: None,
        });
        self.nodes[node as usize].interfaces.push(id);
        id
    }

    /// Assign an address to an interface; an interface carries at most one
    pub fn assign(&mut self, iface: InterfaceId, addr: Addr, subnet: Subnet) -> Result<(), SimError> {
        let entry = &mut self.interfaces[iface as usize];
        if entry.addr.is_some() {
            return Err(SimError::DuplicateAssignment);
        }
        entry.addr = Some(addr);
        entry.subnet = Some(subnet);
        Ok(())
    }

    /// Number a whole link: hosts 1 and 2 of `subnet` go to the channel's
    /// two endpoints, in endpoint order
    pub fn assign_link(&mut self, channel: ChannelId, subnet: Subnet) -> Result<(Addr, Addr), SimError> {
        let [a, b] = self.channels[channel as usize].endpoints;
        let addr_a = subnet.host(1);
        let addr_b = subnet.host(2);
        self.assign(a, addr_a, subnet)?;
        self.assign(b, addr_b, subnet)?;
        Ok((addr_a, addr_b))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn iface(&self, id: InterfaceId) -> &Interface {
        &self.interfaces[id as usize]
    }

    pub fn channel(&self, id: ChannelId) -> &Channel {
        &self.channels[id as usize]
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> &mut Channel {
        &mut self.channels[id as usize]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// First assigned address of a node, the one applications source from
    pub fn node_addr(&self, node: NodeId) -> Option<Addr> {
        self.nodes[node as usize]
            .interfaces
            .iter()
            .find_map(|i| self.interfaces[*i as usize].addr)
    }

    /// Does any interface of `node` carry `addr`?
    pub fn is_local_addr(&self, node: NodeId, addr: Addr) -> bool {
        self.nodes[node as usize]
            .interfaces
            .iter()
            .any(|i| self.interfaces[*i as usize].addr == Some(addr))
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_interface::NANOS_PER_SEC;

    fn two_node_link(rate: DataRate, delay: SimTime, cap: usize) -> (Topology, ChannelId) {
        let mut topo = Topology::new();
        let a = topo.create_node();
        let b = topo.create_node();
        let ch = topo.connect(a, b, rate, delay, cap);
        (topo, ch)
    }

    #[test]
    fn duplicate_assignment_is_rejected() {
        let (mut topo, ch) = two_node_link(DataRate::from_mbps(10), 0, 4);
        let subnet = Subnet::new(Addr::new(10, 1, 1, 0), 0xFFFF_FF00);
        let (a, b) = topo.assign_link(ch, subnet).unwrap();
        assert_eq!(a, Addr::new(10, 1, 1, 1));
        assert_eq!(b, Addr::new(10, 1, 1, 2));

        let iface = topo.channel(ch).endpoints[0];
        assert_eq!(
            topo.assign(iface, subnet.host(3), subnet),
            Err(SimError::DuplicateAssignment)
        );
    }

    #[test]
    fn wire_is_serialized_back_to_back() {
        // 1000 bytes at 8 Mbps = 1 ms on the wire
        let (mut topo, ch) = two_node_link(DataRate::from_bps(8_000_000), 5_000_000, 10);
        let from = topo.channel(ch).endpoints[0];
        let ms = NANOS_PER_SEC / 1_000;

        let first = topo.channel_mut(ch).admit(from, 0, 1000);
        assert_eq!(
            first,
            Admission::Scheduled {
                serialized_at: ms,
                delivered_at: 6 * ms,
            }
        );

        // second packet offered while the wire is busy waits for it
        let second = topo.channel_mut(ch).admit(from, 0, 1000);
        assert_eq!(
            second,
            Admission::Scheduled {
                serialized_at: 2 * ms,
                delivered_at: 7 * ms,
            }
        );
    }

    #[test]
    fn directions_are_independent() {
        let (mut topo, ch) = two_node_link(DataRate::from_bps(8_000_000), 0, 1);
        let [a, b] = topo.channel(ch).endpoints;

        // saturate a -> b; b -> a is untouched
        assert!(matches!(
            topo.channel_mut(ch).admit(a, 0, 1000),
            Admission::Scheduled { .. }
        ));
        assert_eq!(topo.channel_mut(ch).admit(a, 0, 1000), Admission::QueueFull);
        assert!(matches!(
            topo.channel_mut(ch).admit(b, 0, 1000),
            Admission::Scheduled { .. }
        ));
    }

    #[test]
    fn queue_slot_frees_after_serialization() {
        let (mut topo, ch) = two_node_link(DataRate::from_bps(8_000_000), 0, 1);
        let from = topo.channel(ch).endpoints[0];

        assert!(matches!(
            topo.channel_mut(ch).admit(from, 0, 1000),
            Admission::Scheduled { .. }
        ));
        assert_eq!(topo.channel_mut(ch).admit(from, 0, 1000), Admission::QueueFull);

        topo.channel_mut(ch).tx_complete(from);
        assert_eq!(topo.channel(ch).queued(from), 0);
        assert!(matches!(
            topo.channel_mut(ch).admit(from, 500, 1000),
            Admission::Scheduled { .. }
        ));
    }

    #[test]
    fn node_addr_is_first_assigned() {
        let mut topo = Topology::new();
        let hub = topo.create_node();
        let a = topo.create_node();
        let b = topo.create_node();
        let ch_a = topo.connect(hub, a, DataRate::from_mbps(100), 0, 4);
        let ch_b = topo.connect(hub, b, DataRate::from_mbps(100), 0, 4);

        topo.assign_link(ch_a, Subnet::new(Addr::new(10, 1, 1, 0), 0xFFFF_FF00))
            .unwrap();
        topo.assign_link(ch_b, Subnet::new(Addr::new(10, 1, 2, 0), 0xFFFF_FF00))
            .unwrap();

        assert_eq!(topo.node_addr(hub), Some(Addr::new(10, 1, 1, 1)));
        assert!(topo.is_local_addr(hub, Addr::new(10, 1, 2, 1)));
        assert!(!topo.is_local_addr(a, Addr::new(10, 1, 2, 1)));
    }
}
