// echo traffic applications

use crate::ws_interface::{Addr, NodeId, Packet, Port, SimTime, PROTO_UDP};

/// First source port handed out to clients
pub const CLIENT_PORT_BASE: Port = 49152;

// ============================================================================
// Server
// ============================================================================

/// Echoes every request straight back to its sender
///
/// The reply copies the request's size and sequence number and is sourced
/// from the address the request was sent to, so the round trip stays inside
/// one forward and one reverse flow.
#[derive(Debug, Clone)]
pub struct EchoServer {
    pub node: NodeId,
    pub port: Port,
    pub requests_seen: u64,
}

impl EchoServer {
    pub fn new(node: NodeId, port: Port) -> Self {
        Self {
            node,
            port,
            requests_seen: 0,
        }
    }

    /// Build the echo reply for one received request
    pub fn respond(&mut self, request: &Packet, now: SimTime) -> Packet {
        self.requests_seen += 1;
        request.reversed(now)
    }
}

// ============================================================================
// Client
// ============================================================================

/// Periodic fixed-size datagram source
///
/// Sends from `start_s`, then every `interval_s`, until `max_packets` have
/// gone out or the driver reaches its stop time, whichever comes first.
#[derive(Debug, Clone)]
pub struct EchoClient {
    pub node: NodeId,
    pub target: Addr,
    pub target_port: Port,
    pub src_port: Port,
    pub packet_size: u32,
    pub interval_s: f64,
    pub max_packets: u64,
    pub start_s: f64,

    pub sent: u64,
    pub echoes_received: u64,
}

impl EchoClient {
    pub fn new(
        node: NodeId,
        target: Addr,
        target_port: Port,
        src_port: Port,
        packet_size: u32,
        interval_s: f64,
        max_packets: u64,
        start_s: f64,
    ) -> Self {
        Self {
            node,
            target,
            target_port,
            src_port,
            packet_size,
            interval_s,
            max_packets,
            start_s,
            sent: 0,
            echoes_received: 0,
        }
    }

    pub fn finished(&self) -> bool {
        self.sent >= self.max_packets
    }

    /// Construct the next outgoing datagram, consuming one send slot
    pub fn next_packet(&mut self, src: Addr, now: SimTime) -> Packet {
        let seq = self.sent;
        self.sent += 1;
        Packet {
            size: self.packet_size,
            src,
            dst: self.target,
            src_port: self.src_port,
            dst_port: self.target_port,
            protocol: PROTO_UDP,
            seq,
            sent_at: now,
        }
    }
}

// ============================================================================
// Application registry entry
// ============================================================================

/// Either role, as installed on a node
pub enum App {
    Server(EchoServer),
    Client(EchoClient),
}

impl App {
    pub fn node(&self) -> NodeId {
        match self {
            App::Server(s) => s.node,
            App::Client(c) => c.node,
        }
    }

    /// The local port this application listens on
    pub fn port(&self) -> Port {
        match self {
            App::Server(s) => s.port,
            App::Client(c) => c.src_port,
        }
    }
}
