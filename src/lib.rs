//! # wansim - Discrete-Event Point-to-Point Network Simulation
//!
//! A Rust implementation of a minimal discrete-event network simulator:
//! a virtual clock over a deterministic event queue, point-to-point channels
//! with serialization and propagation delay, static hop-count routing, echo
//! traffic applications and per-flow statistics.
//!
//! ## Core Components
//!
//! - **EventQueue / SimClock**: time-ordered scheduling with deterministic
//!   FIFO tie-breaking and a hard stop-time cutoff
//! - **Topology**: nodes, interfaces and point-to-point channels with
//!   per-direction wire occupancy and bounded device queues
//! - **RoutingTable**: one-shot global shortest-path computation over the
//!   static topology
//! - **EchoServer / EchoClient**: request-response traffic generators
//! - **FlowMonitor**: per-flow tx/rx/delay counters with derived throughput,
//!   delay and loss metrics
//!
//! ## Usage
//!
//! Build a [`Topology`], wire links with [`Topology::connect`], number them
//! with [`Topology::assign_link`], then hand it to a [`Simulator`]:
//!
//! ```no_run
//! use wan_sim::{Addr, DataRate, Simulator, Subnet, Topology};
//!
//! let mut topo = Topology::new();
//! let client = topo.create_node();
//! let server = topo.create_node();
//! let link = topo.connect(client, server, DataRate::from_mbps(10), 5_000_000, 100);
//! let (_, server_addr) = topo
//!     .assign_link(link, Subnet::new(Addr::new(10, 1, 1, 0), 0xFFFF_FF00))
//!     .unwrap();
//!
//! let mut sim = Simulator::new(topo);
//! sim.compute_global_routing();
//! sim.install_echo_server(server, 9).unwrap();
//! sim.install_echo_client(client, server_addr, 9, 128, 0.8, 80, 1.0)
//!     .unwrap();
//! sim.run(30.0).unwrap();
//! let report = sim.report();
//! ```
//!
//! ## Scenarios
//!
//! For ready-made topologies driven from YAML files, see the scenario
//! runner in `simulator/`. It builds the solar-energy WAN monitoring
//! scenario on top of this library.

// Core simulation modules
pub mod ws_interface;
pub mod ws_event_queue;
pub mod ws_driver;
pub mod ws_topology;
pub mod ws_routing;
pub mod ws_apps;
pub mod ws_flow_stats;
pub mod ws_sim;

// Re-export commonly used types
pub use ws_apps::{EchoClient, EchoServer, CLIENT_PORT_BASE};
pub use ws_driver::{RunState, SimClock};
pub use ws_event_queue::{EventHandle, EventQueue};
pub use ws_flow_stats::{FlowMonitor, FlowRecord, FlowReport, FlowSummary};
pub use ws_interface::{
    secs, Addr, AppId, ChannelId, DataRate, DropReason, FlowKey, InterfaceId, NoOpSink, NodeId,
    Packet, Port, SimError, SimTime, Subnet, TraceEvent, TraceSink, NANOS_PER_SEC, PROTO_UDP,
};
pub use ws_routing::{RoutingEntry, RoutingTable};
pub use ws_sim::Simulator;
pub use ws_topology::{Admission, Channel, Interface, Node, Topology, DEFAULT_QUEUE_CAPACITY};
