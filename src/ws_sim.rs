// the simulator: clock + topology + routing + applications + statistics

use hashbrown::HashMap;
use log::{debug, info};

use crate::ws_apps::{App, EchoClient, EchoServer, CLIENT_PORT_BASE};
use crate::ws_driver::{RunState, SimClock};
use crate::ws_flow_stats::{FlowMonitor, FlowReport};
use crate::ws_interface::{
    secs, Addr, AppId, ChannelId, DropReason, InterfaceId, NodeId, Packet, Port, SimError,
    SimTime, TraceEvent, TraceSink,
};
use crate::ws_routing::RoutingTable;
use crate::ws_topology::{Admission, Topology};

/// Everything the driver loop dispatches
///
/// Single-threaded cooperative model: handling one of these may schedule
/// more of them, never block, never run concurrently with another.
enum SimEvent {
    /// A client application emits its next datagram
    ClientSend { app: AppId },

    /// A packet finished serializing out of an interface; frees the queue
    /// slot in that channel direction
    TxComplete {
        channel: ChannelId,
        from: InterfaceId,
    },

    /// A packet arrives at an interface after propagation
    Deliver { iface: InterfaceId, packet: Packet },
}

/// A complete simulation instance
///
/// Build the topology first, hand it over, compute routing, install the
/// applications, then `run`. The instance is single-shot: after the driver
/// reaches its stop time the state is terminal and a fresh scenario needs a
/// fresh `Simulator`.
pub struct Simulator {
    clock: SimClock<SimEvent>,
    topo: Topology,
    routes: Option<RoutingTable>,
    apps: Vec<App>,
    bindings: HashMap<(NodeId, Port), AppId>,
    monitor: FlowMonitor,
    extra_sink: Option<Box<dyn TraceSink>>,
    next_client_port: Port,
}

impl Simulator {
    pub fn new(topo: Topology) -> Self {
        Self {
            clock: SimClock::new(),
            topo,
            routes: None,
            apps: Vec::new(),
            bindings: HashMap::new(),
            monitor: FlowMonitor::new(),
            extra_sink: None,
            next_client_port: CLIENT_PORT_BASE,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    pub fn state(&self) -> RunState {
        self.clock.state()
    }

    /// Attach an additional trace sink beside the built-in flow monitor
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.extra_sink = Some(sink);
    }

    /// One-shot shortest-path computation over the finished topology
    ///
    /// Call after every channel is connected and every address assigned;
    /// tables are immutable for the rest of the run.
    pub fn compute_global_routing(&mut self) {
        self.routes = Some(RoutingTable::compute_global(&self.topo));
        info!(
            "global routing computed for {} nodes",
            self.topo.nodes().len()
        );
    }

    fn routes(&self) -> Result<&RoutingTable, SimError> {
        // resolving before the one-shot computation means nothing is
        // reachable yet
        self.routes.as_ref().ok_or(SimError::NoRoute)
    }

    /// Bind an echo server to a node port
    pub fn install_echo_server(&mut self, node: NodeId, port: Port) -> Result<AppId, SimError> {
        let app = self.apps.len() as AppId;
        self.bind(node, port, app)?;
        self.apps.push(App::Server(EchoServer::new(node, port)));
        debug!("echo server on node {} port {}", node, port);
        Ok(app)
    }

    /// Install a periodic echo client and schedule its first send
    ///
    /// The target must already be resolvable from `node`, so a malformed
    /// scenario fails here, synchronously, not mid-run.
    pub fn install_echo_client(
        &mut self,
        node: NodeId,
        target: Addr,
        target_port: Port,
        packet_size: u32,
        interval_s: f64,
        max_packets: u64,
        start_s: f64,
    ) -> Result<AppId, SimError> {
        // validate the whole schedule up front so a failed install leaves
        // no half-registered application behind
        if !interval_s.is_finite() || interval_s < 0.0 {
            return Err(SimError::InvalidSchedule);
        }
        if !start_s.is_finite() || start_s < 0.0 {
            return Err(SimError::InvalidSchedule);
        }
        self.routes()?.resolve(node, target)?;
        // a client must have a source address to be part of a flow
        self.topo.node_addr(node).ok_or(SimError::NoRoute)?;

        let src_port = self.next_client_port;
        self.next_client_port += 1;

        let app = self.apps.len() as AppId;
        self.bind(node, src_port, app)?;
        self.apps.push(App::Client(EchoClient::new(
            node,
            target,
            target_port,
            src_port,
            packet_size,
            interval_s,
            max_packets,
            start_s,
        )));
        self.clock.schedule_in(start_s, SimEvent::ClientSend { app })?;
        debug!(
            "echo client on node {} -> {}:{} every {}s, {} packets from t={}s",
            node, target, target_port, interval_s, max_packets, start_s
        );
        Ok(app)
    }

    fn bind(&mut self, node: NodeId, port: Port, app: AppId) -> Result<(), SimError> {
        if self.bindings.insert((node, port), app).is_some() {
            return Err(SimError::DuplicateAssignment);
        }
        Ok(())
    }

    /// Client state, for result inspection after the run
    pub fn client(&self, app: AppId) -> Option<&EchoClient> {
        match self.apps.get(app as usize) {
            Some(App::Client(c)) => Some(c),
            _ => None,
        }
    }

    /// Server state, for result inspection after the run
    pub fn server(&self, app: AppId) -> Option<&EchoServer> {
        match self.apps.get(app as usize) {
            Some(App::Server(s)) => Some(s),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Driver loop
    // ------------------------------------------------------------------

    /// Dispatch events until the next one would pass `stop_s` seconds
    ///
    /// Events timed exactly at the stop time still execute; everything later
    /// is discarded and the state is terminally Stopped. The loop only fails
    /// on the configuration errors of `SimError`; packet loss is not one.
    pub fn run(&mut self, stop_s: f64) -> Result<(), SimError> {
        if !stop_s.is_finite() || stop_s < 0.0 {
            return Err(SimError::InvalidSchedule);
        }
        let stop = secs(stop_s);
        info!("run until t={}s", stop_s);

        while let Some((_, event)) = self.clock.step(stop) {
            self.dispatch(event)?;
        }

        info!(
            "stopped at t={}s, {} flows observed",
            stop_s,
            self.monitor.num_flows()
        );
        Ok(())
    }

    fn dispatch(&mut self, event: SimEvent) -> Result<(), SimError> {
        match event {
            SimEvent::ClientSend { app } => self.client_send(app),
            SimEvent::TxComplete { channel, from } => {
                self.topo.channel_mut(channel).tx_complete(from);
                Ok(())
            }
            SimEvent::Deliver { iface, packet } => self.deliver(iface, packet),
        }
    }

    fn client_send(&mut self, app: AppId) -> Result<(), SimError> {
        let now = self.clock.now();

        let (packet, node, interval_s, more) = {
            let App::Client(client) = &mut self.apps[app as usize] else {
                return Ok(());
            };
            if client.finished() {
                return Ok(());
            }
            let src = self
                .topo
                .node_addr(client.node)
                .expect("validated at install");
            let packet = client.next_packet(src, now);
            (packet, client.node, client.interval_s, !client.finished())
        };

        self.emit(TraceEvent::PacketSent {
            flow: packet.flow(),
            bytes: packet.size,
            seq: packet.seq,
        });
        self.transmit(node, packet)?;

        if more {
            self.clock
                .schedule_in(interval_s, SimEvent::ClientSend { app })?;
        }
        Ok(())
    }

    /// Hand a packet to the outgoing interface `node` routes it through
    ///
    /// Queue overflow is the modeled loss path: the packet is counted and
    /// forgotten, never an error.
    fn transmit(&mut self, node: NodeId, packet: Packet) -> Result<(), SimError> {
        let out = self.routes()?.resolve(node, packet.dst)?;
        let channel_id = self.topo.iface(out).channel;
        let now = self.clock.now();

        match self.topo.channel_mut(channel_id).admit(out, now, packet.size) {
            Admission::Scheduled {
                serialized_at,
                delivered_at,
            } => {
                let peer = self.topo.channel(channel_id).peer_of(out);
                self.clock.schedule_at(
                    serialized_at,
                    SimEvent::TxComplete {
                        channel: channel_id,
                        from: out,
                    },
                )?;
                self.clock
                    .schedule_at(delivered_at, SimEvent::Deliver { iface: peer, packet })?;
            }
            Admission::QueueFull => {
                self.emit(TraceEvent::PacketDropped {
                    flow: packet.flow(),
                    bytes: packet.size,
                    reason: DropReason::QueueOverflow,
                });
            }
        }
        Ok(())
    }

    fn deliver(&mut self, iface: InterfaceId, packet: Packet) -> Result<(), SimError> {
        let node = self.topo.iface(iface).node;

        if !self.topo.is_local_addr(node, packet.dst) {
            // transit: store-and-forward toward the destination
            return self.transmit(node, packet);
        }

        let now = self.clock.now();
        let Some(&app) = self.bindings.get(&(node, packet.dst_port)) else {
            // nothing listening: silently dropped, counted as lost
            self.emit(TraceEvent::PacketDropped {
                flow: packet.flow(),
                bytes: packet.size,
                reason: DropReason::NoListener,
            });
            return Ok(());
        };

        self.emit(TraceEvent::PacketReceived {
            flow: packet.flow(),
            bytes: packet.size,
            seq: packet.seq,
            sent_at: packet.sent_at,
        });

        let reply = match &mut self.apps[app as usize] {
            App::Server(server) => Some(server.respond(&packet, now)),
            App::Client(client) => {
                client.echoes_received += 1;
                None
            }
        };

        if let Some(reply) = reply {
            self.emit(TraceEvent::PacketSent {
                flow: reply.flow(),
                bytes: reply.size,
                seq: reply.seq,
            });
            self.transmit(node, reply)?;
        }
        Ok(())
    }

    fn emit(&mut self, event: TraceEvent) {
        let now = self.clock.now();
        self.monitor.record(now, event);
        if let Some(sink) = &mut self.extra_sink {
            sink.record(now, event);
        }
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    /// Read-only flow statistics over the elapsed simulated time
    pub fn report(&self) -> FlowReport {
        self.monitor.snapshot(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws_interface::{DataRate, FlowKey, Subnet, NANOS_PER_SEC, PROTO_UDP};
    use crate::ws_topology::DEFAULT_QUEUE_CAPACITY;

    const MASK_24: u32 = 0xFFFF_FF00;
    const PORT: Port = 9;

    /// client ---- server over one link
    fn single_link(rate: DataRate, delay: SimTime) -> (Simulator, Addr) {
        let mut topo = Topology::new();
        let client = topo.create_node();
        let server = topo.create_node();
        let ch = topo.connect(client, server, rate, delay, DEFAULT_QUEUE_CAPACITY);
        let (_, server_addr) = topo
            .assign_link(ch, Subnet::new(Addr::new(10, 1, 1, 0), MASK_24))
            .unwrap();

        let mut sim = Simulator::new(topo);
        sim.compute_global_routing();
        sim.install_echo_server(server, PORT).unwrap();
        (sim, server_addr)
    }

    #[test]
    fn round_trip_echoes_every_packet() {
        let (mut sim, server_addr) = single_link(DataRate::from_mbps(10), 5_000_000);
        let client = sim
            .install_echo_client(0, server_addr, PORT, 128, 0.1, 5, 1.0)
            .unwrap();

        sim.run(30.0).unwrap();

        assert_eq!(sim.client(client).unwrap().sent, 5);
        assert_eq!(sim.client(client).unwrap().echoes_received, 5);

        let report = sim.report();
        let forward = FlowKey {
            src: Addr::new(10, 1, 1, 1),
            dst: server_addr,
            protocol: PROTO_UDP,
        };
        let reverse = FlowKey {
            src: server_addr,
            dst: Addr::new(10, 1, 1, 1),
            protocol: PROTO_UDP,
        };
        let fwd = report.flows.iter().find(|f| f.key == forward).unwrap();
        let rev = report.flows.iter().find(|f| f.key == reverse).unwrap();
        assert_eq!((fwd.tx_packets, fwd.rx_packets), (5, 5));
        assert_eq!((rev.tx_packets, rev.rx_packets), (5, 5));
        assert_eq!(fwd.loss_rate, 0.0);
    }

    #[test]
    fn uncongested_delay_is_serialization_plus_propagation() {
        // 10 Mbps, 5 ms, 128 byte packets: one-way 102.4 us + 5 ms exactly
        let (mut sim, server_addr) = single_link(DataRate::from_mbps(10), 5_000_000);
        let client = sim
            .install_echo_client(0, server_addr, PORT, 128, 0.8, 80, 1.0)
            .unwrap();

        sim.run(70.0).unwrap();

        // last send at 1.0 + 79 * 0.8 = 64.2s, well inside the run
        assert_eq!(sim.client(client).unwrap().sent, 80);
        assert_eq!(sim.client(client).unwrap().echoes_received, 80);

        let report = sim.report();
        let one_way = (102_400 + 5_000_000) as f64 / NANOS_PER_SEC as f64;
        for flow in &report.flows {
            assert_eq!(flow.tx_packets, 80);
            assert_eq!(flow.rx_packets, 80);
            assert!(
                (flow.mean_delay_s - one_way).abs() < 1e-12,
                "mean delay {} != {}",
                flow.mean_delay_s,
                one_way
            );
        }
    }

    #[test]
    fn stop_time_caps_the_send_schedule() {
        let (mut sim, server_addr) = single_link(DataRate::from_mbps(10), 5_000_000);
        let client = sim
            .install_echo_client(0, server_addr, PORT, 128, 0.8, 80, 1.0)
            .unwrap();

        sim.run(30.0).unwrap();

        // sends at 1.0 + k * 0.8 for k = 0..=36 fit inside 30s
        let sent = sim.client(client).unwrap().sent;
        assert_eq!(sent, 37);
        // no congestion at this rate: everything sent comes back
        assert_eq!(sim.client(client).unwrap().echoes_received, sent);
        assert_eq!(sim.state(), RunState::Stopped);
    }

    #[test]
    fn delivery_exactly_at_stop_time_counts() {
        // 125 bytes at 1 Mbps serializes in exactly 1 ms; with 999 ms of
        // propagation a packet sent at t=1s lands exactly at t=2s
        let (mut sim, server_addr) = single_link(DataRate::from_mbps(1), 999_000_000);
        sim.install_echo_client(0, server_addr, PORT, 125, 1.0, 1, 1.0)
            .unwrap();

        sim.run(2.0).unwrap();

        let report = sim.report();
        let fwd = &report.flows[0];
        assert_eq!((fwd.tx_packets, fwd.rx_packets), (1, 1));
    }

    #[test]
    fn delivery_just_past_stop_time_is_discarded() {
        // one nanosecond more propagation and the same packet misses the cut
        let (mut sim, server_addr) = single_link(DataRate::from_mbps(1), 999_000_001);
        sim.install_echo_client(0, server_addr, PORT, 125, 1.0, 1, 1.0)
            .unwrap();

        sim.run(2.0).unwrap();

        let report = sim.report();
        let fwd = &report.flows[0];
        assert_eq!((fwd.tx_packets, fwd.rx_packets), (1, 0));
        assert_eq!(fwd.loss_rate, 1.0);
    }

    #[test]
    fn overload_on_a_shared_channel_loses_packets() {
        // two hosts behind a router, both flooding a 100 kbps bottleneck
        let mut topo = Topology::new();
        let h1 = topo.create_node();
        let h2 = topo.create_node();
        let router = topo.create_node();
        let server = topo.create_node();

        let fast = DataRate::from_mbps(100);
        let ch1 = topo.connect(h1, router, fast, 1_000_000, DEFAULT_QUEUE_CAPACITY);
        let ch2 = topo.connect(h2, router, fast, 1_000_000, DEFAULT_QUEUE_CAPACITY);
        // small queue so congestion turns into drops quickly
        let bottleneck = topo.connect(router, server, DataRate::from_kbps(100), 1_000_000, 10);

        topo.assign_link(ch1, Subnet::new(Addr::new(172, 16, 1, 0), MASK_24))
            .unwrap();
        topo.assign_link(ch2, Subnet::new(Addr::new(172, 16, 2, 0), MASK_24))
            .unwrap();
        let (_, server_addr) = topo
            .assign_link(bottleneck, Subnet::new(Addr::new(10, 1, 1, 0), MASK_24))
            .unwrap();

        let mut sim = Simulator::new(topo);
        sim.compute_global_routing();
        sim.install_echo_server(server, PORT).unwrap();
        // each offers 512 * 8 / 0.05s = 82 kbps; together they exceed 100 kbps
        let c1 = sim
            .install_echo_client(h1, server_addr, PORT, 512, 0.05, 200, 1.0)
            .unwrap();
        let c2 = sim
            .install_echo_client(h2, server_addr, PORT, 512, 0.05, 200, 1.0)
            .unwrap();

        sim.run(60.0).unwrap();

        let report = sim.report();
        assert_eq!(sim.client(c1).unwrap().sent, 200);
        assert_eq!(sim.client(c2).unwrap().sent, 200);
        assert!(
            report.aggregate.rx_packets < report.aggregate.tx_packets,
            "expected loss under overload"
        );
        assert!(report.aggregate.dropped > 0);
        // at least one of the two forward flows saw loss
        let lossy = report
            .flows
            .iter()
            .any(|f| f.key.dst == server_addr && f.rx_packets < f.tx_packets);
        assert!(lossy);
    }

    #[test]
    fn dead_port_drops_are_counted_not_raised() {
        let (mut sim, server_addr) = single_link(DataRate::from_mbps(10), 1_000_000);
        // port 10 has no listener
        sim.install_echo_client(0, server_addr, 10, 64, 0.5, 4, 0.5)
            .unwrap();

        sim.run(10.0).unwrap();

        let report = sim.report();
        let fwd = &report.flows[0];
        assert_eq!(fwd.tx_packets, 4);
        assert_eq!(fwd.rx_packets, 0);
        assert_eq!(fwd.dropped, 4);
        assert_eq!(fwd.loss_rate, 1.0);
    }

    #[test]
    fn unreachable_target_fails_at_install() {
        let (mut sim, _) = single_link(DataRate::from_mbps(10), 1_000_000);
        let err = sim
            .install_echo_client(0, Addr::new(192, 168, 9, 1), PORT, 64, 0.5, 1, 0.0)
            .unwrap_err();
        assert_eq!(err, SimError::NoRoute);
    }

    #[test]
    fn double_binding_a_port_is_rejected() {
        let (mut sim, _) = single_link(DataRate::from_mbps(10), 1_000_000);
        let err = sim.install_echo_server(1, PORT).unwrap_err();
        assert_eq!(err, SimError::DuplicateAssignment);
    }

    #[test]
    fn stopped_simulator_stays_stopped() {
        let (mut sim, server_addr) = single_link(DataRate::from_mbps(10), 1_000_000);
        let client = sim
            .install_echo_client(0, server_addr, PORT, 64, 0.5, 2, 0.5)
            .unwrap();
        sim.run(10.0).unwrap();
        let sent = sim.client(client).unwrap().sent;

        // a second run dispatches nothing further
        sim.run(20.0).unwrap();
        assert_eq!(sim.client(client).unwrap().sent, sent);
        assert_eq!(sim.state(), RunState::Stopped);
    }
}
