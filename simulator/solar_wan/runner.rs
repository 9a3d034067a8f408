// Solar WAN Scenario Runner

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wan_sim::{
    secs, Addr, DataRate, FlowReport, NodeId, SimError, Simulator, Subnet, Topology,
};

use super::config::{LinkClass, SolarWanConfig, TrafficClass};

/// Port the central station's monitoring server listens on
pub const MONITOR_PORT: u16 = 9;

const MASK_24: u32 = 0xFFFF_FF00;

/// What a finished run hands to the report consumer
pub struct ScenarioOutcome {
    /// Address every site was reporting to
    pub server_addr: Addr,

    /// Remote sites that got a traffic client installed
    pub total_sites: u32,

    /// Read-only flow statistics snapshot
    pub report: FlowReport,
}

/// Builds the WAN topology from a config and runs it to the stop time
///
/// Wiring: the central grid station and the monitoring centre hang off
/// backbone router 0, the three backbone routers form a triangle, schools
/// attach to router 1, clinics to router 2 and community microgrids to
/// router 0. Addressing mirrors the installation plan: 10.1.x/10.2.x for
/// the core, 172.16.x for schools, 172.17.x for clinics, 192.168.x for
/// microgrids.
pub struct SolarWanRunner {
    config: SolarWanConfig,
}

impl SolarWanRunner {
    pub fn new(config: SolarWanConfig) -> Self {
        Self { config }
    }

    /// Run the scenario
    pub fn run(self) -> Result<ScenarioOutcome, SimError> {
        let cfg = &self.config;
        let mut topo = Topology::new();

        // infrastructure nodes
        let central = topo.create_node();
        let monitoring = topo.create_node();
        let routers: Vec<NodeId> = (0..3).map(|_| topo.create_node()).collect();
        let schools: Vec<NodeId> = (0..cfg.sites.schools).map(|_| topo.create_node()).collect();
        let clinics: Vec<NodeId> = (0..cfg.sites.clinics).map(|_| topo.create_node()).collect();
        let microgrids: Vec<NodeId> = (0..cfg.sites.microgrids)
            .map(|_| topo.create_node())
            .collect();

        info!(
            "building WAN: {} schools, {} clinics, {} microgrids",
            cfg.sites.schools, cfg.sites.clinics, cfg.sites.microgrids
        );

        // central station and monitoring centre uplinks
        let uplink = connect(&mut topo, central, routers[0], &cfg.links.backbone);
        let (server_addr, _) =
            topo.assign_link(uplink, Subnet::new(Addr::new(10, 1, 1, 0), MASK_24))?;
        let monitor_link = connect(&mut topo, monitoring, routers[0], &cfg.links.backbone);
        topo.assign_link(monitor_link, Subnet::new(Addr::new(10, 1, 2, 0), MASK_24))?;

        // backbone triangle
        for i in 0..3 {
            let link = connect(
                &mut topo,
                routers[i],
                routers[(i + 1) % 3],
                &cfg.links.backbone,
            );
            topo.assign_link(link, Subnet::new(Addr::new(10, 2, i as u8 + 1, 0), MASK_24))?;
        }

        // site tails: schools on router 1, clinics on router 2, microgrids
        // on router 0
        attach_sites(&mut topo, &schools, routers[1], &cfg.links.remote, [172, 16])?;
        attach_sites(&mut topo, &clinics, routers[2], &cfg.links.remote, [172, 17])?;
        attach_sites(
            &mut topo,
            &microgrids,
            routers[0],
            &cfg.links.microgrid,
            [192, 168],
        )?;

        let mut sim = Simulator::new(topo);
        sim.compute_global_routing();
        sim.install_echo_server(central, MONITOR_PORT)?;

        let mut jitter = Jitter::new(cfg.seed, cfg.start_jitter_s);
        install_clients(&mut sim, &schools, server_addr, &cfg.traffic.school, &mut jitter)?;
        install_clients(&mut sim, &clinics, server_addr, &cfg.traffic.clinic, &mut jitter)?;
        install_clients(
            &mut sim,
            &microgrids,
            server_addr,
            &cfg.traffic.microgrid,
            &mut jitter,
        )?;

        sim.run(cfg.stop_time_s)?;

        Ok(ScenarioOutcome {
            server_addr,
            total_sites: cfg.sites.schools + cfg.sites.clinics + cfg.sites.microgrids,
            report: sim.report(),
        })
    }
}

fn connect(topo: &mut Topology, a: NodeId, b: NodeId, class: &LinkClass) -> wan_sim::ChannelId {
    topo.connect(
        a,
        b,
        DataRate::from_mbps(class.data_rate_mbps),
        secs(class.delay_ms / 1_000.0),
        class.queue_capacity,
    )
}

/// One tail link per site, numbered `prefix.(i+1).0/24`
fn attach_sites(
    topo: &mut Topology,
    sites: &[NodeId],
    router: NodeId,
    class: &LinkClass,
    prefix: [u8; 2],
) -> Result<(), SimError> {
    for (i, &site) in sites.iter().enumerate() {
        let link = connect(topo, site, router, class);
        let subnet = Subnet::new(Addr::new(prefix[0], prefix[1], i as u8 + 1, 0), MASK_24);
        topo.assign_link(link, subnet)?;
    }
    Ok(())
}

fn install_clients(
    sim: &mut Simulator,
    sites: &[NodeId],
    server: Addr,
    class: &TrafficClass,
    jitter: &mut Jitter,
) -> Result<(), SimError> {
    for (i, &site) in sites.iter().enumerate() {
        let start = class.start_s + i as f64 * class.stagger_s + jitter.sample();
        sim.install_echo_client(
            site,
            server,
            MONITOR_PORT,
            class.packet_size,
            class.interval_s,
            class.max_packets,
            start,
        )?;
    }
    Ok(())
}

/// Optional seeded start-time jitter
///
/// With an amplitude of zero the RNG is never constructed, so the default
/// scenario stays byte-for-byte deterministic; with a fixed seed, jittered
/// runs are reproducible.
struct Jitter {
    rng: Option<StdRng>,
    amplitude: f64,
}

impl Jitter {
    fn new(seed: Option<u64>, amplitude: f64) -> Self {
        let rng = (amplitude > 0.0).then(|| match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        });
        Self { rng, amplitude }
    }

    fn sample(&mut self) -> f64 {
        match &mut self.rng {
            Some(rng) => rng.gen_range(0.0..self.amplitude),
            None => 0.0,
        }
    }
}
