// Solar WAN Scenario Configuration

use serde::Deserialize;

// ============================================================================
// Main Configuration
// ============================================================================

/// Main configuration for the solar-energy WAN monitoring scenario
///
/// Defaults reproduce the reference installation: five schools and three
/// clinics on a three-router backbone, four community microgrids, thirty
/// simulated seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolarWanConfig {
    /// How many of each remote site class to build
    pub sites: SiteCounts,

    /// Link parameters per link class
    pub links: LinkClasses,

    /// Traffic parameters per site class
    pub traffic: TrafficClasses,

    /// Simulation stop time (seconds)
    pub stop_time_s: f64,

    /// Random seed for reproducible start jitter
    pub seed: Option<u64>,

    /// Extra uniform jitter added to each client's start time (seconds);
    /// zero keeps the run fully deterministic without consulting the RNG
    pub start_jitter_s: f64,
}

// ============================================================================
// Topology Sizing
// ============================================================================

/// Remote site counts; the central station, monitoring centre and the
/// three backbone routers are always built
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteCounts {
    pub schools: u32,
    pub clinics: u32,
    pub microgrids: u32,
}

// ============================================================================
// Link Classes
// ============================================================================

/// Parameters of one point-to-point link class
#[derive(Debug, Clone, Deserialize)]
pub struct LinkClass {
    pub data_rate_mbps: u64,
    pub delay_ms: f64,

    /// Device queue depth per direction, in packets
    pub queue_capacity: usize,
}

/// The three link classes of the WAN
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkClasses {
    /// Core mesh plus the central-station and monitoring-centre uplinks
    pub backbone: LinkClass,

    /// School and clinic tails to their edge routers
    pub remote: LinkClass,

    /// Community microgrid tails
    pub microgrid: LinkClass,
}

// ============================================================================
// Traffic Classes
// ============================================================================

/// Echo-client parameters for one site class
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficClass {
    /// Payload bytes per datagram
    pub packet_size: u32,

    /// Send period (seconds)
    pub interval_s: f64,

    /// Budget per client
    pub max_packets: u64,

    /// First send of the first site (seconds)
    pub start_s: f64,

    /// Each further site of the class starts this much later, spreading
    /// the load instead of synchronizing it
    pub stagger_s: f64,
}

/// Per-site-class traffic shapes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrafficClasses {
    pub school: TrafficClass,
    pub clinic: TrafficClass,
    pub microgrid: TrafficClass,
}

// ============================================================================
// Default Implementations
// ============================================================================

impl Default for SolarWanConfig {
    fn default() -> Self {
        Self {
            sites: SiteCounts::default(),
            links: LinkClasses::default(),
            traffic: TrafficClasses::default(),
            stop_time_s: 30.0,
            seed: None,
            start_jitter_s: 0.0,
        }
    }
}

impl Default for SiteCounts {
    fn default() -> Self {
        Self {
            schools: 5,
            clinics: 3,
            microgrids: 4,
        }
    }
}

impl LinkClass {
    pub fn backbone() -> Self {
        Self {
            data_rate_mbps: 100,
            delay_ms: 10.0,
            queue_capacity: 100,
        }
    }

    pub fn remote() -> Self {
        Self {
            data_rate_mbps: 50,
            delay_ms: 20.0,
            queue_capacity: 100,
        }
    }

    pub fn microgrid() -> Self {
        Self {
            data_rate_mbps: 10,
            delay_ms: 5.0,
            queue_capacity: 100,
        }
    }
}

impl Default for LinkClasses {
    fn default() -> Self {
        Self {
            backbone: LinkClass::backbone(),
            remote: LinkClass::remote(),
            microgrid: LinkClass::microgrid(),
        }
    }
}

impl Default for TrafficClasses {
    fn default() -> Self {
        Self {
            // schools report usage data at a relaxed pace
            school: TrafficClass {
                packet_size: 256,
                interval_s: 0.5,
                max_packets: 100,
                start_s: 2.0,
                stagger_s: 0.3,
            },
            // clinics send larger, more frequent health-facility data
            clinic: TrafficClass {
                packet_size: 512,
                interval_s: 0.3,
                max_packets: 150,
                start_s: 1.5,
                stagger_s: 0.2,
            },
            // microgrids push small production/consumption readings
            microgrid: TrafficClass {
                packet_size: 128,
                interval_s: 0.8,
                max_packets: 80,
                start_s: 3.0,
                stagger_s: 0.4,
            },
        }
    }
}
