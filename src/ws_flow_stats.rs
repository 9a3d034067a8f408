// per-flow counters and the derived report snapshot

use indexmap::IndexMap;

use crate::ws_interface::{FlowKey, SimTime, TraceEvent, TraceSink, NANOS_PER_SEC};

// ============================================================================
// Raw counters
// ============================================================================

/// Counters for one (src, dst, protocol) flow, mutated on every trace event
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowRecord {
    /// Packets handed to the network by the sending application
    pub tx_packets: u64,

    /// Packets delivered to a listening application
    pub rx_packets: u64,

    /// Bytes delivered
    pub rx_bytes: u64,

    /// Sum of (receive_time - send_time) over delivered packets, ns
    pub delay_sum: SimTime,

    /// Packets observed being discarded (queue overflow, dead port)
    pub dropped: u64,
}

/// Collects flow statistics from the simulation's trace events
///
/// Flows appear in the order they are first observed, so reports are stable
/// across identical runs.
#[derive(Default)]
pub struct FlowMonitor {
    flows: IndexMap<FlowKey, FlowRecord>,
}

impl FlowMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flow(&self, key: &FlowKey) -> Option<&FlowRecord> {
        self.flows.get(key)
    }

    pub fn num_flows(&self) -> usize {
        self.flows.len()
    }

    /// Read-only snapshot with derived metrics over `duration`
    ///
    /// Derivations never touch the underlying counters; a snapshot can be
    /// taken mid-run or after the driver stops.
    pub fn snapshot(&self, duration: SimTime) -> FlowReport {
        let duration_s = duration as f64 / NANOS_PER_SEC as f64;

        let flows: Vec<FlowSummary> = self
            .flows
            .iter()
            .map(|(key, rec)| FlowSummary::derive(*key, rec, duration_s))
            .collect();

        let mut totals = FlowRecord::default();
        for rec in self.flows.values() {
            totals.tx_packets += rec.tx_packets;
            totals.rx_packets += rec.rx_packets;
            totals.rx_bytes += rec.rx_bytes;
            totals.delay_sum += rec.delay_sum;
            totals.dropped += rec.dropped;
        }
        let aggregate = FlowSummary::derive(
            FlowKey {
                src: Default::default(),
                dst: Default::default(),
                protocol: 0,
            },
            &totals,
            duration_s,
        );

        FlowReport {
            duration_s,
            flows,
            aggregate,
        }
    }
}

impl TraceSink for FlowMonitor {
    fn record(&mut self, now: SimTime, event: TraceEvent) {
        match event {
            TraceEvent::PacketSent { flow, .. } => {
                self.flows.entry(flow).or_default().tx_packets += 1;
            }
            TraceEvent::PacketReceived {
                flow,
                bytes,
                sent_at,
                ..
            } => {
                let rec = self.flows.entry(flow).or_default();
                rec.rx_packets += 1;
                rec.rx_bytes += bytes as u64;
                rec.delay_sum += now - sent_at;
            }
            TraceEvent::PacketDropped { flow, .. } => {
                self.flows.entry(flow).or_default().dropped += 1;
            }
        }
    }
}

// ============================================================================
// Derived report
// ============================================================================

/// One flow with its derived metrics
#[derive(Debug, Clone)]
pub struct FlowSummary {
    pub key: FlowKey,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub dropped: u64,

    /// rx_bytes * 8 / duration
    pub throughput_bps: f64,

    /// delay_sum / rx_packets, seconds; 0 when nothing was delivered
    pub mean_delay_s: f64,

    /// (tx - rx) / tx; covers drops and packets still queued at stop
    pub loss_rate: f64,
}

impl FlowSummary {
    fn derive(key: FlowKey, rec: &FlowRecord, duration_s: f64) -> Self {
        let throughput_bps = if duration_s > 0.0 {
            rec.rx_bytes as f64 * 8.0 / duration_s
        } else {
            0.0
        };
        let mean_delay_s = if rec.rx_packets > 0 {
            rec.delay_sum as f64 / NANOS_PER_SEC as f64 / rec.rx_packets as f64
        } else {
            0.0
        };
        let loss_rate = if rec.tx_packets > 0 {
            (rec.tx_packets - rec.rx_packets.min(rec.tx_packets)) as f64 / rec.tx_packets as f64
        } else {
            0.0
        };

        Self {
            key,
            tx_packets: rec.tx_packets,
            rx_packets: rec.rx_packets,
            rx_bytes: rec.rx_bytes,
            dropped: rec.dropped,
            throughput_bps,
            mean_delay_s,
            loss_rate,
        }
    }
}

/// Complete read-only report, produced once after the driver stops
#[derive(Debug, Clone)]
pub struct FlowReport {
    pub duration_s: f64,
    pub flows: Vec<FlowSummary>,
    pub aggregate: FlowSummary,
}
