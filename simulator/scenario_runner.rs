// Scenario Runner - Load and execute scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/solar_wan.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)

mod solar_wan;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use simple_logger::SimpleLogger;

use solar_wan::{SolarWanConfig, SolarWanRunner};

fn main() {
    SimpleLogger::new().init().unwrap();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <scenario.yaml | directory/>", args[0]);
        eprintln!("\nExamples:");
        eprintln!("  {} scenarios/solar_wan.yaml", args[0]);
        eprintln!("  {} scenarios/", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    if path.is_file() {
        run_scenario_file(path);
    } else if path.is_dir() {
        run_scenario_directory(path);
    } else {
        eprintln!("Error: Path does not exist: {}", path.display());
        std::process::exit(1);
    }
}

fn run_scenario_directory(dir: &Path) {
    let mut scenarios: Vec<PathBuf> = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("yaml")
                || path.extension().and_then(|s| s.to_str()) == Some("yml")
            {
                scenarios.push(path);
            }
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        eprintln!("No .yaml files found in {}", dir.display());
        std::process::exit(1);
    }

    info!("found {} scenario(s) to run", scenarios.len());
    for (i, scenario_path) in scenarios.iter().enumerate() {
        info!(
            "{}/{} running {}",
            i + 1,
            scenarios.len(),
            scenario_path.display()
        );
        run_scenario_file(scenario_path);
    }
}

fn run_scenario_file(path: &Path) {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("Error reading {}: {}", path.display(), err);
            std::process::exit(1);
        }
    };

    let config: SolarWanConfig = match serde_yaml::from_str(&text) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error parsing {}: {}", path.display(), err);
            std::process::exit(1);
        }
    };

    info!(
        "scenario {}: {} schools, {} clinics, {} microgrids, stop at {}s",
        path.display(),
        config.sites.schools,
        config.sites.clinics,
        config.sites.microgrids,
        config.stop_time_s
    );

    let outcome = match SolarWanRunner::new(config).run() {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("Error: malformed scenario {}: {:?}", path.display(), err);
            std::process::exit(1);
        }
    };

    for flow in &outcome.report.flows {
        debug!(
            "flow {} -> {}: tx {} rx {} bytes {} mean delay {:.6}s loss {:.4}",
            flow.key.src,
            flow.key.dst,
            flow.tx_packets,
            flow.rx_packets,
            flow.rx_bytes,
            flow.mean_delay_s,
            flow.loss_rate
        );
    }

    let agg = &outcome.report.aggregate;
    info!(
        "done: {} sites reporting to {}, {} flows",
        outcome.total_sites,
        outcome.server_addr,
        outcome.report.flows.len()
    );
    info!(
        "totals: tx {} rx {} lost {} ({:.2}%), throughput {:.1} kbps, mean delay {:.3} ms",
        agg.tx_packets,
        agg.rx_packets,
        agg.tx_packets - agg.rx_packets,
        agg.loss_rate * 100.0,
        agg.throughput_bps / 1_000.0,
        agg.mean_delay_s * 1_000.0
    );
}
