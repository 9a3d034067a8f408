// Solar WAN Scenario Module

pub mod config;
pub mod runner;

// Re-export commonly used types
pub use config::{
    LinkClass,
    LinkClasses,
    SiteCounts,
    SolarWanConfig,
    TrafficClass,
    TrafficClasses,
};

pub use runner::{ScenarioOutcome, SolarWanRunner, MONITOR_PORT};
