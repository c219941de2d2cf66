//! Netmeter CLI Library
//!
//! Shared functionality for the netmeter command-line tools.

pub mod config;
pub mod stats;

pub use config::{ClientConfig, Config, ConfigError, ServerConfig};
pub use stats::{display_report, format_bandwidth, format_bytes, format_rtt};
