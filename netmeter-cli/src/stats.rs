//! Measurement report display and formatting

use netmeter_protocol::{MeasurementKind, MetricsReport};

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format bandwidth in human-readable form
pub fn format_bandwidth(bps: f64) -> String {
    const KBPS: f64 = 1000.0;
    const MBPS: f64 = KBPS * 1000.0;
    const GBPS: f64 = MBPS * 1000.0;

    if bps >= GBPS {
        format!("{:.2} Gbps", bps / GBPS)
    } else if bps >= MBPS {
        format!("{:.2} Mbps", bps / MBPS)
    } else if bps >= KBPS {
        format!("{:.2} Kbps", bps / KBPS)
    } else {
        format!("{:.0} bps", bps)
    }
}

/// Format RTT in human-readable form
pub fn format_rtt(rtt_us: u64) -> String {
    if rtt_us >= 1_000_000 {
        format!("{:.2}s", rtt_us as f64 / 1_000_000.0)
    } else if rtt_us >= 1_000 {
        format!("{:.2}ms", rtt_us as f64 / 1_000.0)
    } else {
        format!("{}µs", rtt_us)
    }
}

/// Display the per-probe samples and the summary of one run.
pub fn display_report(report: &MetricsReport) {
    for probe in &report.probes {
        match report.kind {
            MeasurementKind::Rtt => {
                println!(
                    "probe {:>4}  rtt {:>12}",
                    probe.sequence,
                    format_rtt(probe.rtt_micros)
                );
            }
            MeasurementKind::Tput => {
                println!(
                    "probe {:>4}  rtt {:>12}  throughput {:>14}",
                    probe.sequence,
                    format_rtt(probe.rtt_micros),
                    format_bandwidth(probe.throughput_bps.unwrap_or(0.0))
                );
            }
        }
    }

    println!("┌─────────────────────────────────────────────┐");
    println!("│ MEASUREMENT SUMMARY                         │");
    println!("├─────────────────────────────────────────────┤");
    println!("│ Probes: {:<36}│", report.probes.len());
    match report.kind {
        MeasurementKind::Rtt => {
            let min = report.min_rtt_micros.map_or("N/A".to_string(), format_rtt);
            let max = report.max_rtt_micros.map_or("N/A".to_string(), format_rtt);
            let mean = report
                .mean_rtt_micros
                .map_or("N/A".to_string(), |us| format_rtt(us as u64));
            println!("│ RTT min:  {:<34}│", min);
            println!("│ RTT mean: {:<34}│", mean);
            println!("│ RTT max:  {:<34}│", max);
        }
        MeasurementKind::Tput => {
            let mean = report
                .mean_throughput_bps
                .map_or("N/A".to_string(), format_bandwidth);
            println!("│ Throughput mean: {:<27}│", mean);
        }
    }
    println!("└─────────────────────────────────────────────┘");
}
