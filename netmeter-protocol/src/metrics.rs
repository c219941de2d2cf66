//! Probe Timing Samples and Derived Statistics
//!
//! The client feeds one elapsed time per completed probe into a
//! [`MetricsAccumulator`]; the accumulator derives per-probe RTT or
//! throughput and the summary the operator sees.

use crate::message::MeasurementKind;
use std::time::Duration;

/// One completed probe, in sequence order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    /// 1-indexed probe sequence.
    pub sequence: u32,
    /// Round-trip time in microseconds.
    pub rtt_micros: u64,
    /// Bits per second. Present only in throughput mode.
    pub throughput_bps: Option<f64>,
}

/// Collects probe samples for one session.
#[derive(Debug, Clone)]
pub struct MetricsAccumulator {
    kind: MeasurementKind,
    results: Vec<ProbeResult>,
}

impl MetricsAccumulator {
    pub fn new(kind: MeasurementKind) -> Self {
        MetricsAccumulator {
            kind,
            results: Vec::new(),
        }
    }

    /// Record the elapsed round trip of the next probe.
    pub fn record(&mut self, sequence: u32, payload_size: usize, elapsed: Duration) -> ProbeResult {
        debug_assert_eq!(
            sequence,
            self.results.len() as u32 + 1,
            "probe results arrive in sequence order without gaps"
        );
        let throughput_bps = match self.kind {
            MeasurementKind::Rtt => None,
            MeasurementKind::Tput => {
                // A clock tick of zero width would divide by zero.
                let secs = elapsed.max(Duration::from_nanos(1)).as_secs_f64();
                Some(payload_size as f64 * 8.0 / secs)
            }
        };
        let result = ProbeResult {
            sequence,
            rtt_micros: elapsed.as_micros() as u64,
            throughput_bps,
        };
        self.results.push(result);
        result
    }

    pub fn kind(&self) -> MeasurementKind {
        self.kind
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Per-probe RTT list, in sequence order.
    pub fn rtt_micros(&self) -> Vec<u64> {
        self.results.iter().map(|r| r.rtt_micros).collect()
    }

    /// Per-probe throughput list, in sequence order. Empty in RTT mode.
    pub fn throughput_bps(&self) -> Vec<f64> {
        self.results
            .iter()
            .filter_map(|r| r.throughput_bps)
            .collect()
    }

    /// Arithmetic mean RTT over all collected probes.
    pub fn mean_rtt_micros(&self) -> Option<f64> {
        if self.results.is_empty() {
            return None;
        }
        let sum: u64 = self.results.iter().map(|r| r.rtt_micros).sum();
        Some(sum as f64 / self.results.len() as f64)
    }

    /// Arithmetic mean throughput over all collected probes.
    pub fn mean_throughput_bps(&self) -> Option<f64> {
        let samples = self.throughput_bps();
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    pub fn min_rtt_micros(&self) -> Option<u64> {
        self.results.iter().map(|r| r.rtt_micros).min()
    }

    pub fn max_rtt_micros(&self) -> Option<u64> {
        self.results.iter().map(|r| r.rtt_micros).max()
    }

    /// Freeze the collected samples into a report.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            kind: self.kind,
            mean_rtt_micros: self.mean_rtt_micros(),
            min_rtt_micros: self.min_rtt_micros(),
            max_rtt_micros: self.max_rtt_micros(),
            mean_throughput_bps: self.mean_throughput_bps(),
            probes: self.results.clone(),
        }
    }
}

/// Summary of one completed measurement run.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub kind: MeasurementKind,
    pub probes: Vec<ProbeResult>,
    pub mean_rtt_micros: Option<f64>,
    pub min_rtt_micros: Option<u64>,
    pub max_rtt_micros: Option<u64>,
    pub mean_throughput_bps: Option<f64>,
}
