//! Per-run performance accounting.
//!
//! A [`MetricsCollector`] is created when the transfer socket is bound and
//! collects one [`DelaySample`] per segment as it is first acknowledged.
//! [`MetricsCollector::finish`] turns those samples into a
//! [`TransferReport`] once the teardown handshake is complete.

use std::time::{Duration, Instant};

/// Floor on measured wall-clock time so throughput stays finite.
const MIN_ELAPSED_SECS: f64 = 1e-9;

/// Time from a segment's first transmission to its first acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelaySample {
    pub offset: i32,
    pub elapsed: Duration,
}

/// Protocol event counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    /// Datagrams sent in total: data, retransmissions and control.
    pub segments_sent: u64,
    /// Data segments sent more than once (fast or timeout path).
    pub retransmissions: u64,
    /// Fast-retransmit events.
    pub fast_retransmits: u64,
    /// Receive timeouts.
    pub timeouts: u64,
}

/// Final figures for one completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferReport {
    /// File size in bytes.
    pub bytes: u64,
    /// From socket creation to the confirmation being sent.
    pub elapsed: Duration,
    /// Bytes per second.
    pub throughput: f64,
    /// Mean per-segment delay, in seconds.
    pub avg_delay: f64,
    /// See [`score`].
    pub score: f64,
    pub stats: TransferStats,
}

/// Composite performance score: `0.3 * throughput/1000 + 0.7 / avg_delay`.
///
/// Defined as `0` when `avg_delay` is not positive.
pub fn score(throughput: f64, avg_delay: f64) -> f64 {
    if avg_delay <= 0.0 {
        return 0.0;
    }
    0.3 * (throughput / 1000.0) + 0.7 / avg_delay
}

/// Accumulates delay samples for a single run.
#[derive(Debug)]
pub struct MetricsCollector {
    started: Instant,
    samples: Vec<DelaySample>,
}

impl MetricsCollector {
    /// Start the clock at `started`.
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            samples: Vec::new(),
        }
    }

    pub fn record(&mut self, sample: DelaySample) {
        self.samples.push(sample);
    }

    pub fn samples(&self) -> &[DelaySample] {
        &self.samples
    }

    /// Arithmetic mean of the samples in seconds, `0.0` when there are none.
    pub fn average_delay(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: f64 = self.samples.iter().map(|s| s.elapsed.as_secs_f64()).sum();
        total / self.samples.len() as f64
    }

    /// Compute the report for `bytes` transferred, stopping the clock at
    /// `finished`.
    pub fn finish(&self, bytes: u64, finished: Instant, stats: TransferStats) -> TransferReport {
        let elapsed = finished.saturating_duration_since(self.started);
        let secs = elapsed.as_secs_f64().max(MIN_ELAPSED_SECS);
        let throughput = bytes as f64 / secs;
        let avg_delay = self.average_delay();
        TransferReport {
            bytes,
            elapsed,
            throughput,
            avg_delay,
            score: score(throughput, avg_delay),
            stats,
        }
    }
}

/// Averages over several independent runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialSummary {
    pub trials: usize,
    pub throughput: f64,
    pub avg_delay: f64,
    pub score: f64,
}

impl TrialSummary {
    /// Mean of each figure across `reports`. `None` for an empty slice.
    pub fn from_reports(reports: &[TransferReport]) -> Option<Self> {
        if reports.is_empty() {
            return None;
        }
        let n = reports.len() as f64;
        let mean = |f: fn(&TransferReport) -> f64| reports.iter().map(f).sum::<f64>() / n;
        Some(Self {
            trials: reports.len(),
            throughput: mean(|r| r.throughput),
            avg_delay: mean(|r| r.avg_delay),
            score: mean(|r| r.score),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn zero_delay_scores_zero() {
        assert_eq!(score(123_456.0, 0.0), 0.0);
        assert_eq!(score(0.0, 0.0), 0.0);
    }

    #[test]
    fn score_formula() {
        assert!(approx(score(2000.0, 1.0), 1.3));
        assert!(approx(score(0.0, 0.5), 1.4));
    }

    #[test]
    fn empty_sample_set_averages_zero() {
        let m = MetricsCollector::new(Instant::now());
        assert_eq!(m.average_delay(), 0.0);
    }

    #[test]
    fn average_delay_is_arithmetic_mean() {
        let mut m = MetricsCollector::new(Instant::now());
        m.record(DelaySample { offset: 0, elapsed: Duration::from_millis(100) });
        m.record(DelaySample { offset: 1020, elapsed: Duration::from_millis(300) });
        assert!(approx(m.average_delay(), 0.2));
        assert_eq!(m.samples().len(), 2);
    }

    #[test]
    fn finish_computes_throughput_from_wall_clock() {
        let start = Instant::now();
        let mut m = MetricsCollector::new(start);
        m.record(DelaySample { offset: 0, elapsed: Duration::from_secs(1) });

        let r = m.finish(2000, start + Duration::from_secs(1), TransferStats::default());
        assert!(approx(r.throughput, 2000.0));
        assert!(approx(r.avg_delay, 1.0));
        assert!(approx(r.score, 1.3));
        assert_eq!(r.elapsed, Duration::from_secs(1));
    }

    #[test]
    fn finish_with_no_elapsed_time_stays_finite() {
        let start = Instant::now();
        let m = MetricsCollector::new(start);
        let r = m.finish(10, start, TransferStats::default());
        assert!(r.throughput.is_finite());
        assert_eq!(r.score, 0.0);
    }

    #[test]
    fn trial_summary_averages() {
        let mk = |tp: f64, d: f64| TransferReport {
            bytes: 0,
            elapsed: Duration::ZERO,
            throughput: tp,
            avg_delay: d,
            score: score(tp, d),
            stats: TransferStats::default(),
        };
        let s = TrialSummary::from_reports(&[mk(1000.0, 1.0), mk(3000.0, 0.5)]).unwrap();
        assert_eq!(s.trials, 2);
        assert!(approx(s.throughput, 2000.0));
        assert!(approx(s.avg_delay, 0.75));
        assert!(approx(s.score, (1.0 + 2.3) / 2.0));
        assert!(TrialSummary::from_reports(&[]).is_none());
    }
}
