//! Run summary accumulated by a response collector, and the statistics
//! aggregated from it at run end.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::utils::BenchError;

use statistical::{mean, median, standard_deviation};

/// Raw counters and latency samples of one client run. Exclusively owned by
/// the collector task during the run, moved out when it finishes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Summary {
    /// Total number of acknowledged operations.
    pub ack_num: u64,

    /// Sum of latencies of all acknowledged operations, in millisecs.
    pub total_lat: i64,

    /// Per-operation latency samples, in millisecs.
    pub lat_array: Vec<i64>,

    /// Maximum observed latency, in millisecs.
    pub max_lat: i64,

    /// Number of read operations completed through the slow path.
    pub total_slow: u64,

    /// Number of read operations completed.
    pub total_read: u64,

    /// Number of inbound messages that failed to decode.
    pub decode_failures: u64,

    /// Admission units still held when the run ended; non-zero means some
    /// batches were never fully acknowledged.
    pub outstanding_at_end: usize,
}

impl Summary {
    /// Creates an empty summary with room for `max_samples` latency samples,
    /// i.e. the maximum possible number of acknowledged operations.
    pub fn new(max_samples: usize) -> Self {
        Summary {
            lat_array: Vec::with_capacity(max_samples),
            ..Default::default()
        }
    }

    /// Records `count` operations acknowledged with the same latency.
    /// Negative latencies (clock skew between samples) count as zero.
    pub fn record_latency(&mut self, lat: i64, count: usize) {
        let lat = lat.max(0);
        self.ack_num += count as u64;
        self.total_lat = self
            .total_lat
            .saturating_add(lat.saturating_mul(count as i64));
        self.lat_array.extend(std::iter::repeat(lat).take(count));
        if lat > self.max_lat {
            self.max_lat = lat;
        }
    }
}

/// Nearest-rank percentile of an ascending sorted slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Throughput and latency statistics of one client run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    /// Configured run length in seconds.
    pub duration_s: u64,

    /// Total number of acknowledged operations.
    pub ack_num: u64,

    /// Acknowledged operations per second (integer division).
    pub throughput: u64,

    /// Mean latency in millisecs.
    pub mean_lat: f64,

    /// Median latency in millisecs.
    pub median_lat: f64,

    /// 95th percentile latency in millisecs.
    pub p95_lat: f64,

    /// 99th percentile latency in millisecs.
    pub p99_lat: f64,

    /// Minimum latency in millisecs.
    pub min_lat: f64,

    /// Maximum latency in millisecs.
    pub max_lat: f64,

    /// Standard deviation of latency in millisecs.
    pub stdev_lat: f64,

    /// Number of read operations completed.
    pub total_read: u64,

    /// Number of read operations completed through the slow path.
    pub total_slow: u64,

    /// Fraction of reads taking the slow path.
    pub slow_rate: f64,

    /// Number of inbound messages that failed to decode.
    pub decode_failures: u64,

    /// Admission units still held when the run ended.
    pub outstanding_at_end: usize,
}

impl RunStats {
    /// Aggregates a collector's summary over a run of `duration_s` seconds.
    pub fn aggregate(summary: &Summary, duration_s: u64) -> Self {
        let mut lats: Vec<f64> =
            summary.lat_array.iter().map(|&l| l as f64).collect();
        lats.sort_by(|x, y| x.total_cmp(y));

        let (mean_lat, median_lat) = if lats.is_empty() {
            (0.0, 0.0)
        } else {
            (mean(&lats), median(&lats))
        };
        let stdev_lat = if lats.len() < 2 {
            0.0
        } else {
            standard_deviation(&lats, Some(mean_lat))
        };

        RunStats {
            duration_s,
            ack_num: summary.ack_num,
            throughput: summary.ack_num / duration_s.max(1),
            mean_lat,
            median_lat,
            p95_lat: percentile(&lats, 95.0),
            p99_lat: percentile(&lats, 99.0),
            min_lat: lats.first().copied().unwrap_or(0.0),
            max_lat: lats.last().copied().unwrap_or(0.0),
            stdev_lat,
            total_read: summary.total_read,
            total_slow: summary.total_slow,
            slow_rate: if summary.total_read == 0 {
                0.0
            } else {
                summary.total_slow as f64 / summary.total_read as f64
            },
            decode_failures: summary.decode_failures,
            outstanding_at_end: summary.outstanding_at_end,
        }
    }

    /// Writes every latency sample of the summary into file at `path`, one
    /// sample per line.
    pub fn write_latency_file(
        summary: &Summary,
        path: impl AsRef<Path>,
    ) -> Result<(), BenchError> {
        let mut writer = BufWriter::new(File::create(path)?);
        for lat in &summary.lat_array {
            writeln!(writer, "{}", lat)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Name of the latency dump file of given client.
    pub fn latency_file_name(client_id: u64) -> String {
        format!("latency.{}.out", client_id)
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Throughput: {} req/s", self.throughput)?;
        writeln!(f, "Acked: {} in {} s", self.ack_num, self.duration_s)?;
        writeln!(
            f,
            "Latency (ms): mean {:.2} median {:.2} p95 {:.2} p99 {:.2} min {:.2} max {:.2} stdev {:.2}",
            self.mean_lat,
            self.median_lat,
            self.p95_lat,
            self.p99_lat,
            self.min_lat,
            self.max_lat,
            self.stdev_lat
        )?;
        writeln!(
            f,
            "Reads: {} slow: {} slow rate: {:.4}",
            self.total_read, self.total_slow, self.slow_rate
        )?;
        write!(
            f,
            "Decode failures: {} outstanding at end: {}",
            self.decode_failures, self.outstanding_at_end
        )
    }
}
