//! Immutable run parameters shared by every component of a client run.

use std::fs;
use std::path::Path;

use crate::utils::BenchError;

use serde::Deserialize;

use tokio::time::Duration;

/// Key distribution kinds.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Distribution {
    /// Zipfian over the key space.
    Zipfian,

    /// Unique keys, except for a configurable percentage hitting one hot
    /// key.
    Conflict,
}

impl Distribution {
    /// Parses the distribution name used in config. Only `"zipfan"` selects
    /// the Zipfian distribution; everything else means the conflict-rate one.
    pub fn parse_name(name: &str) -> Self {
        match name {
            "zipfan" => Self::Zipfian,
            _ => Self::Conflict,
        }
    }
}

/// Run parameters struct. Constructed once before issuance begins and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunParams {
    /// Time length of the run in seconds.
    pub duration_s: u64,

    /// Total number of requests to issue.
    pub request_count: usize,

    /// Maximum number of outstanding batches.
    pub concurrency: usize,

    /// Number of operations per batch.
    pub batch_size: usize,

    /// Number of keys addressed by the Zipfian distribution.
    pub key_space: u64,

    /// Fraction of write operations; read ratio is `1 - write_ratio`.
    pub write_ratio: f64,

    /// Key distribution name: "zipfan", or anything else for uniform keys
    /// with conflicts.
    pub distribution: String,

    /// Zipfian skew parameter.
    pub zipfian_theta: f64,

    /// Percentage of operations hitting the hot key under the conflict
    /// distribution.
    pub conflicts: u32,

    /// Offset added to the unique keys under the conflict distribution.
    pub start_range: i64,

    /// If true, every operation in a batch shares the same read/write type.
    pub separate: bool,

    /// If true, write a linearizability trace of invocations & responses.
    pub linearizability: bool,

    /// If true, dump all latency samples to a file at the end.
    pub dump_latency: bool,

    /// Capacity of the decoded response queue.
    pub buffer_size: usize,
}

impl Default for RunParams {
    fn default() -> Self {
        RunParams {
            duration_s: 10,
            request_count: 10000,
            concurrency: 1,
            batch_size: 1,
            key_space: 1000000,
            write_ratio: 0.5,
            distribution: "uniform".into(),
            zipfian_theta: 0.99,
            conflicts: 0,
            start_range: 0,
            separate: false,
            linearizability: false,
            dump_latency: false,
            buffer_size: 100000,
        }
    }
}

impl RunParams {
    /// Parses run parameters from an optional TOML string, starting from the
    /// defaults, and sanitizes them.
    pub fn from_config_str(params_str: Option<&str>) -> Result<Self, BenchError> {
        let params = parsed_config!(params_str => RunParams;
                                    duration_s, request_count, concurrency,
                                    batch_size, key_space, write_ratio,
                                    distribution, zipfian_theta, conflicts,
                                    start_range, separate, linearizability,
                                    dump_latency, buffer_size)?;
        params.sanitize()?;
        Ok(params)
    }

    /// Parses run parameters from a TOML file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, BenchError> {
        let content = fs::read_to_string(path)?;
        Self::from_config_str(Some(&content))
    }

    /// Checks for fatal misconfigurations. Read/write ratio is deliberately
    /// left unchecked.
    pub fn sanitize(&self) -> Result<(), BenchError> {
        if self.conflicts > 100 {
            return logged_err!("c"; "conflicts percentage must be between 0 and 100, got {}",
                                    self.conflicts);
        }
        if self.duration_s == 0 {
            return logged_err!("c"; "invalid params.duration_s '{}'",
                                    self.duration_s);
        }
        if self.request_count == 0 {
            return logged_err!("c"; "invalid params.request_count '{}'",
                                    self.request_count);
        }
        if self.concurrency == 0 {
            return logged_err!("c"; "invalid params.concurrency '{}'",
                                    self.concurrency);
        }
        if self.batch_size == 0 {
            return logged_err!("c"; "invalid params.batch_size '{}'",
                                    self.batch_size);
        }
        if self.buffer_size == 0 {
            return logged_err!("c"; "invalid params.buffer_size '{}'",
                                    self.buffer_size);
        }
        if self.dist() == Distribution::Zipfian {
            if self.key_space == 0 {
                return logged_err!("c"; "invalid params.key_space '{}'",
                                        self.key_space);
            }
            if self.zipfian_theta < 0.0 {
                return logged_err!("c"; "invalid params.zipfian_theta '{}'",
                                        self.zipfian_theta);
            }
        }
        Ok(())
    }

    /// Parsed key distribution kind.
    pub fn dist(&self) -> Distribution {
        Distribution::parse_name(&self.distribution)
    }

    /// Probability of an operation (or batch) being a read.
    pub fn read_ratio(&self) -> f64 {
        1.0 - self.write_ratio
    }

    /// Run length as a duration.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_s)
    }

    /// Number of batches the workload splits into.
    pub fn batch_count(&self) -> usize {
        self.request_count.div_ceil(self.batch_size).max(1)
    }
}
