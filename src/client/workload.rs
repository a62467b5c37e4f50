//! Synthetic workload generation: keys, read/write types, and put values.

use crate::params::{Distribution, RunParams};
use crate::protocols::{Command, Key, Value};
use crate::utils::BenchError;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rand_distr::{Distribution as _, Zipf};

/// The single hot key hit by conflicting operations.
pub const HOT_KEY: Key = 42;

/// Offset of unique keys above the hot key.
const UNIQUE_KEY_BASE: Key = 43;

/// Upper bound (exclusive) of randomly generated put values.
const MAX_PUT_VALUE: Value = 10000000;

/// One pre-generated operation of the workload.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct WorkloadOp {
    /// Register key.
    pub key: Key,

    /// True if this operation is a Get.
    pub is_read: bool,

    /// Value to write if this operation is a Put.
    pub value: Value,
}

impl WorkloadOp {
    /// Converts into a protocol command.
    pub fn to_command(&self) -> Command {
        if self.is_read {
            Command::get(self.key)
        } else {
            Command::put(self.key, self.value)
        }
    }
}

/// Full pre-generated workload of a client run.
#[derive(Debug, Clone)]
pub struct Workload {
    /// All operations in issuing order.
    ops: Vec<WorkloadOp>,

    /// Number of operations per batch.
    batch_size: usize,
}

impl Workload {
    /// Generates the workload for given run parameters. Generation is seeded
    /// with the client ID, so a client with the same ID and parameters always
    /// produces the same workload.
    pub fn generate(
        params: &RunParams,
        client_id: u64,
    ) -> Result<Self, BenchError> {
        if params.conflicts > 100 {
            return logged_err!(client_id; "conflicts percentage must be between 0 and 100, got {}",
                                          params.conflicts);
        }
        if params.batch_size == 0 {
            return logged_err!(client_id; "invalid batch size 0");
        }

        let mut rng = StdRng::seed_from_u64(client_id);
        let keys = Self::gen_keys(params, &mut rng)?;
        let reads = Self::gen_read_flags(params, &mut rng);

        let ops = keys
            .into_iter()
            .zip(reads)
            .map(|(key, is_read)| WorkloadOp {
                key,
                is_read,
                value: if is_read {
                    0
                } else {
                    rng.gen_range(0..MAX_PUT_VALUE)
                },
            })
            .collect();

        Ok(Workload {
            ops,
            batch_size: params.batch_size,
        })
    }

    /// Generates the key sequence.
    fn gen_keys(
        params: &RunParams,
        rng: &mut StdRng,
    ) -> Result<Vec<Key>, BenchError> {
        match params.dist() {
            Distribution::Zipfian => {
                let zipf = Zipf::new(params.key_space, params.zipfian_theta)?;
                // samples lie in [1, key_space]; shift to 0-based keys
                Ok((0..params.request_count)
                    .map(|_| zipf.sample(rng) as Key - 1)
                    .collect())
            }
            Distribution::Conflict => Ok((0..params.request_count)
                .map(|i| {
                    if rng.gen_range(0..100) < params.conflicts {
                        HOT_KEY
                    } else {
                        params.start_range + UNIQUE_KEY_BASE + i as Key
                    }
                })
                .collect()),
        }
    }

    /// Generates the read/write classification. Flips one coin per operation,
    /// or one per batch if `params.separate` is set.
    fn gen_read_flags(params: &RunParams, rng: &mut StdRng) -> Vec<bool> {
        let read_ratio = params.read_ratio();
        let mut reads = Vec::with_capacity(params.request_count);
        while reads.len() < params.request_count {
            if params.separate {
                let is_read = rng.gen::<f64>() < read_ratio;
                let len = params
                    .batch_size
                    .min(params.request_count - reads.len());
                reads.extend(std::iter::repeat(is_read).take(len));
            } else {
                reads.push(rng.gen::<f64>() < read_ratio);
            }
        }
        reads
    }

    /// Number of operations in the workload.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the workload has no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// All operations in issuing order.
    pub fn ops(&self) -> &[WorkloadOp] {
        &self.ops
    }

    /// Returns the batch starting at operation index `start`, which holds up
    /// to `batch_size` operations. Empty if `start` is past the end.
    pub fn batch_at(&self, start: usize) -> &[WorkloadOp] {
        if start >= self.ops.len() {
            return &[];
        }
        let end = (start + self.batch_size).min(self.ops.len());
        &self.ops[start..end]
    }
}
