//! Register version ordering used by the quorum-register protocol.
//!
//! Quorum reads may observe several versions of the same register from
//! different replicas; they must deterministically pick one maximal version.
//! The order compares, in precedence: timestamp, random tag, server ID, and
//! thread ID.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Version tag of a register value.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Version {
    /// ID of the server that produced this version.
    pub server_id: i32,

    /// ID of the server thread that produced this version.
    pub thread_id: i32,

    /// Logical timestamp.
    pub ts: i64,

    /// Random tag for breaking timestamp collisions.
    pub r: i32,
}

/// The minimum version; every register starts out at this one.
pub const MIN_VERSION: Version = Version {
    server_id: 0,
    thread_id: 0,
    ts: 0,
    r: 0,
};

impl Version {
    /// Creates a new version tag.
    pub fn new(server_id: i32, thread_id: i32, ts: i64, r: i32) -> Self {
        Version {
            server_id,
            thread_id,
            ts,
            r,
        }
    }

    /// Fields laid out in comparison precedence order.
    #[inline]
    fn order_key(&self) -> (i64, i32, i32, i32) {
        (self.ts, self.r, self.server_id, self.thread_id)
    }

    /// Returns true if `self` is strictly larger than `other`.
    #[inline]
    pub fn larger_than(&self, other: &Version) -> bool {
        self.order_key() > other.order_key()
    }

    /// Picks the maximal version among the given ones, or `None` if empty.
    pub fn max_of<'a>(
        versions: impl IntoIterator<Item = &'a Version>,
    ) -> Option<&'a Version> {
        versions.into_iter().max()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Default for Version {
    fn default() -> Self {
        MIN_VERSION
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "sId: {}, tId: {}, ts: {}, R: {}",
            self.server_id, self.thread_id, self.ts, self.r
        )
    }
}

#[cfg(test)]
mod version_tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn tie_broken_by_random_tag() {
        let a = Version::new(1, 1, 5, 1);
        let b = Version::new(9, 9, 5, 0);
        assert!(a.larger_than(&b));
        assert!(!b.larger_than(&a));
        let a_copy = a;
        assert!(!a.larger_than(&a_copy));
    }

    #[test]
    fn precedence_order() {
        // timestamp dominates everything else
        assert!(Version::new(0, 0, 6, 0).larger_than(&Version::new(9, 9, 5, 9)));
        // then random tag
        assert!(Version::new(0, 0, 5, 2).larger_than(&Version::new(9, 9, 5, 1)));
        // then server ID
        assert!(Version::new(3, 0, 5, 1).larger_than(&Version::new(2, 9, 5, 1)));
        // then thread ID
        assert!(Version::new(3, 4, 5, 1).larger_than(&Version::new(3, 3, 5, 1)));
        assert!(MIN_VERSION == Version::default());
    }

    #[test]
    fn irreflexive_and_total() {
        let mut rng = rand::thread_rng();
        let versions: Vec<Version> = (0..60)
            .map(|_| {
                Version::new(
                    rng.gen_range(0..3),
                    rng.gen_range(0..3),
                    rng.gen_range(0..3),
                    rng.gen_range(0..3),
                )
            })
            .collect();
        for a in &versions {
            assert!(!a.larger_than(a));
            for b in &versions {
                // exactly one of a > b, b > a, a == b
                let cnt = [a.larger_than(b), b.larger_than(a), a == b]
                    .iter()
                    .filter(|&&x| x)
                    .count();
                assert_eq!(cnt, 1);
                for c in &versions {
                    if a.larger_than(b) && b.larger_than(c) {
                        assert!(a.larger_than(c));
                    }
                }
            }
        }
    }

    #[test]
    fn max_of_versions() {
        let versions = vec![
            Version::new(2, 0, 7, 3),
            Version::new(1, 5, 7, 3),
            Version::new(4, 0, 6, 9),
        ];
        assert_eq!(Version::max_of(&versions), Some(&versions[0]));
        assert_eq!(Version::max_of(&[]), None);
    }
}
