//! Wall-clock timestamps echoed through the server for latency computation.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the UNIX epoch.
pub type Timestamp = i64;

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn make_timestamp() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as Timestamp)
}

#[cfg(test)]
mod timestamp_tests {
    use super::*;

    #[test]
    fn timestamp_monotonic_enough() {
        let t0 = make_timestamp();
        let t1 = make_timestamp();
        assert!(t0 > 0);
        assert!(t1 >= t0);
    }
}
