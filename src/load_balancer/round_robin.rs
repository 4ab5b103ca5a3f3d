//! Round-robin rotation bookkeeping for a single request attempt.

use crate::load_balancer::registry::Registry;

/// One pass over the pool, starting wherever the shared cursor was when the
/// attempt began.
///
/// Other requests advance the same cursor concurrently, so the indices this scan
/// consumes may skip around. The scan ends when the index it just consumed is
/// the one right before `start` (the pool has wrapped), or once it has inspected
/// as many candidates as the pool holds.
#[derive(Debug, Clone, Copy)]
pub struct RotationScan {
    start: usize,
    len: usize,
    inspected: usize,
}

impl RotationScan {
    pub fn new(start: usize, len: usize) -> Self {
        Self {
            start,
            len: len.max(1),
            inspected: 0,
        }
    }

    /// Start a scan at the registry's current cursor.
    pub fn begin(registry: &Registry) -> Self {
        Self::new(registry.cursor(), registry.len())
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn inspected(&self) -> usize {
        self.inspected
    }

    /// Record the candidate at `index` as inspected. Returns `true` when the
    /// scan has covered the pool and the attempt is over.
    pub fn complete_after(&mut self, index: usize) -> bool {
        self.inspected += 1;
        (index + 1) % self.len == self.start || self.inspected >= self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_scan_covers_pool_once() {
        let mut scan = RotationScan::new(2, 4);
        assert!(!scan.complete_after(2));
        assert!(!scan.complete_after(3));
        assert!(!scan.complete_after(0));
        assert!(scan.complete_after(1));
        assert_eq!(scan.inspected(), 4);
    }

    #[test]
    fn single_backend_completes_immediately() {
        let mut scan = RotationScan::new(0, 1);
        assert!(scan.complete_after(0));
    }

    #[test]
    fn wraps_early_when_other_requests_advance_cursor() {
        // Another request consumed index 1 between our reads.
        let mut scan = RotationScan::new(0, 4);
        assert!(!scan.complete_after(0));
        assert!(!scan.complete_after(2));
        assert!(scan.complete_after(3));
        assert_eq!(scan.inspected(), 3);
    }

    #[test]
    fn bounded_by_pool_size_when_wrap_point_is_skipped() {
        // Index 2 (the one before start) is always taken by someone else.
        let mut scan = RotationScan::new(0, 3);
        assert!(!scan.complete_after(0));
        assert!(!scan.complete_after(1));
        assert!(scan.complete_after(0));
    }

    #[test]
    fn begin_reads_registry_cursor() {
        let reg = Registry::from_addresses(&["http://a:1", "http://b:1", "http://c:1"]).unwrap();
        reg.next_candidate();
        let scan = RotationScan::begin(&reg);
        assert_eq!(scan.start(), 1);
        assert_eq!(scan.inspected(), 0);
    }
}
