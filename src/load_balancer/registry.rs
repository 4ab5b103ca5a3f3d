//! Backend registry: the one piece of shared mutable state.
//!
//! # Responsibilities
//! - Hold the fixed, ordered backend list
//! - Track the last-known liveness flag per backend
//! - Own the round-robin cursor shared by every in-flight request
//!
//! # Design Decisions
//! - Liveness flags and cursor sit behind a single `Mutex`
//! - The lock is held only to read/flip a flag or read-and-advance the cursor;
//!   no I/O ever happens under it
//! - Backends start healthy; the first probe cycle corrects that prior

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::ProxyError;
use crate::load_balancer::backend::Backend;

/// The backend chosen at one rotation step, with the cursor value it consumed.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub backend: &'a Backend,
    /// Cursor position before it was advanced past this backend.
    pub index: usize,
}

#[derive(Debug)]
struct RegistryState {
    healthy: Vec<bool>,
    cursor: usize,
}

/// Fixed backend pool plus liveness flags and rotation cursor.
#[derive(Debug)]
pub struct Registry {
    backends: Vec<Backend>,
    positions: HashMap<String, usize>,
    state: Mutex<RegistryState>,
}

impl Registry {
    /// Build a registry with every backend marked healthy.
    ///
    /// Addresses must be unique: liveness flags are keyed by address.
    pub fn new(backends: Vec<Backend>) -> Result<Self, ProxyError> {
        if backends.is_empty() {
            return Err(ProxyError::EmptyPool);
        }

        let mut positions = HashMap::with_capacity(backends.len());
        for (i, backend) in backends.iter().enumerate() {
            if positions.insert(backend.address().to_string(), i).is_some() {
                return Err(ProxyError::DuplicateBackend(backend.address().to_string()));
            }
        }
        let healthy = vec![true; backends.len()];

        Ok(Self {
            backends,
            positions,
            state: Mutex::new(RegistryState { healthy, cursor: 0 }),
        })
    }

    /// Parse configured addresses into a registry.
    pub fn from_addresses<S: AsRef<str>>(addresses: &[S]) -> Result<Self, ProxyError> {
        let backends = addresses
            .iter()
            .map(|a| Backend::parse(a.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(backends)
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        // Flags and an in-range index are valid whatever a panicking holder did.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All backends in rotation order.
    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Set the liveness flag for `address`.
    ///
    /// Unknown addresses are ignored. Returns the previous flag when the address
    /// is known, so callers can log transitions.
    pub fn mark_healthy(&self, address: &str, healthy: bool) -> Option<bool> {
        let index = *self.positions.get(address)?;
        let mut state = self.lock();
        let previous = state.healthy[index];
        state.healthy[index] = healthy;
        Some(previous)
    }

    /// Last-known liveness flag for `address`; `false` for unknown addresses.
    pub fn is_healthy(&self, address: &str) -> bool {
        match self.positions.get(address) {
            Some(&index) => self.lock().healthy[index],
            None => false,
        }
    }

    /// Current cursor position without advancing it.
    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    /// Read the cursor, advance it by one (mod pool size), and return the
    /// backend it pointed at together with the pre-advance index.
    pub fn next_candidate(&self) -> Candidate<'_> {
        let index = {
            let mut state = self.lock();
            let index = state.cursor;
            state.cursor = (index + 1) % self.backends.len();
            index
        };
        Candidate {
            backend: &self.backends[index],
            index,
        }
    }

    /// `(address, healthy)` pairs in rotation order.
    pub fn snapshot(&self) -> Vec<(String, bool)> {
        let state = self.lock();
        self.backends
            .iter()
            .zip(state.healthy.iter())
            .map(|(b, &h)| (b.address().to_string(), h))
            .collect()
    }

    /// Number of backends currently flagged healthy.
    pub fn healthy_count(&self) -> usize {
        self.lock().healthy.iter().filter(|&&h| h).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry(n: u16) -> Registry {
        let addresses: Vec<String> = (0..n).map(|i| format!("http://127.0.0.1:{}", 9001 + i)).collect();
        Registry::from_addresses(&addresses).unwrap()
    }

    #[test]
    fn starts_all_healthy_at_cursor_zero() {
        let reg = registry(3);
        assert_eq!(reg.cursor(), 0);
        assert_eq!(reg.healthy_count(), 3);
        assert!(reg.is_healthy("http://127.0.0.1:9002"));
    }

    #[test]
    fn next_candidate_rotates_and_wraps() {
        let reg = registry(3);
        let picks: Vec<_> = (0..7).map(|_| reg.next_candidate().index).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(reg.cursor(), 1);

        let c = reg.next_candidate();
        assert_eq!(c.backend.address(), "http://127.0.0.1:9002");
    }

    #[test]
    fn mark_healthy_is_idempotent() {
        let reg = registry(2);
        assert_eq!(reg.mark_healthy("http://127.0.0.1:9001", true), Some(true));
        let once = reg.snapshot();
        assert_eq!(reg.mark_healthy("http://127.0.0.1:9001", true), Some(true));
        assert_eq!(reg.snapshot(), once);
    }

    #[test]
    fn mark_healthy_reports_previous_flag() {
        let reg = registry(2);
        assert_eq!(reg.mark_healthy("http://127.0.0.1:9002", false), Some(true));
        assert_eq!(reg.mark_healthy("http://127.0.0.1:9002", false), Some(false));
        assert!(!reg.is_healthy("http://127.0.0.1:9002"));
        assert_eq!(reg.healthy_count(), 1);
    }

    #[test]
    fn unknown_address_is_a_no_op() {
        let reg = registry(2);
        let before = reg.snapshot();
        assert_eq!(reg.mark_healthy("http://elsewhere:1", false), None);
        assert_eq!(reg.snapshot(), before);
        assert!(!reg.is_healthy("http://elsewhere:1"));
    }

    #[test]
    fn concurrent_callers_never_share_an_index() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1000;
        let reg = Arc::new(registry(5));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| {
                            let before = reg.cursor();
                            assert!(before < 5);
                            reg.next_candidate().index
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts = [0usize; 5];
        for handle in handles {
            for index in handle.join().unwrap() {
                assert!(index < 5);
                counts[index] += 1;
            }
        }

        // Every read-and-advance is serialized, so the totals are exact.
        assert_eq!(counts, [THREADS * PER_THREAD / 5; 5]);
        assert_eq!(reg.cursor(), 0);
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(matches!(Registry::new(Vec::new()), Err(ProxyError::EmptyPool)));
    }

    #[test]
    fn duplicate_address_is_rejected() {
        let result = Registry::from_addresses(&["http://a:1", "http://b:1", "http://a:1"]);
        match result {
            Err(ProxyError::DuplicateBackend(address)) => assert_eq!(address, "http://a:1"),
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }
}
