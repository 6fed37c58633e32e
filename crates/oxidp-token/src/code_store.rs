//! Single-use tracking for authorization codes.
//!
//! Codes are stateless JWTs; the only thing the server remembers is which
//! ones have already been redeemed. The set is keyed by a SHA-256 identity
//! hash so raw codes never sit in memory, and the entry API gives the
//! atomic test-and-set the redemption race requires: among N concurrent
//! redemptions of one code, exactly one wins.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{TokenError, TokenResult};
use crate::hash::identity_hash;

/// Default bound on tracked codes before a sweep is attempted.
const DEFAULT_CAPACITY: usize = 16_384;

/// The consumed-code set.
#[derive(Debug)]
pub struct CodeStore {
    used: DashMap<String, i64>,
    capacity: usize,
}

impl Default for CodeStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl CodeStore {
    /// Creates a store that sweeps expired entries once `capacity` is near.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            used: DashMap::new(),
            capacity,
        }
    }

    /// Marks a code as used.
    ///
    /// `exp` is the code's embedded expiry; entries are dropped lazily once
    /// it passes, so the set is bounded by the code TTL.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::AlreadyUsed`] for every caller but the first.
    pub fn try_consume(&self, token: &str, exp: i64, now: i64) -> TokenResult<()> {
        if self.used.len() >= self.capacity {
            self.sweep(now);
        }

        match self.used.entry(identity_hash(token)) {
            Entry::Occupied(_) => Err(TokenError::AlreadyUsed),
            Entry::Vacant(slot) => {
                slot.insert(exp);
                Ok(())
            }
        }
    }

    /// Drops entries whose code has expired; expired codes fail `parse`
    /// anyway, so forgetting them cannot enable replay.
    fn sweep(&self, now: i64) {
        let before = self.used.len();
        self.used.retain(|_, exp| *exp > now);
        tracing::debug!(
            swept = before - self.used.len(),
            remaining = self.used.len(),
            "swept consumed-code set"
        );
    }

    /// Number of tracked codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// Whether no codes are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn second_consume_fails() {
        let store = CodeStore::default();
        assert!(store.try_consume("a-code", 100, 0).is_ok());
        assert!(matches!(
            store.try_consume("a-code", 100, 0),
            Err(TokenError::AlreadyUsed)
        ));
    }

    #[test]
    fn distinct_codes_do_not_interfere() {
        let store = CodeStore::default();
        assert!(store.try_consume("code-one", 100, 0).is_ok());
        assert!(store.try_consume("code-two", 100, 0).is_ok());
    }

    #[test]
    fn exactly_one_concurrent_redemption_wins() {
        let store = Arc::new(CodeStore::default());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.try_consume("contested", 100, 0).is_ok())
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&won| won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn sweep_evicts_expired_entries_near_capacity() {
        let store = CodeStore::with_capacity(4);
        for (i, exp) in [10, 10, 10, 10].iter().enumerate() {
            store.try_consume(&format!("code-{i}"), *exp, 0).unwrap();
        }
        assert_eq!(store.len(), 4);

        // at now=50 all four are expired; the next insert sweeps them
        store.try_consume("late-code", 100, 50).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sweep_keeps_live_entries() {
        let store = CodeStore::with_capacity(2);
        store.try_consume("live", 100, 0).unwrap();
        store.try_consume("dead", 10, 0).unwrap();

        store.try_consume("next", 100, 50).unwrap();
        assert!(matches!(
            store.try_consume("live", 100, 50),
            Err(TokenError::AlreadyUsed)
        ));
    }
}
