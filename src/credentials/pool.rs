//! Round-robin credential pool
//!
//! Credentials are handed out as leases. `acquire` rotates through the pool,
//! preferring the credential with the fewest outstanding leases, so that
//! concurrent reply streams land on distinct accounts whenever enough
//! credentials exist. Dropping a lease releases it.

use crate::credentials::{Credential, CredentialError};
use std::sync::{Arc, Mutex, MutexGuard};

struct PoolState {
    /// Index the next rotation starts from
    next: usize,
    /// Outstanding leases per credential
    in_flight: Vec<usize>,
}

struct PoolInner {
    credentials: Vec<Arc<Credential>>,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared pool of credentials
#[derive(Clone)]
pub struct CredentialPool {
    inner: Arc<PoolInner>,
}

/// A credential checked out of a [`CredentialPool`]
pub struct CredentialLease {
    pool: Arc<PoolInner>,
    index: usize,
    credential: Arc<Credential>,
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>) -> Result<Self, CredentialError> {
        if credentials.is_empty() {
            return Err(CredentialError::EmptyPool);
        }

        let in_flight = vec![0; credentials.len()];
        Ok(Self {
            inner: Arc::new(PoolInner {
                credentials: credentials.into_iter().map(Arc::new).collect(),
                state: Mutex::new(PoolState { next: 0, in_flight }),
            }),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.credentials.is_empty()
    }

    /// Checks out the next credential in rotation
    ///
    /// Starting from the rotation cursor, the first credential with the
    /// lowest number of outstanding leases wins. With every credential idle
    /// this is plain round-robin.
    pub fn acquire(&self) -> CredentialLease {
        let count = self.inner.credentials.len();
        let index = {
            let mut state = self.inner.state();
            let start = state.next;
            let chosen = (0..count)
                .map(|offset| (start + offset) % count)
                .min_by_key(|&i| state.in_flight[i])
                .unwrap_or(start);
            state.in_flight[chosen] += 1;
            state.next = (chosen + 1) % count;
            chosen
        };

        tracing::trace!(
            "Leased credential {} ({})",
            index,
            self.inner.credentials[index].label()
        );

        CredentialLease {
            pool: Arc::clone(&self.inner),
            index,
            credential: Arc::clone(&self.inner.credentials[index]),
        }
    }

    /// Returns a lease to the pool
    pub fn release(&self, lease: CredentialLease) {
        drop(lease);
    }

    /// Number of leases currently outstanding across the pool
    pub fn outstanding(&self) -> usize {
        self.inner.state().in_flight.iter().sum()
    }
}

impl CredentialLease {
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Position of the leased credential in the pool
    pub fn index(&self) -> usize {
        self.index
    }
}

impl std::ops::Deref for CredentialLease {
    type Target = Credential;

    fn deref(&self) -> &Credential {
        &self.credential
    }
}

impl Drop for CredentialLease {
    fn drop(&mut self) {
        let mut state = self.pool.state();
        state.in_flight[self.index] = state.in_flight[self.index].saturating_sub(1);
    }
}
