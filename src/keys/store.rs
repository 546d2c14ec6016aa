//! Live key store with whole-set replacement
//!
//! Readers take an immutable [`KeySet`] snapshot; a load publishes a new
//! snapshot in one step. A retired snapshot is dropped, and its secrets
//! wiped, only when the last reader lets go of it.

use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::access::AccessRestriction;
use super::digest::{AlgorithmError, DigestAlgorithm};
use super::entry::EntryError;
use super::secret::{KeySecret, SecretError, MAX_SECRET_LEN};

/// Key identifier as written in the key file
pub type KeyId = u32;

/// Highest key id a key file may define; larger ids belong to Autokey
pub const MAX_KEY_ID: KeyId = 65535;

/// A validated symmetric key
#[derive(Debug, PartialEq, Eq)]
pub struct KeyRecord {
    key_id: KeyId,
    algorithm: DigestAlgorithm,
    secret: KeySecret,
    access_list: Vec<AccessRestriction>,
}

impl KeyRecord {
    /// Build a record, checking id, algorithm and secret together
    pub fn new(
        key_id: KeyId,
        algorithm: DigestAlgorithm,
        secret: KeySecret,
        access_list: Vec<AccessRestriction>,
    ) -> Result<Self, EntryError> {
        if key_id == 0 {
            return Err(EntryError::InvalidKeyId {
                token: key_id.to_string(),
            });
        }
        if key_id > MAX_KEY_ID {
            return Err(EntryError::KeyIdOutOfRange {
                token: key_id.to_string(),
                max: MAX_KEY_ID,
            });
        }
        if !algorithm.is_available() {
            return Err(EntryError::UnsupportedAlgorithm {
                key_id,
                source: AlgorithmError::Unavailable(algorithm),
            });
        }
        if secret.is_empty() || secret.len() > MAX_SECRET_LEN {
            return Err(EntryError::InvalidSecret {
                key_id,
                source: SecretError::Length { len: secret.len() },
            });
        }

        Ok(Self {
            key_id,
            algorithm,
            secret,
            access_list,
        })
    }

    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn secret(&self) -> &KeySecret {
        &self.secret
    }

    pub fn access_list(&self) -> &[AccessRestriction] {
        &self.access_list
    }

    /// Check whether this key may be used with `peer`
    ///
    /// An empty access list places no restriction.
    pub fn permits(&self, peer: &SocketAddr) -> bool {
        self.access_list.is_empty() || self.access_list.iter().any(|r| r.permits(peer))
    }
}

/// Immutable snapshot of the active keys
#[derive(Debug, Default)]
pub struct KeySet {
    generation: u64,
    records: BTreeMap<KeyId, KeyRecord>,
}

impl KeySet {
    /// Number of commits that produced this set; 0 for the initial empty set
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, key_id: KeyId) -> Option<&KeyRecord> {
        self.records.get(&key_id)
    }

    pub fn contains(&self, key_id: KeyId) -> bool {
        self.records.contains_key(&key_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.records.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Access check for the authentication path: unknown keys are refused
    pub fn permits(&self, key_id: KeyId, peer: &SocketAddr) -> bool {
        self.get(key_id).is_some_and(|record| record.permits(peer))
    }
}

/// Summary of a committed replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    pub generation: u64,
    pub installed: usize,
    pub duplicates: usize,
}

/// Process-wide or per-owner store of active keys
#[derive(Debug, Default)]
pub struct KeyStore {
    current: RwLock<Arc<KeySet>>,
    load_lock: Mutex<()>,
}

lazy_static::lazy_static! {
    static ref GLOBAL_KEY_STORE: KeyStore = KeyStore::new();
}

impl KeyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store used by [`crate::keys::load_keys`]
    pub fn global() -> &'static KeyStore {
        &GLOBAL_KEY_STORE
    }

    /// Current set of active keys
    pub fn snapshot(&self) -> Arc<KeySet> {
        Arc::clone(&self.current.read())
    }

    /// Start a load, waiting for any load already in flight
    pub fn begin_load(&self) -> LoadSession<'_> {
        LoadSession {
            store: self,
            _guard: self.load_lock.lock(),
        }
    }

    /// Start a load unless another one is in flight
    pub fn try_begin_load(&self) -> Option<LoadSession<'_>> {
        self.load_lock.try_lock().map(|guard| LoadSession {
            store: self,
            _guard: guard,
        })
    }
}

/// Exclusive right to replace the contents of a [`KeyStore`]
///
/// Held for the duration of one load; loads against the same store never
/// overlap.
pub struct LoadSession<'a> {
    store: &'a KeyStore,
    _guard: MutexGuard<'a, ()>,
}

impl LoadSession<'_> {
    /// Snapshot as it was when the load started
    pub fn current(&self) -> Arc<KeySet> {
        self.store.snapshot()
    }

    /// Replace the live keys with `staged`
    ///
    /// When a key id appears more than once the first record wins and the
    /// later ones are discarded.
    pub fn commit(self, staged: Vec<KeyRecord>) -> CommitSummary {
        let mut records = BTreeMap::new();
        let mut duplicates = 0;
        for record in staged {
            if records.contains_key(&record.key_id) {
                warn!(key_id = record.key_id, "Duplicate key id, keeping first definition");
                duplicates += 1;
                continue;
            }
            records.insert(record.key_id, record);
        }

        let retired = {
            let mut current = self.store.current.write();
            let next = Arc::new(KeySet {
                generation: current.generation + 1,
                records,
            });
            std::mem::replace(&mut *current, next)
        };

        let snapshot = self.store.snapshot();
        debug!(
            generation = snapshot.generation,
            retired_generation = retired.generation,
            retired_keys = retired.len(),
            "Key set replaced"
        );
        drop(retired);

        CommitSummary {
            generation: snapshot.generation,
            installed: snapshot.len(),
            duplicates,
        }
    }

    /// Discard `staged` and leave the live keys untouched
    pub fn abort(self, staged: Vec<KeyRecord>) {
        debug!(discarded = staged.len(), "Discarding staged keys");
        drop(staged);
    }
}
