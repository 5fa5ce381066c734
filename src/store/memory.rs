//! Deterministic in-memory store with optimistic concurrency.
//!
//! Reads record the version of every key they observe; commit validates
//! that none of those versions moved and applies buffered writes under a
//! single new version. A clash produces `Conflict` and resets the
//! transaction so the executor can re-run the handler.
//!
//! Replication is immediate by default (the commit gap stays zero). Tests
//! that exercise the signature tick or the replication-failure path can
//! hold replication back or inject a `NoReplicate` outcome.
//!
//! # Tiger Style
//!
//! - Single version counter, one bump per writing commit
//! - Conflict detection is explicit per observed key
//! - No background threads; all effects happen inside the caller

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::consensus::Consensus;
use crate::history::RequestId;
use crate::history::TxHistory;
use crate::store::CommitOutcome;
use crate::store::Store;
use crate::store::StoreError;
use crate::store::Transaction;
use crate::store::TypedMap;
use crate::store::Version;
use crate::store::encode_key;
use crate::store::encode_value;

struct StoredValue {
    data: Vec<u8>,
    version: Version,
}

#[derive(Default)]
struct Shared {
    maps: HashMap<String, BTreeMap<Vec<u8>, StoredValue>>,
    version: Version,
    replicated: Version,
    hold_replication: bool,
    fail_next_commit: bool,
    consensus: Option<Arc<dyn Consensus>>,
    history: Option<Arc<dyn TxHistory>>,
}

/// In-memory [`Store`] implementation.
pub struct MemoryStore {
    shared: Arc<RwLock<Shared>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            shared: Arc::new(RwLock::new(Shared::default())),
        })
    }

    /// Install the consensus implementation the frontend will observe.
    pub fn install_consensus(&self, consensus: Arc<dyn Consensus>) {
        self.shared.write().consensus = Some(consensus);
    }

    /// Remove the installed consensus (standalone-node mode).
    pub fn remove_consensus(&self) {
        self.shared.write().consensus = None;
    }

    /// Install the history implementation the frontend will observe.
    pub fn install_history(&self, history: Arc<dyn TxHistory>) {
        self.shared.write().history = Some(history);
    }

    /// While held, commits advance the local version but not the
    /// replicated version, opening a commit gap.
    pub fn hold_replication(&self, hold: bool) {
        let mut shared = self.shared.write();
        shared.hold_replication = hold;
        if !hold {
            shared.replicated = shared.version;
        }
    }

    /// Make the next commit report [`CommitOutcome::NoReplicate`].
    pub fn fail_next_replication(&self) {
        self.shared.write().fail_next_commit = true;
    }

    /// Write one entry directly, bypassing transactions. Bootstrap and
    /// test seeding only; bumps the version like a committed write.
    pub fn seed<K, V>(&self, map: &TypedMap<K, V>, key: &K, value: &V) -> Result<(), StoreError>
    where
        K: Serialize + DeserializeOwned,
        V: Serialize + DeserializeOwned,
    {
        let raw_key = encode_key(map.name(), key)?;
        let raw_value = encode_value(map.name(), value)?;
        let mut shared = self.shared.write();
        shared.version += 1;
        let version = shared.version;
        shared
            .maps
            .entry(map.name().to_string())
            .or_default()
            .insert(raw_key, StoredValue {
                data: raw_value,
                version,
            });
        if !shared.hold_replication {
            shared.replicated = version;
        }
        Ok(())
    }
}

impl Store for MemoryStore {
    fn begin(&self) -> Box<dyn Transaction> {
        Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            reads: HashMap::new(),
            writes: HashMap::new(),
            read_version: None,
            committed: None,
            request_id: None,
        })
    }

    fn current_version(&self) -> Version {
        self.shared.read().version
    }

    fn commit_version(&self) -> Version {
        self.shared.read().replicated
    }

    fn commit_gap(&self) -> u64 {
        let shared = self.shared.read();
        shared.version - shared.replicated
    }

    fn consensus(&self) -> Option<Arc<dyn Consensus>> {
        self.shared.read().consensus.clone()
    }

    fn history(&self) -> Option<Arc<dyn TxHistory>> {
        self.shared.read().history.clone()
    }
}

struct MemoryTransaction {
    shared: Arc<RwLock<Shared>>,
    // (map, key) -> version observed (0 = absent)
    reads: HashMap<(String, Vec<u8>), Version>,
    writes: HashMap<(String, Vec<u8>), Vec<u8>>,
    read_version: Option<Version>,
    committed: Option<Version>,
    request_id: Option<RequestId>,
}

impl MemoryTransaction {
    fn reset(&mut self) {
        self.reads.clear();
        self.writes.clear();
        self.read_version = None;
        self.committed = None;
    }
}

impl Transaction for MemoryTransaction {
    fn get(&mut self, map: &str, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(buffered) = self.writes.get(&(map.to_string(), key.to_vec())) {
            return Some(buffered.clone());
        }
        let shared = self.shared.read();
        self.read_version.get_or_insert(shared.version);
        let found = shared.maps.get(map).and_then(|entries| entries.get(key));
        self.reads.insert(
            (map.to_string(), key.to_vec()),
            found.map(|v| v.version).unwrap_or(0),
        );
        found.map(|v| v.data.clone())
    }

    fn put(&mut self, map: &str, key: &[u8], value: &[u8]) {
        self.writes
            .insert((map.to_string(), key.to_vec()), value.to_vec());
    }

    fn for_each(&mut self, map: &str, visit: &mut dyn FnMut(&[u8], &[u8]) -> bool) {
        // Snapshot committed entries first so the shared lock is not held
        // across visitor calls.
        let mut entries: BTreeMap<Vec<u8>, Vec<u8>> = {
            let shared = self.shared.read();
            self.read_version.get_or_insert(shared.version);
            let committed = shared.maps.get(map);
            if let Some(committed) = committed {
                for (key, value) in committed {
                    self.reads
                        .insert((map.to_string(), key.clone()), value.version);
                }
            }
            committed
                .map(|m| {
                    m.iter()
                        .map(|(k, v)| (k.clone(), v.data.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };
        for ((write_map, key), value) in &self.writes {
            if write_map == map {
                entries.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in &entries {
            if !visit(key, value) {
                break;
            }
        }
    }

    fn commit(&mut self) -> CommitOutcome {
        let mut shared = self.shared.write();
        if shared.fail_next_commit {
            shared.fail_next_commit = false;
            return CommitOutcome::NoReplicate;
        }
        let conflicted = self.reads.iter().any(|((map, key), observed)| {
            let current = shared
                .maps
                .get(map)
                .and_then(|entries| entries.get(key))
                .map(|v| v.version)
                .unwrap_or(0);
            current != *observed
        });
        if conflicted {
            drop(shared);
            self.reset();
            return CommitOutcome::Conflict;
        }
        if self.writes.is_empty() {
            return CommitOutcome::Ok;
        }
        shared.version += 1;
        let version = shared.version;
        for ((map, key), value) in self.writes.drain() {
            shared.maps.entry(map).or_default().insert(key, StoredValue {
                data: value,
                version,
            });
        }
        if !shared.hold_replication {
            shared.replicated = version;
        }
        self.committed = Some(version);
        CommitOutcome::Ok
    }

    fn commit_version(&self) -> Option<Version> {
        self.committed
    }

    fn read_version(&self) -> Option<Version> {
        self.read_version
    }

    fn set_request_id(&mut self, id: RequestId) {
        self.request_id = Some(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KV: TypedMap<String, String> = TypedMap::new("kv");

    fn put(tx: &mut dyn Transaction, key: &str, value: &str) {
        let mut view = KV.view(tx);
        view.put(&key.to_string(), &value.to_string()).unwrap();
    }

    fn get(tx: &mut dyn Transaction, key: &str) -> Option<String> {
        let mut view = KV.view(tx);
        view.get(&key.to_string()).unwrap()
    }

    #[test]
    fn writes_visible_after_commit() {
        let store = MemoryStore::new();
        let mut tx = store.begin();
        put(tx.as_mut(), "k", "v");
        assert_eq!(tx.commit(), CommitOutcome::Ok);
        assert_eq!(tx.commit_version(), Some(1));

        let mut tx = store.begin();
        assert_eq!(get(tx.as_mut(), "k"), Some("v".to_string()));
    }

    #[test]
    fn read_only_commit_has_no_commit_version() {
        let store = MemoryStore::new();
        store.seed(&KV, &"k".to_string(), &"v".to_string()).unwrap();
        let mut tx = store.begin();
        assert_eq!(get(tx.as_mut(), "k"), Some("v".to_string()));
        assert_eq!(tx.commit(), CommitOutcome::Ok);
        assert_eq!(tx.commit_version(), None);
        assert_eq!(tx.read_version(), Some(1));
    }

    #[test]
    fn interleaved_write_conflicts_and_resets() {
        let store = MemoryStore::new();
        store.seed(&KV, &"k".to_string(), &"v0".to_string()).unwrap();

        let mut tx = store.begin();
        assert_eq!(get(tx.as_mut(), "k"), Some("v0".to_string()));
        put(tx.as_mut(), "k", "mine");

        // A second writer commits in between.
        let mut other = store.begin();
        put(other.as_mut(), "k", "theirs");
        assert_eq!(other.commit(), CommitOutcome::Ok);

        assert_eq!(tx.commit(), CommitOutcome::Conflict);

        // Re-execution against the fresh state succeeds.
        assert_eq!(get(tx.as_mut(), "k"), Some("theirs".to_string()));
        put(tx.as_mut(), "k", "mine");
        assert_eq!(tx.commit(), CommitOutcome::Ok);
    }

    #[test]
    fn reading_absent_key_conflicts_with_later_insert() {
        let store = MemoryStore::new();
        let mut tx = store.begin();
        assert_eq!(get(tx.as_mut(), "new"), None);
        put(tx.as_mut(), "new", "mine");

        let mut other = store.begin();
        put(other.as_mut(), "new", "theirs");
        assert_eq!(other.commit(), CommitOutcome::Ok);

        assert_eq!(tx.commit(), CommitOutcome::Conflict);
    }

    #[test]
    fn hold_replication_opens_commit_gap() {
        let store = MemoryStore::new();
        store.hold_replication(true);
        store.seed(&KV, &"k".to_string(), &"v".to_string()).unwrap();
        assert_eq!(store.commit_gap(), 1);
        store.hold_replication(false);
        assert_eq!(store.commit_gap(), 0);
        assert_eq!(store.commit_version(), 1);
    }

    #[test]
    fn injected_replication_failure_surfaces_once() {
        let store = MemoryStore::new();
        store.fail_next_replication();
        let mut tx = store.begin();
        put(tx.as_mut(), "k", "v");
        assert_eq!(tx.commit(), CommitOutcome::NoReplicate);

        let mut tx = store.begin();
        put(tx.as_mut(), "k", "v");
        assert_eq!(tx.commit(), CommitOutcome::Ok);
    }
}
