//! Trait seam over the replicated transactional store.
//!
//! The store engine itself lives outside this crate; the frontend drives it
//! through the object-safe [`Store`] and [`Transaction`] traits defined
//! here. Maps are untyped byte-to-byte at the trait boundary; the typed
//! layer ([`TypedMap`], [`MapView`]) encodes keys and values with
//! MessagePack on top of it.
//!
//! Every request opens a fresh transaction. Commit outcomes are `Ok`,
//! `Conflict` (optimistic-concurrency clash, the executor retries) and
//! `NoReplicate` (committed locally but refused by replication, surfaced
//! as an error to the caller).

mod memory;

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::consensus::Consensus;
use crate::history::RequestId;
use crate::history::TxHistory;

pub use memory::MemoryStore;

/// Store version number. Version 0 means "nothing committed yet".
pub type Version = u64;

/// Outcome of committing a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The transaction committed.
    Ok,
    /// Another writer invalidated this transaction's reads; re-execute.
    Conflict,
    /// The transaction could not be replicated.
    NoReplicate,
}

/// Failure in the typed codec layer over a store map.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A key or value could not be encoded for storage.
    #[error("failed to encode {what} for map '{map}': {reason}")]
    Encode {
        /// What was being encoded ("key" or "value").
        what: &'static str,
        /// Map name.
        map: &'static str,
        /// Encoder diagnostic.
        reason: String,
    },
    /// A stored value could not be decoded.
    #[error("failed to decode {what} from map '{map}': {reason}")]
    Decode {
        /// What was being decoded ("key" or "value").
        what: &'static str,
        /// Map name.
        map: &'static str,
        /// Decoder diagnostic.
        reason: String,
    },
}

/// A transaction over the replicated store.
///
/// Reads observe a consistent snapshot; writes are buffered until
/// [`Transaction::commit`]. After a `Conflict` outcome the transaction is
/// reset and may be re-executed.
pub trait Transaction: Send {
    /// Read a raw value, recording the read for conflict validation.
    fn get(&mut self, map: &str, key: &[u8]) -> Option<Vec<u8>>;

    /// Buffer a raw write.
    fn put(&mut self, map: &str, key: &[u8], value: &[u8]);

    /// Visit every entry of a map (buffered writes included). The visitor
    /// returns `false` to stop early.
    fn for_each(&mut self, map: &str, visit: &mut dyn FnMut(&[u8], &[u8]) -> bool);

    /// Validate reads and apply writes.
    fn commit(&mut self) -> CommitOutcome;

    /// Version assigned by a successful writing commit.
    fn commit_version(&self) -> Option<Version>;

    /// Snapshot version the transaction read at, if it read anything.
    fn read_version(&self) -> Option<Version>;

    /// Associate the originating request with this transaction so the
    /// history subsystem can attribute the resulting log entries.
    fn set_request_id(&mut self, id: RequestId);
}

/// The replicated store as seen by the frontend.
///
/// The installed consensus and history implementations may change over the
/// store's lifetime (for example during recovery), so the frontend
/// re-reads them on every call rather than holding references.
pub trait Store: Send + Sync {
    /// Open a fresh transaction.
    fn begin(&self) -> Box<dyn Transaction>;

    /// Latest locally committed version.
    fn current_version(&self) -> Version;

    /// Latest globally committed (replicated) version.
    fn commit_version(&self) -> Version;

    /// Number of locally committed versions not yet globally committed.
    fn commit_gap(&self) -> u64;

    /// Currently installed consensus, if any.
    fn consensus(&self) -> Option<Arc<dyn Consensus>>;

    /// Currently installed history, if any.
    fn history(&self) -> Option<Arc<dyn TxHistory>>;
}

/// Handle naming a typed map in the store.
///
/// Handles are plain names plus phantom key/value types; all state lives in
/// the store. Declare them as constants next to the types they store.
pub struct TypedMap<K, V> {
    name: &'static str,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> TypedMap<K, V> {
    /// Declare a handle for the map called `name`.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The map's name in the store.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Open a typed view over this map within `tx`.
    pub fn view<'t>(&self, tx: &'t mut dyn Transaction) -> MapView<'t, K, V> {
        MapView {
            name: self.name,
            tx,
            _marker: PhantomData,
        }
    }
}

impl<K, V> Clone for TypedMap<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for TypedMap<K, V> {}

impl<K, V> std::fmt::Debug for TypedMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedMap").field("name", &self.name).finish()
    }
}

/// Typed view over one map within a transaction.
pub struct MapView<'t, K, V> {
    name: &'static str,
    tx: &'t mut dyn Transaction,
    _marker: PhantomData<(K, V)>,
}

pub(crate) fn encode_key<K: Serialize>(
    map: &'static str,
    key: &K,
) -> Result<Vec<u8>, StoreError> {
    rmp_serde::to_vec(key).map_err(|e| StoreError::Encode {
        what: "key",
        map,
        reason: e.to_string(),
    })
}

pub(crate) fn encode_value<V: Serialize>(
    map: &'static str,
    value: &V,
) -> Result<Vec<u8>, StoreError> {
    rmp_serde::to_vec_named(value).map_err(|e| StoreError::Encode {
        what: "value",
        map,
        reason: e.to_string(),
    })
}

pub(crate) fn decode_value<V: DeserializeOwned>(
    map: &'static str,
    bytes: &[u8],
) -> Result<V, StoreError> {
    rmp_serde::from_slice(bytes).map_err(|e| StoreError::Decode {
        what: "value",
        map,
        reason: e.to_string(),
    })
}

impl<K: Serialize + DeserializeOwned, V: Serialize + DeserializeOwned> MapView<'_, K, V> {
    /// Look up `key`.
    pub fn get(&mut self, key: &K) -> Result<Option<V>, StoreError> {
        let raw_key = encode_key(self.name, key)?;
        match self.tx.get(self.name, &raw_key) {
            None => Ok(None),
            Some(raw_value) => decode_value(self.name, &raw_value).map(Some),
        }
    }

    /// Insert or replace `key`.
    pub fn put(&mut self, key: &K, value: &V) -> Result<(), StoreError> {
        let raw_key = encode_key(self.name, key)?;
        let raw_value = encode_value(self.name, value)?;
        self.tx.put(self.name, &raw_key, &raw_value);
        Ok(())
    }

    /// Visit every entry. The visitor returns `false` to stop early.
    /// Entries that fail to decode are skipped.
    pub fn for_each(&mut self, mut visit: impl FnMut(K, V) -> bool) -> Result<(), StoreError> {
        let name = self.name;
        self.tx.for_each(name, &mut |raw_key, raw_value| {
            let key: K = match rmp_serde::from_slice(raw_key) {
                Ok(key) => key,
                Err(_) => return true,
            };
            let value: V = match decode_value(name, raw_value) {
                Ok(value) => value,
                Err(_) => return true,
            };
            visit(key, value)
        });
        Ok(())
    }
}
