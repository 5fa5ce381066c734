//! Consensus seam.
//!
//! The frontend never talks to the consensus implementation directly; it
//! reads leader identity, terms and commit progress through this trait.
//! The installed implementation is re-read from the store on every call
//! because it may be replaced during recovery.

use crate::nodes::NodeId;
use crate::store::Version;

/// Consensus term number.
pub type Term = u64;

/// Leader-based consensus as observed by the frontend.
pub trait Consensus: Send + Sync {
    /// This replica's consensus id.
    fn id(&self) -> NodeId;

    /// True iff this replica currently believes it is the leader.
    fn is_leader(&self) -> bool;

    /// The current leader's consensus id.
    fn leader(&self) -> NodeId;

    /// The current term.
    fn term(&self) -> Term;

    /// The term a given version was committed in.
    fn term_of(&self, version: Version) -> Term;

    /// The globally committed index.
    fn commit_idx(&self) -> Version;
}
