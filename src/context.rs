//! The `Context` trait fixes the concrete hash and validator-id types used
//! throughout a Highway instance, the same way `casper-node`'s consensus
//! module is generic over a `Context` so that the core protocol logic never
//! has to know about the node's actual signature scheme.

use std::fmt::Debug;
use std::hash::Hash as StdHash;

/// Fixes the associated types a Highway era runtime is built from.
///
/// Implementors plug in their own hash and validator-id representations; the
/// runtime only ever needs to compare, hash, and order them.
pub trait Context: Clone + Debug + Eq + 'static {
    /// The hash type identifying blocks, ballots and key/booking blocks.
    type Hash: Copy + Clone + Debug + Eq + Ord + StdHash + Send + Sync;
    /// The type identifying a validator.
    type ValidatorId: Copy + Clone + Debug + Eq + Ord + StdHash + Send + Sync;
}
