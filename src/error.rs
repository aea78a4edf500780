//! The runtime's two-level error hierarchy.
//!
//! Soft/protocol errors ([`ValidationError`]) are returned by `validate` as a
//! plain `Err`; they never halt anything and are never logged above `debug!`.
//! Hard/internal errors ([`RuntimeError`]) indicate a configuration or relay
//! bug and are expected to cause the outer layer to stop feeding this runtime
//! instance further input.

use thiserror::Error;

/// A message failed one of the protocol rules in `validate`. The `Display`
/// text for each variant is the exact reason string the wire protocol
/// expects to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The block is not coming from the leader of the round.")]
    NotFromLeader,
    #[error("The leader has already sent a lambda message in this round.")]
    DoubleLambda,
}

/// A hard failure: the runtime cannot continue handling the current input.
/// The caller must treat the era runtime instance as dead.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A message purporting to come from this runtime's own validator id
    /// arrived through the relay layer. Unlike the rules in
    /// [`ValidationError`], this can never be the sender's fault — it means
    /// either the relay is echoing our own output back to us, or another
    /// process is signing under our identity. Fatal: the runtime must halt
    /// rather than keep validating against a compromised or misconfigured
    /// feed.
    #[error("The block is coming from a doppelganger.")]
    Doppelganger,
    #[error("received our own message back from the relay layer")]
    SelfMessageReplayed,
    #[error("DAG lookup failed: {0}")]
    Dag(String),
    #[error("era storage operation failed: {0}")]
    EraStorage(String),
    #[error("inconsistent protocol state: {0}")]
    InconsistentState(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
