//! Capability traits for the runtime's external collaborators.
//!
//! These mirror the way `casper-node`'s `EraSupervisor` only ever talks to
//! the rest of the node through an `EffectBuilder` (see
//! `components/consensus/era_supervisor.rs`): the runtime here never touches
//! a concrete DAG, storage engine or network stack, only these narrow
//! interfaces. Implementations are free to block internally; from the
//! runtime's point of view every call is synchronous.

use std::error::Error as StdError;

use crate::clock::{Instant, Tick};
use crate::context::Context;
use crate::message::Message;

/// Read access to the message DAG: hash lookups and main-chain ancestry.
pub trait Dag<C: Context> {
    type Error: StdError + Send + Sync + 'static;

    /// Looks up a message by hash. Must be total for any hash the runtime
    /// has previously seen as a justification.
    fn get(&self, hash: &C::Hash) -> Result<Option<Message<C>>, Self::Error>;

    /// Returns the main-chain parent of `hash`, if any.
    fn main_chain_parent(&self, hash: &C::Hash) -> Result<Option<C::Hash>, Self::Error>;

    /// Whether `descendant` is a main-chain descendant of (or equal to) `ancestor`.
    fn is_main_chain_descendant(
        &self,
        ancestor: &C::Hash,
        descendant: &C::Hash,
    ) -> Result<bool, Self::Error>;

    /// Whether any message reachable from `from`'s justifications (inclusive)
    /// satisfies `predicate`. Used to implement `hasJustificationInOwnRound`
    /// from spec.md section 4.6 — a check over what `from` itself admits to
    /// citing, not over the validating node's full view of the DAG.
    fn any_justified(
        &self,
        from: &Message<C>,
        predicate: &dyn Fn(&Message<C>) -> bool,
    ) -> Result<bool, Self::Error>;

    /// Whether this node's own DAG contains any message from `validator_id`
    /// in `round_id` satisfying `predicate`, independent of what any
    /// particular message cites as justification. Used to implement
    /// `hasOtherLambdaMessageInSameRound` (spec.md section 4.6, rule 3):
    /// an equivocating leader's two lambda messages need not cite each
    /// other, so detecting the second one requires scanning the node's own
    /// knowledge of the round, not just one message's justification closure.
    fn any_by_validator_in_round(
        &self,
        validator_id: C::ValidatorId,
        round_id: Tick,
        predicate: &dyn Fn(&Message<C>) -> bool,
    ) -> Result<bool, Self::Error>;
}

/// Era persistence: idempotent creation and membership lookup.
pub trait EraStorage<C: Context> {
    type Error: StdError + Send + Sync + 'static;

    /// Adds `era` if not already present. Idempotent on `key_block_hash`.
    fn add_era(&mut self, era: crate::era::Era<C>) -> Result<(), Self::Error>;

    /// Whether an era with this key block hash has already been created.
    fn contains_era(&self, key_block_hash: &C::Hash) -> Result<bool, Self::Error>;
}

/// The result of asking fork choice for the current tip, used when producing
/// the next block.
#[derive(Debug)]
pub struct ForkChoiceResult<C: Context> {
    pub main_parent: C::Hash,
    pub justifications: crate::message::Justifications<C>,
}

/// Computes the fork-choice tip for a given key block.
pub trait ForkChoice<C: Context> {
    type Error: StdError + Send + Sync + 'static;

    fn from_key_block(&self, key_block_hash: &C::Hash) -> Result<ForkChoiceResult<C>, Self::Error>;
}

/// Signs and hashes newly produced messages.
pub trait MessageProducer<C: Context> {
    type Error: StdError + Send + Sync + 'static;

    #[allow(clippy::too_many_arguments)]
    fn block(
        &mut self,
        key_block_hash: C::Hash,
        round_id: Tick,
        main_parent: C::Hash,
        justifications: crate::message::Justifications<C>,
        is_booking_block: bool,
    ) -> Result<Message<C>, Self::Error>;

    fn ballot(
        &mut self,
        key_block_hash: C::Hash,
        round_id: Tick,
        target: C::Hash,
        justifications: crate::message::Justifications<C>,
    ) -> Result<Message<C>, Self::Error>;
}

/// The wall clock.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// A snapshot-valued flag indicating whether initial sync has completed.
/// Must be safe to read concurrently with writes by the syncing subsystem.
pub trait IsSynced {
    fn get(&self) -> bool;
}
