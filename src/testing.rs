//! Deterministic in-memory fakes for the capability traits in [`crate::traits`].
//!
//! Mirrors the teacher's approach of testing consensus logic against
//! hand-rolled mock wiring rather than a real DAG/storage/network stack (see
//! `highway_core::finality_detector::tests`, which builds small synthetic
//! vote DAGs directly). Everything here lives in memory and is infallible
//! except where a test explicitly wants to simulate a failure.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::convert::Infallible;

use crate::clock::{Instant, Tick};
use crate::context::Context;
use crate::message::{Justifications, Message};
use crate::traits::{Clock, Dag, EraStorage, ForkChoice, ForkChoiceResult, IsSynced, MessageProducer};

/// The `Context` implementation used throughout the crate's own tests:
/// plain integer hashes and validator ids, so test fixtures can be written
/// as literals instead of constructing real cryptographic types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestContext;

impl Context for TestContext {
    type Hash = u64;
    type ValidatorId = u32;
}

/// An in-memory DAG: a flat map from hash to message, plus an explicit
/// main-chain-parent map (kept separate from `justifications` because
/// main-chain ancestry is a DAG-level notion, not something a message
/// carries about itself beyond `main_parent` on blocks).
#[derive(Debug, Default)]
pub struct FakeDag<C: Context> {
    messages: HashMap<C::Hash, Message<C>>,
}

impl<C: Context> FakeDag<C> {
    pub fn new() -> Self {
        FakeDag { messages: HashMap::new() }
    }

    pub fn insert(&mut self, message: Message<C>) {
        self.messages.insert(message.hash(), message);
    }
}

impl<C: Context> Dag<C> for FakeDag<C> {
    type Error = Infallible;

    fn get(&self, hash: &C::Hash) -> Result<Option<Message<C>>, Self::Error> {
        Ok(self.messages.get(hash).cloned())
    }

    fn main_chain_parent(&self, hash: &C::Hash) -> Result<Option<C::Hash>, Self::Error> {
        Ok(self.messages.get(hash).and_then(|message| match message {
            Message::Block { main_parent, .. } => *main_parent,
            Message::Ballot { .. } => None,
        }))
    }

    fn is_main_chain_descendant(
        &self,
        ancestor: &C::Hash,
        descendant: &C::Hash,
    ) -> Result<bool, Self::Error> {
        let mut current = Some(*descendant);
        while let Some(hash) = current {
            if hash == *ancestor {
                return Ok(true);
            }
            current = self.main_chain_parent(&hash)?;
        }
        Ok(false)
    }

    fn any_justified(
        &self,
        from: &Message<C>,
        predicate: &dyn Fn(&Message<C>) -> bool,
    ) -> Result<bool, Self::Error> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<C::Hash> = from
            .justifications()
            .values()
            .flat_map(|hashes| hashes.iter().copied())
            .collect();
        while let Some(hash) = stack.pop() {
            if !seen.insert(hash) {
                continue;
            }
            if let Some(message) = self.messages.get(&hash) {
                if predicate(message) {
                    return Ok(true);
                }
                stack.extend(message.justifications().values().flat_map(|h| h.iter().copied()));
            }
        }
        Ok(false)
    }

    fn any_by_validator_in_round(
        &self,
        validator_id: C::ValidatorId,
        round_id: Tick,
        predicate: &dyn Fn(&Message<C>) -> bool,
    ) -> Result<bool, Self::Error> {
        Ok(self
            .messages
            .values()
            .any(|m| m.validator_id() == validator_id && m.round_id() == round_id && predicate(m)))
    }
}

/// In-memory era storage, keyed by key block hash.
#[derive(Debug, Default)]
pub struct FakeEraStorage<C: Context> {
    eras: HashMap<C::Hash, crate::era::Era<C>>,
}

impl<C: Context> FakeEraStorage<C> {
    pub fn new() -> Self {
        FakeEraStorage { eras: HashMap::new() }
    }
}

impl<C: Context> EraStorage<C> for FakeEraStorage<C> {
    type Error = Infallible;

    fn add_era(&mut self, era: crate::era::Era<C>) -> Result<(), Self::Error> {
        self.eras.entry(era.key_block_hash).or_insert(era);
        Ok(())
    }

    fn contains_era(&self, key_block_hash: &C::Hash) -> Result<bool, Self::Error> {
        Ok(self.eras.contains_key(key_block_hash))
    }
}

/// A fork-choice stub that always returns a fixed tip, settable per test.
#[derive(Debug)]
pub struct FakeForkChoice<C: Context> {
    result: ForkChoiceResult<C>,
}

impl<C: Context> FakeForkChoice<C> {
    pub fn new(main_parent: C::Hash) -> Self {
        FakeForkChoice {
            result: ForkChoiceResult { main_parent, justifications: Justifications::<C>::new() },
        }
    }

    pub fn with_justifications(main_parent: C::Hash, justifications: Justifications<C>) -> Self {
        FakeForkChoice { result: ForkChoiceResult { main_parent, justifications } }
    }
}

impl<C: Context> ForkChoice<C> for FakeForkChoice<C> {
    type Error = Infallible;

    fn from_key_block(&self, _key_block_hash: &C::Hash) -> Result<ForkChoiceResult<C>, Self::Error> {
        Ok(ForkChoiceResult {
            main_parent: self.result.main_parent,
            justifications: self.result.justifications.clone(),
        })
    }
}

/// A message producer whose hashes are an incrementing counter, so test
/// assertions can predict produced hashes without a real signature scheme.
#[derive(Debug)]
pub struct FakeMessageProducer<C: Context> {
    validator_id: C::ValidatorId,
    next_hash: u64,
    to_hash: fn(u64) -> C::Hash,
    magic_bit: bool,
}

impl<C: Context> FakeMessageProducer<C> {
    pub fn new(validator_id: C::ValidatorId, to_hash: fn(u64) -> C::Hash) -> Self {
        FakeMessageProducer { validator_id, next_hash: 1, to_hash, magic_bit: false }
    }

    pub fn set_next_magic_bit(&mut self, bit: bool) {
        self.magic_bit = bit;
    }

    fn fresh_hash(&mut self) -> C::Hash {
        let hash = (self.to_hash)(self.next_hash);
        self.next_hash += 1;
        hash
    }
}

impl<C: Context> MessageProducer<C> for FakeMessageProducer<C> {
    type Error = Infallible;

    fn block(
        &mut self,
        key_block_hash: C::Hash,
        round_id: Tick,
        main_parent: C::Hash,
        justifications: Justifications<C>,
        _is_booking_block: bool,
    ) -> Result<Message<C>, Self::Error> {
        let hash = self.fresh_hash();
        Ok(Message::Block {
            hash,
            validator_id: self.validator_id,
            round_id,
            key_block_hash,
            main_parent: Some(main_parent),
            justifications,
            magic_bit: self.magic_bit,
        })
    }

    fn ballot(
        &mut self,
        key_block_hash: C::Hash,
        round_id: Tick,
        target: C::Hash,
        justifications: Justifications<C>,
    ) -> Result<Message<C>, Self::Error> {
        let hash = self.fresh_hash();
        Ok(Message::Ballot {
            hash,
            validator_id: self.validator_id,
            round_id,
            key_block_hash,
            target,
            justifications,
            message_type: None,
        })
    }
}

/// A settable wall clock.
#[derive(Debug, Default)]
pub struct FakeClock {
    now: Cell<Instant>,
}

impl FakeClock {
    pub fn new(now: Instant) -> Self {
        FakeClock { now: Cell::new(now) }
    }

    pub fn set(&self, now: Instant) {
        self.now.set(now);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// A settable sync flag.
#[derive(Debug, Default)]
pub struct FakeIsSynced {
    synced: Cell<bool>,
}

impl FakeIsSynced {
    pub fn new(synced: bool) -> Self {
        FakeIsSynced { synced: Cell::new(synced) }
    }

    pub fn set(&self, synced: bool) {
        self.synced.set(synced);
    }
}

impl IsSynced for FakeIsSynced {
    fn get(&self) -> bool {
        self.synced.get()
    }
}

/// Builds a trivial bonded-validator map, for test fixtures.
pub fn bonds(stakes: &[(u32, u64)]) -> BTreeMap<u32, u64> {
    stakes.iter().copied().collect()
}
