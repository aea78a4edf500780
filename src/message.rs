//! The wire message model: blocks and ballots, and the justification sets
//! that tie them to the DAG.

use std::collections::{BTreeMap, BTreeSet};

use datasize::DataSize;

use crate::clock::Tick;
use crate::context::Context;

/// The kind of ballot, as classified by [`crate::classify`]. Carried on the
/// message itself is only the raw variant (`Block`/`Ballot`); this is the
/// *observed* classification, attached after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    LambdaBlock,
    LambdaLikeBallot,
    LambdaResponse,
    Omega,
}

/// A map from validator to the set of that validator's messages the sender
/// has seen and cites as justification.
pub type Justifications<C> = BTreeMap<<C as Context>::ValidatorId, BTreeSet<<C as Context>::Hash>>;

/// A message received from, or produced for, the network.
#[derive(Debug, Clone)]
pub enum Message<C: Context> {
    Block {
        hash: C::Hash,
        validator_id: C::ValidatorId,
        round_id: Tick,
        key_block_hash: C::Hash,
        main_parent: Option<C::Hash>,
        justifications: Justifications<C>,
        magic_bit: bool,
    },
    Ballot {
        hash: C::Hash,
        validator_id: C::ValidatorId,
        round_id: Tick,
        key_block_hash: C::Hash,
        target: C::Hash,
        justifications: Justifications<C>,
        message_type: Option<MessageType>,
    },
}

impl<C: Context> Message<C> {
    pub fn hash(&self) -> C::Hash {
        match self {
            Message::Block { hash, .. } => *hash,
            Message::Ballot { hash, .. } => *hash,
        }
    }

    pub fn validator_id(&self) -> C::ValidatorId {
        match self {
            Message::Block { validator_id, .. } => *validator_id,
            Message::Ballot { validator_id, .. } => *validator_id,
        }
    }

    pub fn round_id(&self) -> Tick {
        match self {
            Message::Block { round_id, .. } => *round_id,
            Message::Ballot { round_id, .. } => *round_id,
        }
    }

    pub fn key_block_hash(&self) -> C::Hash {
        match self {
            Message::Block { key_block_hash, .. } => *key_block_hash,
            Message::Ballot { key_block_hash, .. } => *key_block_hash,
        }
    }

    pub fn justifications(&self) -> &Justifications<C> {
        match self {
            Message::Block { justifications, .. } => justifications,
            Message::Ballot { justifications, .. } => justifications,
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Message::Block { .. })
    }

    pub fn is_ballot(&self) -> bool {
        matches!(self, Message::Ballot { .. })
    }

    /// The hash this message cites as its own author's latest prior message,
    /// if any (its own entry in its justifications).
    pub fn own_justification(&self) -> Option<C::Hash> {
        self.justifications()
            .get(&self.validator_id())
            .and_then(|hashes| hashes.iter().next().copied())
    }
}

impl<C: Context> DataSize for Message<C>
where
    C::Hash: DataSize,
    C::ValidatorId: DataSize,
{
    const IS_DYNAMIC: bool = true;
    const STATIC_HEAP_SIZE: usize = 0;

    fn estimate_heap_size(&self) -> usize {
        let justifications_size = |j: &Justifications<C>| {
            j.iter()
                .map(|(v, hashes)| {
                    v.estimate_heap_size()
                        + hashes.iter().map(DataSize::estimate_heap_size).sum::<usize>()
                })
                .sum::<usize>()
        };
        match self {
            Message::Block { hash, validator_id, key_block_hash, main_parent, justifications, .. } => {
                hash.estimate_heap_size()
                    + validator_id.estimate_heap_size()
                    + key_block_hash.estimate_heap_size()
                    + main_parent.estimate_heap_size()
                    + justifications_size(justifications)
            }
            Message::Ballot { hash, validator_id, key_block_hash, target, justifications, .. } => {
                hash.estimate_heap_size()
                    + validator_id.estimate_heap_size()
                    + key_block_hash.estimate_heap_size()
                    + target.estimate_heap_size()
                    + justifications_size(justifications)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    fn block() -> Message<TestContext> {
        Message::Block {
            hash: 1,
            validator_id: 1,
            round_id: Tick::new(0),
            key_block_hash: 0,
            main_parent: None,
            justifications: Justifications::<TestContext>::new(),
            magic_bit: false,
        }
    }

    #[test]
    fn accessors_match_variant_fields() {
        let b = block();
        assert_eq!(1, b.hash());
        assert_eq!(1, b.validator_id());
        assert!(b.is_block());
        assert!(!b.is_ballot());
    }

    #[test]
    fn own_justification_reads_creators_entry() {
        let mut justifications = Justifications::<TestContext>::new();
        justifications.insert(1, vec![99].into_iter().collect());
        let ballot: Message<TestContext> = Message::Ballot {
            hash: 2,
            validator_id: 1,
            round_id: Tick::new(0),
            key_block_hash: 0,
            target: 1,
            justifications,
            message_type: None,
        };
        assert_eq!(Some(99), ballot.own_justification());
    }
}
