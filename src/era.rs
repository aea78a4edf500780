//! The `Era` data model: an immutable record of one era's boundaries, seed
//! and bonded validator set.

use std::collections::BTreeMap;

use datasize::DataSize;

use crate::clock::Tick;
use crate::context::Context;

/// An immutable description of one era. Its identity is its `key_block_hash`:
/// two `Era` values with the same key block hash are considered the same
/// era, regardless of how their other fields compare (they shouldn't differ).
#[derive(Debug, Clone)]
pub struct Era<C: Context> {
    pub start_tick: Tick,
    pub end_tick: Tick,
    pub key_block_hash: C::Hash,
    pub booking_block_hash: C::Hash,
    pub leader_seed: u64,
    pub parent_key_block_hash: Option<C::Hash>,
    pub bonds: BTreeMap<C::ValidatorId, u64>,
}

impl<C: Context> PartialEq for Era<C> {
    fn eq(&self, other: &Self) -> bool {
        self.key_block_hash == other.key_block_hash
    }
}

impl<C: Context> Eq for Era<C> {}

impl<C: Context> Era<C> {
    /// The total stake bonded in this era.
    pub fn total_stake(&self) -> u64 {
        self.bonds.values().sum()
    }

    /// Whether `validator_id` is bonded in this era.
    pub fn is_bonded(&self, validator_id: &C::ValidatorId) -> bool {
        self.bonds.contains_key(validator_id)
    }

    /// The length, in ticks, of this era's nominal (pre-switch) period.
    pub fn duration(&self) -> i64 {
        self.end_tick.value() - self.start_tick.value()
    }

    /// Whether `tick` lies within the era's normal (pre-switch) period.
    pub fn is_in_normal_period(&self, tick: Tick) -> bool {
        tick >= self.start_tick && tick < self.end_tick
    }

    /// Whether `tick` lies within the post-era voting period, given the
    /// configured voting-window duration.
    pub fn is_in_post_era_voting_period(&self, tick: Tick, post_era_voting_duration: i64) -> bool {
        tick >= self.end_tick && tick < self.end_tick + post_era_voting_duration
    }
}

impl<C: Context> DataSize for Era<C>
where
    C::Hash: DataSize,
    C::ValidatorId: DataSize,
{
    const IS_DYNAMIC: bool = true;
    const STATIC_HEAP_SIZE: usize = 0;

    fn estimate_heap_size(&self) -> usize {
        let Era {
            start_tick: _,
            end_tick: _,
            key_block_hash,
            booking_block_hash,
            leader_seed: _,
            parent_key_block_hash,
            bonds,
        } = self;
        key_block_hash.estimate_heap_size()
            + booking_block_hash.estimate_heap_size()
            + parent_key_block_hash.estimate_heap_size()
            + bonds
                .iter()
                .map(|(k, v)| k.estimate_heap_size() + v.estimate_heap_size())
                .sum::<usize>()
    }
}
