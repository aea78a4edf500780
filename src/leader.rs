//! Stake-weighted pseudo-random leader selection.
//!
//! Hashing mirrors `EraSupervisor::era_seed`/`instance_id`
//! (`components/consensus/era_supervisor.rs`): a `VarBlake2b` hasher fed a
//! domain-separation tag plus the inputs, truncated to a `u64`.

use std::collections::BTreeMap;

use blake2::digest::{Update, VariableOutput};
use blake2::VarBlake2b;

use crate::clock::Tick;
use crate::context::Context;
use crate::era::Era;

const LEADER_DOMAIN_TAG: &[u8] = b"highway-era-runtime:leader";
const SEED_DOMAIN_TAG: &[u8] = b"highway-era-runtime:seed";

/// Selects the round leader for an era's bonded validator set.
///
/// Construction is cheap (`BTreeMap::clone`); instances are meant to be built
/// once per era and reused across rounds.
#[derive(Debug, Clone)]
pub struct LeaderSequencer<C: Context> {
    leader_seed: u64,
    cumulative_stakes: Vec<(C::ValidatorId, u64)>,
    total_stake: u64,
}

impl<C: Context> LeaderSequencer<C> {
    /// Builds a sequencer from an era's seed and bonded stakes. Bonds are
    /// iterated in `BTreeMap` (validator-id-ascending) order so every node
    /// computes the same cumulative intervals.
    pub fn new(leader_seed: u64, bonds: &BTreeMap<C::ValidatorId, u64>) -> Self {
        let mut cumulative = 0u64;
        let cumulative_stakes = bonds
            .iter()
            .map(|(&validator_id, &stake)| {
                cumulative += stake;
                (validator_id, cumulative)
            })
            .collect();
        LeaderSequencer {
            leader_seed,
            cumulative_stakes,
            total_stake: cumulative,
        }
    }

    pub fn from_era(era: &Era<C>) -> Self {
        Self::new(era.leader_seed, &era.bonds)
    }

    /// The leader of `round_id`, or `None` if no validator is bonded.
    pub fn leader(&self, round_id: Tick) -> Option<C::ValidatorId> {
        if self.total_stake == 0 {
            return None;
        }
        let draw = hash_to_u64(LEADER_DOMAIN_TAG, &[
            &self.leader_seed.to_le_bytes(),
            &round_id.value().to_le_bytes(),
        ]) % self.total_stake;
        self.cumulative_stakes
            .iter()
            .find(|&&(_, cumulative)| draw < cumulative)
            .map(|&(validator_id, _)| validator_id)
    }
}

/// Derives a child era's leader seed from its parent's seed and the magic
/// bits collected from the booking block through the key block (inclusive).
pub fn seed(parent_leader_seed: u64, magic_bits: &[bool]) -> u64 {
    let packed: Vec<u8> = magic_bits.iter().map(|&bit| bit as u8).collect();
    hash_to_u64(SEED_DOMAIN_TAG, &[&parent_leader_seed.to_le_bytes(), &packed])
}

fn hash_to_u64(domain_tag: &[u8], inputs: &[&[u8]]) -> u64 {
    let mut hasher = VarBlake2b::new(8).expect("blake2 supports 8-byte output");
    hasher.update(domain_tag);
    for input in inputs {
        hasher.update(input);
    }
    let mut result = [0u8; 8];
    hasher.finalize_variable(|slice| result.copy_from_slice(slice));
    u64::from_le_bytes(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    fn bonds(stakes: &[(u32, u64)]) -> BTreeMap<u32, u64> {
        stakes.iter().copied().collect()
    }

    #[test]
    fn leader_is_deterministic() {
        let sequencer = LeaderSequencer::<TestContext>::new(42, &bonds(&[(1, 10), (2, 20), (3, 30)]));
        let first = sequencer.leader(Tick::new(5));
        let second = sequencer.leader(Tick::new(5));
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn no_bonds_means_no_leader() {
        let sequencer = LeaderSequencer::<TestContext>::new(42, &BTreeMap::new());
        assert_eq!(None, sequencer.leader(Tick::new(0)));
    }

    #[test]
    fn different_rounds_can_pick_different_leaders() {
        let sequencer = LeaderSequencer::<TestContext>::new(7, &bonds(&[(1, 1), (2, 1), (3, 1)]));
        let leaders: std::collections::BTreeSet<_> =
            (0..50).map(|r| sequencer.leader(Tick::new(r))).collect();
        // With three equally-staked validators and 50 rounds, we expect more
        // than one leader to show up; this is not a tight statistical claim,
        // just a smoke test against an accidental constant function.
        assert!(leaders.len() > 1);
    }

    #[test]
    fn seed_is_deterministic_and_sensitive_to_magic_bits() {
        let a = seed(1, &[true, false, true]);
        let b = seed(1, &[true, false, true]);
        let c = seed(1, &[true, true, true]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    /// Stake-weighted sampling is roughly proportional over many rounds: a
    /// validator with ten times another's stake should be picked roughly ten
    /// times as often. Seeded with a fixed `rand_pcg::Pcg32` so the round
    /// numbers this draws from are reproducible across CI runs.
    #[test]
    fn leader_selection_is_roughly_proportional_to_stake() {
        use rand::Rng;
        use rand_pcg::Pcg32;

        let sequencer = LeaderSequencer::<TestContext>::new(99, &bonds(&[(1, 1), (2, 9)]));
        let mut rng = Pcg32::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7);
        let mut validator_2_wins = 0u32;
        let rounds = 2000;
        for _ in 0..rounds {
            let round = Tick::new(rng.gen_range(0..1_000_000));
            if sequencer.leader(round) == Some(2) {
                validator_2_wins += 1;
            }
        }
        let observed_fraction = f64::from(validator_2_wins) / f64::from(rounds);
        assert!((0.8..0.95).contains(&observed_fraction), "observed {}", observed_fraction);
    }
}
