//! Partitions an incoming message into the role it plays in the protocol:
//! lambda block, lambda-like ballot, lambda response, omega, or other.
//!
//! Classification reads only the message, the era's own leader/timing config,
//! and the DAG's justification graph (`Dag::any_justified`,
//! `Dag::any_by_validator_in_round`); it never consults the wall clock,
//! matching the requirement that classification be deterministic and
//! independent of when the message arrived.

use crate::clock::{HighwayConf, Tick};
use crate::context::Context;
use crate::era::Era;
use crate::leader::LeaderSequencer;
use crate::message::{Message, MessageType};
use crate::traits::Dag;

/// The role `classify` assigns to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    LambdaBlock,
    LambdaLikeBallot,
    LambdaResponse,
    Omega,
    Other,
}

/// Classifies `message` against `era`'s leader schedule and `dag`'s
/// justification graph. `conf` supplies `post_era_voting_duration`, the
/// window during which a post-era ballot from the round leader still
/// counts as lambda-like (spec.md section 4.5).
pub fn classify<C: Context, D: Dag<C>>(
    conf: &HighwayConf,
    era: &Era<C>,
    leaders: &LeaderSequencer<C>,
    dag: &D,
    message: &Message<C>,
) -> Result<Classification, D::Error> {
    let round_leader = leaders.leader(message.round_id());

    match message {
        Message::Block { round_id, .. } => {
            if Some(message.validator_id()) == round_leader && era.is_in_normal_period(*round_id) {
                Ok(Classification::LambdaBlock)
            } else {
                Ok(Classification::Other)
            }
        }
        Message::Ballot { round_id, target, .. } => {
            if era.is_in_post_era_voting_period(*round_id, conf.post_era_voting_duration)
                && Some(message.validator_id()) == round_leader
                && is_lambda_like_ballot(dag, message)?
            {
                return Ok(Classification::LambdaLikeBallot);
            }
            if Some(message.validator_id()) != round_leader && is_lambda_target(dag, *target, *round_id)? {
                return Ok(Classification::LambdaResponse);
            }
            Ok(Classification::Omega)
        }
    }
}

/// Whether `ballot` has no prior justification from its own author in its
/// own round: the first message from the leader in a round is lambda-like,
/// a later one in the same round is a follow-up (see `validate`'s double
/// lambda rule, which accepts exactly this follow-up case).
pub fn has_justification_in_own_round<C: Context, D: Dag<C>>(
    dag: &D,
    message: &Message<C>,
) -> Result<bool, D::Error> {
    let validator_id = message.validator_id();
    let round_id = message.round_id();
    dag.any_justified(message, &|candidate| {
        candidate.validator_id() == validator_id && candidate.round_id() == round_id
    })
}

fn is_lambda_like_ballot<C: Context, D: Dag<C>>(
    dag: &D,
    message: &Message<C>,
) -> Result<bool, D::Error> {
    Ok(!has_justification_in_own_round(dag, message)?)
}

/// Whether `target` is the lambda block of `round_id` cited by a ballot:
/// walks the ballot's direct justifications for a block at `round_id`
/// matching `target`, via the DAG.
fn is_lambda_target<C: Context, D: Dag<C>>(
    dag: &D,
    target: C::Hash,
    round_id: Tick,
) -> Result<bool, D::Error> {
    match dag.get(&target)? {
        Some(Message::Block { round_id: block_round, .. }) => Ok(block_round == round_id),
        _ => Ok(false),
    }
}

/// Whether the leader already has another lambda message (block or
/// lambda-like ballot) in `round_id`, distinct from `message` itself. Scans
/// the validating node's own knowledge of the DAG rather than `message`'s
/// justifications: two independent lambda blocks from an equivocating
/// leader need not cite each other, so a check limited to what `message`
/// itself admits citing would never catch that case.
pub fn has_other_lambda_message_in_same_round<C: Context, D: Dag<C>>(
    dag: &D,
    message: &Message<C>,
) -> Result<bool, D::Error> {
    let leader_id = message.validator_id();
    let round_id = message.round_id();
    let own_hash = message.hash();
    dag.any_by_validator_in_round(leader_id, round_id, &|candidate| {
        candidate.hash() != own_hash
            && matches!(
                (candidate, candidate.own_justification()),
                (Message::Block { .. }, _) | (Message::Ballot { .. }, None)
            )
    })
}

pub(crate) fn to_message_type(classification: Classification) -> Option<MessageType> {
    match classification {
        Classification::LambdaBlock => Some(MessageType::LambdaBlock),
        Classification::LambdaLikeBallot => Some(MessageType::LambdaLikeBallot),
        Classification::LambdaResponse => Some(MessageType::LambdaResponse),
        Classification::Omega => Some(MessageType::Omega),
        Classification::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Instant;
    use crate::testing::{bonds, FakeDag, TestContext};

    fn conf() -> HighwayConf {
        HighwayConf {
            tick_unit_millis: 1,
            genesis_era_start: Instant::from_millis(0),
            era_duration: 1000,
            booking_duration: 100,
            entropy_duration: 10,
            post_era_voting_duration: 50,
            omega_message_time_start: 0.5,
            omega_message_time_end: 1.0,
        }
    }

    fn era() -> Era<TestContext> {
        Era {
            start_tick: Tick::new(0),
            end_tick: Tick::new(1000),
            key_block_hash: 0,
            booking_block_hash: 0,
            leader_seed: 1,
            parent_key_block_hash: None,
            bonds: bonds(&[(1, 10), (2, 10)]),
        }
    }

    fn lambda_block(round_id: Tick, leader: u32, hash: u64) -> Message<TestContext> {
        Message::Block {
            hash,
            validator_id: leader,
            round_id,
            key_block_hash: 0,
            main_parent: None,
            justifications: Default::default(),
            magic_bit: false,
        }
    }

    #[test]
    fn block_from_round_leader_in_normal_period_is_lambda_block() {
        let e = era();
        let leaders = LeaderSequencer::from_era(&e);
        let round = Tick::new(10);
        let leader = leaders.leader(round).unwrap();
        let dag = FakeDag::<TestContext>::new();
        let block = lambda_block(round, leader, 1);
        assert_eq!(
            Classification::LambdaBlock,
            classify(&conf(), &e, &leaders, &dag, &block).unwrap()
        );
    }

    #[test]
    fn block_from_non_leader_is_other() {
        let e = era();
        let leaders = LeaderSequencer::from_era(&e);
        let round = Tick::new(10);
        let leader = leaders.leader(round).unwrap();
        let non_leader = if leader == 1 { 2 } else { 1 };
        let dag = FakeDag::<TestContext>::new();
        let block = lambda_block(round, non_leader, 1);
        assert_eq!(Classification::Other, classify(&conf(), &e, &leaders, &dag, &block).unwrap());
    }

    #[test]
    fn ballot_citing_lambda_block_from_non_leader_is_lambda_response() {
        let e = era();
        let leaders = LeaderSequencer::from_era(&e);
        let round = Tick::new(10);
        let leader = leaders.leader(round).unwrap();
        let non_leader = if leader == 1 { 2 } else { 1 };
        let mut dag = FakeDag::<TestContext>::new();
        dag.insert(lambda_block(round, leader, 1));
        let ballot = Message::Ballot {
            hash: 2,
            validator_id: non_leader,
            round_id: round,
            key_block_hash: 0,
            target: 1,
            justifications: Default::default(),
            message_type: None,
        };
        assert_eq!(
            Classification::LambdaResponse,
            classify(&conf(), &e, &leaders, &dag, &ballot).unwrap()
        );
    }

    #[test]
    fn leader_ballot_inside_voting_window_is_lambda_like() {
        let e = era();
        let leaders = LeaderSequencer::from_era(&e);
        let round = Tick::new(e.end_tick.value() + 10); // inside the 50-tick window
        let leader = leaders.leader(round).unwrap();
        let dag = FakeDag::<TestContext>::new();
        let ballot = Message::Ballot {
            hash: 1,
            validator_id: leader,
            round_id: round,
            key_block_hash: 0,
            target: 0,
            justifications: Default::default(),
            message_type: None,
        };
        assert_eq!(
            Classification::LambdaLikeBallot,
            classify(&conf(), &e, &leaders, &dag, &ballot).unwrap()
        );
    }

    #[test]
    fn leader_ballot_after_voting_window_closed_is_not_lambda_like() {
        let e = era();
        let leaders = LeaderSequencer::from_era(&e);
        // post_era_voting_duration is 50; this round is long past it.
        let round = Tick::new(e.end_tick.value() + 500);
        let leader = leaders.leader(round).unwrap();
        let dag = FakeDag::<TestContext>::new();
        let ballot = Message::Ballot {
            hash: 1,
            validator_id: leader,
            round_id: round,
            key_block_hash: 0,
            target: 0,
            justifications: Default::default(),
            message_type: None,
        };
        assert_ne!(
            Classification::LambdaLikeBallot,
            classify(&conf(), &e, &leaders, &dag, &ballot).unwrap()
        );
    }

    #[test]
    fn two_non_citing_lambda_blocks_from_leader_are_each_detected_as_other_lambda() {
        let e = era();
        let leaders = LeaderSequencer::from_era(&e);
        let round = Tick::new(10);
        let leader = leaders.leader(round).unwrap();
        let first = lambda_block(round, leader, 1);
        let second = lambda_block(round, leader, 2); // independent: cites nothing
        let mut dag = FakeDag::<TestContext>::new();
        dag.insert(first);
        dag.insert(second.clone());
        assert!(has_other_lambda_message_in_same_round(&dag, &second).unwrap());
    }
}
