//! Protocol rule checks, in the order spec'd: non-leader lambda block, then
//! double lambda. Doppelganger detection (rule 1) needs no DAG access — only
//! the local validator's own id and the message's — so it happens one layer
//! up, in `EraRuntime::validate`, where it can be surfaced as the fatal
//! [`crate::error::RuntimeError::Doppelganger`] it actually is rather than a
//! soft per-message rejection.

use crate::classify::{self, Classification};
use crate::clock::HighwayConf;
use crate::context::Context;
use crate::era::Era;
use crate::error::ValidationError;
use crate::leader::LeaderSequencer;
use crate::message::Message;
use crate::traits::Dag;

/// Validates `message` against the leader and double-lambda rules, in order.
pub fn validate<C: Context, D: Dag<C>>(
    conf: &HighwayConf,
    era: &Era<C>,
    leaders: &LeaderSequencer<C>,
    dag: &D,
    message: &Message<C>,
) -> Result<(), ValidateFailure<D::Error>> {
    let round_leader = leaders.leader(message.round_id());
    if message.is_block() && Some(message.validator_id()) != round_leader {
        return Err(ValidateFailure::Rule(ValidationError::NotFromLeader));
    }

    let classification =
        classify::classify(conf, era, leaders, dag, message).map_err(ValidateFailure::Dag)?;
    if matches!(classification, Classification::LambdaBlock | Classification::LambdaLikeBallot) {
        let leader_has_other_lambda = classify::has_other_lambda_message_in_same_round(dag, message)
            .map_err(ValidateFailure::Dag)?;
        if leader_has_other_lambda {
            return Err(ValidateFailure::Rule(ValidationError::DoubleLambda));
        }
    }

    Ok(())
}

/// Either a soft protocol rejection, or a DAG read failure encountered while
/// computing one. A DAG failure here is itself a hard condition (see
/// `RuntimeError::Dag`); the caller decides how to convert it.
#[derive(Debug)]
pub enum ValidateFailure<E> {
    Rule(ValidationError),
    Dag(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Instant, Tick};
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

    fn block(round_id: Tick, validator_id: u32, hash: u64) -> Message<TestContext> {
        Message::Block {
            hash,
            validator_id,
            round_id,
            key_block_hash: 0,
            main_parent: None,
            justifications: Default::default(),
            magic_bit: false,
        }
    }

    #[test]
    fn non_leader_block_is_rejected() {
        let e = era();
        let leaders = LeaderSequencer::from_era(&e);
        let round = Tick::new(10);
        let leader = leaders.leader(round).unwrap();
        let non_leader = if leader == 1 { 2 } else { 1 };
        let dag = FakeDag::<TestContext>::new();
        let msg = block(round, non_leader, 1);
        let result = validate(&conf(), &e, &leaders, &dag, &msg);
        assert!(matches!(result, Err(ValidateFailure::Rule(ValidationError::NotFromLeader))));
    }

    #[test]
    fn second_independent_lambda_block_by_leader_is_rejected() {
        let e = era();
        let leaders = LeaderSequencer::from_era(&e);
        let round = Tick::new(10);
        let leader = leaders.leader(round).unwrap();
        let mut dag = FakeDag::<TestContext>::new();
        let first = block(round, leader, 1);
        dag.insert(first);
        // Independent: the second lambda block does not cite the first.
        let second = block(round, leader, 2);
        let result = validate(&conf(), &e, &leaders, &dag, &second);
        assert!(matches!(result, Err(ValidateFailure::Rule(ValidationError::DoubleLambda))));
    }

    #[test]
    fn valid_lambda_block_is_accepted() {
        let e = era();
        let leaders = LeaderSequencer::from_era(&e);
        let round = Tick::new(10);
        let leader = leaders.leader(round).unwrap();
        let dag = FakeDag::<TestContext>::new();
        let msg = block(round, leader, 1);
        assert!(validate(&conf(), &e, &leaders, &dag, &msg).is_ok());
    }
}
