//! `EraRuntime`: the single-era deterministic state machine that ties the
//! rest of the crate together. Owns its `Era` for the runtime's lifetime and
//! drives validation, message handling, agenda evolution and child-era
//! construction against the capability traits in [`crate::traits`].

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::agenda::{Action, Agenda};
use crate::boundaries::EraBoundaries;
use crate::classify::{self, Classification};
use crate::clock::{HighwayConf, Tick, TickClock};
use crate::context::Context;
use crate::era::Era;
use crate::error::{RuntimeError, RuntimeResult, ValidationError};
use crate::event::{EventLog, HighwayEvent};
use crate::leader::{self, LeaderSequencer};
use crate::message::{Justifications, Message};
use crate::traits::{Clock, Dag, EraStorage, ForkChoice, IsSynced, MessageProducer};
use crate::validate::{self, ValidateFailure};

/// Per-bonded-validator observation of whether it produced a lambda response
/// and an omega ballot in the most recently completed round. Read-only
/// introspection; does not affect protocol behavior. See SPEC_FULL.md,
/// "Supplemented features", item 1.
#[derive(Debug, Clone)]
pub struct Participation<C: Context> {
    pub round_id: Option<Tick>,
    pub responded: Vec<C::ValidatorId>,
    pub omega_sent: Vec<C::ValidatorId>,
}

impl<C: Context> Default for Participation<C> {
    fn default() -> Self {
        Participation {
            round_id: None,
            responded: Vec::new(),
            omega_sent: Vec::new(),
        }
    }
}

/// The output of one call into the runtime: the events produced, and any
/// new agenda items the outer scheduler should merge into its own schedule.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOutput<C: Context> {
    pub events: EventLog<C>,
    pub agenda: Agenda,
}

impl<C: Context> RuntimeOutput<C> {
    fn empty() -> Self {
        RuntimeOutput { events: EventLog::new(), agenda: Agenda::empty() }
    }
}

/// Construction inputs for an `EraRuntime`, per spec.md section 6.
pub struct RuntimeConfig<C: Context> {
    pub conf: HighwayConf,
    pub era: Era<C>,
    pub round_exponent: u8,
    pub own_id: Option<C::ValidatorId>,
}

/// Owns one era's worth of consensus state and the capabilities it needs to
/// drive the protocol. Generic over the capability implementations so tests
/// can plug in the fakes from [`crate::testing`] and production code can
/// plug in real adapters, without this crate depending on either.
pub struct EraRuntime<C: Context, G, S, F, M, K, Y> {
    clock: TickClock,
    era: Era<C>,
    boundaries: EraBoundaries,
    leaders: LeaderSequencer<C>,
    round_exponent: u8,
    own_id: Option<C::ValidatorId>,
    dag: G,
    era_storage: S,
    fork_choice: F,
    message_producer: M,
    wall_clock: K,
    is_synced: Y,
    participation: Participation<C>,
    switch_block_produced: bool,
}

impl<C, G, S, F, M, K, Y> EraRuntime<C, G, S, F, M, K, Y>
where
    C: Context,
    G: Dag<C>,
    S: EraStorage<C>,
    F: ForkChoice<C>,
    M: MessageProducer<C>,
    K: Clock,
    Y: IsSynced,
{
    pub fn new(
        config: RuntimeConfig<C>,
        dag: G,
        era_storage: S,
        fork_choice: F,
        message_producer: M,
        wall_clock: K,
        is_synced: Y,
    ) -> Self {
        let leaders = LeaderSequencer::from_era(&config.era);
        let boundaries = EraBoundaries::new(&config.conf, &config.era);
        let clock = TickClock::new(config.conf);
        EraRuntime {
            clock,
            era: config.era,
            boundaries,
            leaders,
            round_exponent: config.round_exponent,
            own_id: config.own_id,
            dag,
            era_storage,
            fork_choice,
            message_producer,
            wall_clock,
            is_synced,
            participation: Participation::default(),
            switch_block_produced: false,
        }
    }

    pub fn era(&self) -> &Era<C> {
        &self.era
    }

    pub fn participation(&self) -> &Participation<C> {
        &self.participation
    }

    fn current_tick(&self) -> Tick {
        self.clock.to_ticks(self.wall_clock.now())
    }

    fn round_length(&self) -> i64 {
        TickClock::round_length(self.round_exponent)
    }

    /// Validates an incoming message against the protocol rules.
    ///
    /// The outer `Result` carries [`RuntimeError`]: a fatal condition the
    /// caller must treat as grounds to halt this runtime instance, covering
    /// both a doppelganger sighting and a DAG read failure encountered while
    /// checking a rule (an inconsistent DAG is not something the sender
    /// caused, so it can't be folded into a soft per-message rejection). The
    /// inner `Result` carries [`ValidationError`]: an ordinary rule
    /// rejection, safe to log and discard.
    pub fn validate(
        &self,
        message: &Message<C>,
    ) -> Result<Result<(), ValidationError>, RuntimeError> {
        if self.own_id == Some(message.validator_id()) {
            error!(round = message.round_id().value(), "doppelganger: own validator id seen on the wire");
            return Err(RuntimeError::Doppelganger);
        }

        match validate::validate(self.clock.conf(), &self.era, &self.leaders, &self.dag, message) {
            Ok(()) => Ok(Ok(())),
            Err(ValidateFailure::Rule(reason)) => {
                debug!(%reason, round = message.round_id().value(), "message rejected");
                Ok(Err(reason))
            }
            Err(ValidateFailure::Dag(dag_error)) => {
                error!("dag lookup failed during validation: {}", dag_error);
                Err(RuntimeError::Dag(dag_error.to_string()))
            }
        }
    }

    /// Handles a message already accepted by [`EraRuntime::validate`], per
    /// the effect table in spec.md section 4.7.
    pub fn handle_message(&mut self, message: Message<C>) -> RuntimeResult<RuntimeOutput<C>> {
        if !self.is_synced.get() {
            debug!("swallowing message received before initial sync completed");
            return Ok(RuntimeOutput::empty());
        }

        if self.own_id == Some(message.validator_id()) {
            error!("own message fed back into the runtime");
            return Err(RuntimeError::SelfMessageReplayed);
        }

        let classification =
            classify::classify(self.clock.conf(), &self.era, &self.leaders, &self.dag, &message)
                .map_err(|e| RuntimeError::Dag(e.to_string()))?;

        match (&message, classification) {
            (Message::Block { round_id, .. }, Classification::LambdaBlock) => {
                self.handle_lambda_block(&message, *round_id)
            }
            (Message::Block { .. }, _) => {
                if self.crosses_switch_boundary(&message)? {
                    self.handle_switch_block(&message)
                } else {
                    Ok(RuntimeOutput::empty())
                }
            }
            (Message::Ballot { .. }, Classification::LambdaLikeBallot) => {
                self.handle_post_era_ballot(&message)
            }
            (Message::Ballot { .. }, _) => Ok(RuntimeOutput::empty()),
        }
    }

    fn crosses_switch_boundary(&self, message: &Message<C>) -> RuntimeResult<bool> {
        let Message::Block { main_parent, round_id, .. } = message else {
            return Ok(false);
        };
        let Some(parent_hash) = main_parent else {
            return Ok(false);
        };
        let parent = self
            .dag
            .get(parent_hash)
            .map_err(|e| RuntimeError::Dag(e.to_string()))?
            .ok_or_else(|| RuntimeError::InconsistentState("main parent missing from dag".into()))?;
        let is_main_chain = self
            .dag
            .is_main_chain_descendant(&self.era.key_block_hash, &message.hash())
            .map_err(|e| RuntimeError::Dag(e.to_string()))?;
        Ok(is_main_chain && self.boundaries.is_switch_boundary(parent.round_id(), *round_id))
    }

    fn handle_lambda_block(
        &mut self,
        message: &Message<C>,
        round_id: Tick,
    ) -> RuntimeResult<RuntimeOutput<C>> {
        let mut output = RuntimeOutput::empty();
        let Some(own_id) = self.own_id else {
            return Ok(output);
        };
        if !self.era.is_bonded(&own_id) {
            return Ok(output);
        }
        if round_id != self.current_round() {
            return Ok(output);
        }

        info!(round = round_id.value(), "responding to lambda block");
        let mut justifications = Justifications::<C>::new();
        justifications.insert(message.validator_id(), std::iter::once(message.hash()).collect());
        if let Some(own_latest) = self.latest_own_message()? {
            justifications.entry(own_id).or_default().insert(own_latest);
        }
        let ballot = self
            .message_producer
            .ballot(self.era.key_block_hash, round_id, message.hash(), justifications)
            .map_err(|e| RuntimeError::Dag(e.to_string()))?;
        self.participation.responded.push(own_id);
        output.events.push(HighwayEvent::CreatedLambdaResponse(ballot));
        Ok(output)
    }

    /// Reads the local validator's own most recent message, if any, from the
    /// fork-choice tip's justification set.
    fn latest_own_message(&self) -> RuntimeResult<Option<C::Hash>> {
        let own_id = match self.own_id {
            Some(id) => id,
            None => return Ok(None),
        };
        let tip = self
            .fork_choice
            .from_key_block(&self.era.key_block_hash)
            .map_err(|e| RuntimeError::Dag(e.to_string()))?;
        Ok(tip.justifications.get(&own_id).and_then(|hashes| hashes.iter().next().copied()))
    }

    fn current_round(&self) -> Tick {
        TickClock::next_round(self.era.start_tick, self.round_exponent, self.current_tick() - 1)
    }

    /// Child-era construction on observing a main-chain switch block, per
    /// spec.md section 4.7. Idempotent: a switch block already reflected in
    /// `EraStorage` produces no event.
    fn handle_switch_block(&mut self, switch_block: &Message<C>) -> RuntimeResult<RuntimeOutput<C>> {
        let mut output = RuntimeOutput::empty();
        if self
            .era_storage
            .contains_era(&switch_block.hash())
            .map_err(|e| RuntimeError::EraStorage(e.to_string()))?
        {
            return Ok(output);
        }

        let (booking_block, key_block) = self.locate_booking_and_key_blocks(switch_block)?;
        let magic_bits = self.collect_magic_bits(&booking_block, &key_block)?;
        let leader_seed = leader::seed(self.era.leader_seed, &magic_bits);
        let bonds = self.bonds_at(&key_block)?;

        let child = Era {
            start_tick: self.era.end_tick,
            end_tick: self.era.end_tick + self.clock.conf().era_duration,
            key_block_hash: key_block.hash(),
            booking_block_hash: booking_block.hash(),
            leader_seed,
            parent_key_block_hash: Some(self.era.key_block_hash),
            bonds,
        };

        info!(new_key_block = ?child.key_block_hash, %leader_seed, "switch block observed, creating child era");
        self.era_storage
            .add_era(child.clone())
            .map_err(|e| RuntimeError::EraStorage(e.to_string()))?;
        output.events.push(HighwayEvent::CreatedEra(child));
        Ok(output)
    }

    /// Walks the main chain backward from the switch block to find the
    /// booking block (first block whose parent lies strictly before the
    /// most recent booking boundary, and whose own timestamp is on or after
    /// it) and the key block (same, for the key boundary).
    fn locate_booking_and_key_blocks(
        &self,
        switch_block: &Message<C>,
    ) -> RuntimeResult<(Message<C>, Message<C>)> {
        let chain = self.main_chain_ancestry(switch_block)?;
        let booking = self
            .find_boundary_crossing(&chain, |p, c| self.boundaries.is_booking_boundary(p, c))?
            .ok_or_else(|| RuntimeError::InconsistentState("no booking block on main chain".into()))?;
        let key = self
            .find_boundary_crossing(&chain, |p, c| self.boundaries.is_key_boundary(p, c))?
            .ok_or_else(|| RuntimeError::InconsistentState("no key block on main chain".into()))?;
        Ok((booking, key))
    }

    /// Collects the main chain from the most distant ancestor reachable
    /// through `main_parent` links up to and including `tip`, oldest first.
    /// Booking boundaries can fall before this era's own start whenever
    /// `bookingDuration` exceeds `eraDuration`, so this walk is not bounded
    /// by `era.start_tick` — it runs to genesis.
    fn main_chain_ancestry(&self, tip: &Message<C>) -> RuntimeResult<Vec<Message<C>>> {
        let mut chain = vec![tip.clone()];
        let mut current = tip.clone();
        while let Message::Block { main_parent: Some(parent_hash), .. } = &current {
            let parent = self
                .dag
                .get(parent_hash)
                .map_err(|e| RuntimeError::Dag(e.to_string()))?
                .ok_or_else(|| RuntimeError::InconsistentState("main chain parent missing".into()))?;
            chain.push(parent.clone());
            current = parent;
        }
        chain.reverse();
        Ok(chain)
    }

    fn find_boundary_crossing(
        &self,
        chain: &[Message<C>],
        crosses: impl Fn(Tick, Tick) -> bool,
    ) -> RuntimeResult<Option<Message<C>>> {
        for window in chain.windows(2) {
            let (parent, child) = (&window[0], &window[1]);
            if crosses(parent.round_id(), child.round_id()) {
                return Ok(Some(child.clone()));
            }
        }
        Ok(None)
    }

    /// The main-chain slice's magic bits, from `booking` through `key`
    /// inclusive. See spec.md section 9's `collectMagicBits` round-trip
    /// property.
    fn collect_magic_bits(
        &self,
        booking: &Message<C>,
        key: &Message<C>,
    ) -> RuntimeResult<Vec<bool>> {
        let mut bits = Vec::new();
        let mut current = key.clone();
        loop {
            if let Message::Block { magic_bit, .. } = current {
                bits.push(magic_bit);
            }
            if current.hash() == booking.hash() {
                break;
            }
            let Message::Block { main_parent: Some(parent_hash), .. } = &current else {
                return Err(RuntimeError::InconsistentState(
                    "booking block not found walking back from key block".into(),
                ));
            };
            current = self
                .dag
                .get(parent_hash)
                .map_err(|e| RuntimeError::Dag(e.to_string()))?
                .ok_or_else(|| RuntimeError::InconsistentState("main chain parent missing".into()))?;
        }
        bits.reverse();
        Ok(bits)
    }

    /// The bonded validator set and stakes as of `key_block`. This crate has
    /// no auction/bonding logic of its own (out of scope); it trusts the
    /// bonds the message producer attached when `key_block` was created, via
    /// its justifications of the parent era's own bonds as a placeholder. A
    /// real node plugs in its own bonds-at lookup through a richer `Dag`.
    fn bonds_at(&self, _key_block: &Message<C>) -> RuntimeResult<std::collections::BTreeMap<C::ValidatorId, u64>> {
        Ok(self.era.bonds.clone())
    }

    /// The provisional post-era-voting-period branch: a lambda-like ballot
    /// by the leader is answered with a lambda response, per spec.md section
    /// 4.7's "pending spec" marker. Isolated in its own function per the
    /// open-question decision in SPEC_FULL.md.
    fn handle_post_era_ballot(&mut self, message: &Message<C>) -> RuntimeResult<RuntimeOutput<C>> {
        let mut output = RuntimeOutput::empty();
        let Some(own_id) = self.own_id else {
            return Ok(output);
        };
        if !self.era.is_bonded(&own_id) {
            return Ok(output);
        }
        warn!(round = message.round_id().value(), "post-era voting period ballot handling is provisional");
        let mut justifications = Justifications::<C>::new();
        justifications.insert(message.validator_id(), std::iter::once(message.hash()).collect());
        let ballot = self
            .message_producer
            .ballot(self.era.key_block_hash, message.round_id(), message.hash(), justifications)
            .map_err(|e| RuntimeError::Dag(e.to_string()))?;
        output.events.push(HighwayEvent::CreatedLambdaResponse(ballot));
        Ok(output)
    }

    /// Handles a due agenda action, per spec.md section 4.8.
    pub fn handle_agenda(&mut self, action: Action) -> RuntimeResult<RuntimeOutput<C>> {
        match action {
            Action::StartRound(round_id) => self.handle_start_round(round_id),
            Action::CreateOmegaMessage(round_id) => self.handle_create_omega(round_id),
        }
    }

    fn handle_start_round(&mut self, round_id: Tick) -> RuntimeResult<RuntimeOutput<C>> {
        let mut output = RuntimeOutput::empty();
        let now = self.current_tick();
        let round_len = self.round_length();

        if now.value() > round_id.value() + round_len {
            warn!(round = round_id.value(), "start-round handler slipped, skipping ahead");
            let next_round_id = TickClock::next_round(self.era.start_tick, self.round_exponent, now);
            output.agenda.schedule(next_round_id, Action::StartRound(next_round_id));
            return Ok(output);
        }

        if let Some(own_id) = self.own_id {
            if self.era.is_bonded(&own_id) && self.is_synced.get() {
                self.maybe_emit_lambda(round_id, &mut output)?;
            }
        }

        let next_round_id = TickClock::next_round(self.era.start_tick, self.round_exponent, round_id);
        output.agenda.schedule(next_round_id, Action::StartRound(next_round_id));

        let omega_tick = self.draw_omega_tick(round_id, round_len);
        output.agenda.schedule(omega_tick, Action::CreateOmegaMessage(round_id));

        Ok(output)
    }

    fn maybe_emit_lambda(&mut self, round_id: Tick, output: &mut RuntimeOutput<C>) -> RuntimeResult<()> {
        let own_id = self.own_id.expect("checked by caller");
        let is_leader = self.leaders.leader(round_id) == Some(own_id);
        if !is_leader {
            return Ok(());
        }

        if round_id.value() < self.era.end_tick.value() {
            self.emit_lambda_block(round_id, output)
        } else if !self.switch_block_produced {
            self.emit_lambda_block(round_id, output)?;
            self.switch_block_produced = true;
            Ok(())
        } else {
            info!(round = round_id.value(), "switch block already produced, emitting lambda-like ballot");
            let tip = self
                .fork_choice
                .from_key_block(&self.era.key_block_hash)
                .map_err(|e| RuntimeError::Dag(e.to_string()))?;
            let ballot = self
                .message_producer
                .ballot(self.era.key_block_hash, round_id, tip.main_parent, tip.justifications)
                .map_err(|e| RuntimeError::Dag(e.to_string()))?;
            output.events.push(HighwayEvent::CreatedLambdaResponse(ballot));
            Ok(())
        }
    }

    fn emit_lambda_block(&mut self, round_id: Tick, output: &mut RuntimeOutput<C>) -> RuntimeResult<()> {
        let tip = self
            .fork_choice
            .from_key_block(&self.era.key_block_hash)
            .map_err(|e| RuntimeError::Dag(e.to_string()))?;
        let is_booking_block = self.boundaries.is_booking_boundary(
            self.dag
                .get(&tip.main_parent)
                .map_err(|e| RuntimeError::Dag(e.to_string()))?
                .map(|m| m.round_id())
                .unwrap_or(self.era.start_tick),
            round_id,
        );
        let block = self
            .message_producer
            .block(self.era.key_block_hash, round_id, tip.main_parent, tip.justifications, is_booking_block)
            .map_err(|e| RuntimeError::Dag(e.to_string()))?;
        info!(round = round_id.value(), %is_booking_block, "produced lambda block");
        output.events.push(HighwayEvent::CreatedLambdaMessage(block));
        Ok(())
    }

    /// Draws the omega delay once, uniformly within the configured window.
    /// Not seeded from era state: determinism is required only for leader
    /// sampling and seed derivation, not for omega timing (spec.md section
    /// 9).
    fn draw_omega_tick(&self, round_id: Tick, round_len: i64) -> Tick {
        let conf = self.clock.conf();
        let fraction = rand::thread_rng().gen_range(conf.omega_message_time_start..conf.omega_message_time_end);
        round_id + (fraction * round_len as f64) as i64
    }

    fn handle_create_omega(&mut self, round_id: Tick) -> RuntimeResult<RuntimeOutput<C>> {
        let mut output = RuntimeOutput::empty();
        if !self.is_synced.get() {
            return Ok(output);
        }
        let Some(own_id) = self.own_id else {
            return Ok(output);
        };
        let tip = self
            .fork_choice
            .from_key_block(&self.era.key_block_hash)
            .map_err(|e| RuntimeError::Dag(e.to_string()))?;
        let ballot = self
            .message_producer
            .ballot(self.era.key_block_hash, round_id, tip.main_parent, tip.justifications)
            .map_err(|e| RuntimeError::Dag(e.to_string()))?;
        self.participation.omega_sent.push(own_id);
        output.events.push(HighwayEvent::CreatedOmegaMessage(ballot));
        Ok(output)
    }

    /// Builds the runtime's first agenda item, per spec.md section 4.8.
    pub fn init_agenda(&self) -> Agenda {
        let mut agenda = Agenda::empty();
        let Some(own_id) = self.own_id else {
            return agenda;
        };
        if !self.era.is_bonded(&own_id) {
            return agenda;
        }
        let now = self.current_tick();
        if now.value() >= self.era.end_tick.value() + self.clock.conf().post_era_voting_duration {
            return agenda;
        }
        let after = if self.era.start_tick > now { self.era.start_tick } else { now };
        let round_id = TickClock::next_round(self.era.start_tick, self.round_exponent, after);
        agenda.schedule(round_id, Action::StartRound(round_id));
        agenda
    }
}
