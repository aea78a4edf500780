//! The write-only event log a single runtime step produces.

use std::iter::FromIterator;

use datasize::DataSize;

use crate::context::Context;
use crate::era::Era;
use crate::message::Message;

/// An event emitted by one call into the runtime. Events are never consumed
/// by the runtime itself; they're a value returned to the caller, the way
/// the teacher's handlers return `Vec<ConsensusProtocolResult<..>>`
/// (`protocols/highway.rs`) rather than mutating ambient state.
#[derive(Debug, Clone)]
pub enum HighwayEvent<C: Context> {
    CreatedLambdaMessage(Message<C>),
    CreatedLambdaResponse(Message<C>),
    CreatedOmegaMessage(Message<C>),
    CreatedEra(Era<C>),
}

/// An append-only log of the events produced by one runtime step.
#[derive(Debug, Clone, Default)]
pub struct EventLog<C: Context>(Vec<HighwayEvent<C>>);

impl<C: Context> EventLog<C> {
    pub fn new() -> Self {
        EventLog(Vec::new())
    }

    pub fn push(&mut self, event: HighwayEvent<C>) {
        self.0.push(event);
    }

    pub fn extend(&mut self, other: EventLog<C>) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HighwayEvent<C>> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<HighwayEvent<C>> {
        self.0
    }
}

impl<C: Context> IntoIterator for EventLog<C> {
    type Item = HighwayEvent<C>;
    type IntoIter = std::vec::IntoIter<HighwayEvent<C>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<C: Context> FromIterator<HighwayEvent<C>> for EventLog<C> {
    fn from_iter<I: IntoIterator<Item = HighwayEvent<C>>>(iter: I) -> Self {
        EventLog(iter.into_iter().collect())
    }
}

impl<C: Context> DataSize for HighwayEvent<C>
where
    C::Hash: DataSize,
    C::ValidatorId: DataSize,
{
    const IS_DYNAMIC: bool = true;
    const STATIC_HEAP_SIZE: usize = 0;

    fn estimate_heap_size(&self) -> usize {
        match self {
            HighwayEvent::CreatedLambdaMessage(message) => message.estimate_heap_size(),
            HighwayEvent::CreatedLambdaResponse(message) => message.estimate_heap_size(),
            HighwayEvent::CreatedOmegaMessage(message) => message.estimate_heap_size(),
            HighwayEvent::CreatedEra(era) => era.estimate_heap_size(),
        }
    }
}

impl<C: Context> DataSize for EventLog<C>
where
    C::Hash: DataSize,
    C::ValidatorId: DataSize,
{
    const IS_DYNAMIC: bool = true;
    const STATIC_HEAP_SIZE: usize = 0;

    fn estimate_heap_size(&self) -> usize {
        self.0.iter().map(DataSize::estimate_heap_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    #[test]
    fn preserves_emission_order() {
        let mut log = EventLog::<TestContext>::new();
        let msg = |h| Message::Ballot {
            hash: h,
            validator_id: 1,
            round_id: crate::clock::Tick::new(0),
            key_block_hash: 0,
            target: 0,
            justifications: Default::default(),
            message_type: None,
        };
        log.push(HighwayEvent::CreatedOmegaMessage(msg(1)));
        log.push(HighwayEvent::CreatedLambdaResponse(msg(2)));
        let events = log.into_vec();
        assert!(matches!(events[0], HighwayEvent::CreatedOmegaMessage(_)));
        assert!(matches!(events[1], HighwayEvent::CreatedLambdaResponse(_)));
    }
}
