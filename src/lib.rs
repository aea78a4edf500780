//! The per-era runtime of the Highway consensus protocol.
//!
//! An [`runtime::EraRuntime`] owns one era's validator set and boundaries and
//! drives three entry points: [`runtime::EraRuntime::validate`] and
//! [`runtime::EraRuntime::handle_message`] for inbound network messages, and
//! [`runtime::EraRuntime::handle_agenda`] for its own self-scheduled work.
//! Every external dependency — the message DAG, era storage, fork choice,
//! message production, the wall clock, and the initial-sync flag — is a
//! capability trait in [`traits`]; this crate never talks to a concrete
//! network, database, or signature scheme.

pub mod agenda;
pub mod boundaries;
pub mod classify;
pub mod clock;
pub mod context;
pub mod era;
pub mod error;
pub mod event;
pub mod leader;
pub mod message;
pub mod runtime;
pub mod traits;
pub mod validate;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
