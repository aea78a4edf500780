//! Tick arithmetic and the protocol's tunable parameters.
//!
//! All time arithmetic inside the runtime happens in integer [`Tick`]s; a
//! wall-clock [`Instant`] only ever appears at the boundary where the outer
//! scheduler reads the real clock (see [`TickClock::to_ticks`]).

use std::ops::{Add, Sub};

use datasize::DataSize;
use derive_more::{Add, AddAssign, From, Sub, SubAssign};
use serde::{Deserialize, Serialize};

/// A wall-clock instant, in milliseconds since the Unix epoch.
///
/// This mirrors `casper-node`'s `Timestamp` type, but is kept separate from
/// [`Tick`] because ticks are in a configurable unit (`HighwayConf::tick_unit_millis`)
/// that need not be one millisecond.
#[derive(
    DataSize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Instant(u64);

impl Instant {
    pub const fn from_millis(millis: u64) -> Self {
        Instant(millis)
    }

    pub fn millis(self) -> u64 {
        self.0
    }
}

/// An integer time coordinate, in the unit configured by
/// `HighwayConf::tick_unit_millis`. Signed so that arithmetic relative to
/// `genesis_era_start` never needs to saturate.
#[derive(
    DataSize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Add,
    Sub,
    AddAssign,
    SubAssign,
    From,
    Serialize,
    Deserialize,
)]
pub struct Tick(i64);

impl Tick {
    pub const fn new(value: i64) -> Self {
        Tick(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl Add<i64> for Tick {
    type Output = Tick;
    fn add(self, rhs: i64) -> Tick {
        Tick(self.0 + rhs)
    }
}

impl Sub<i64> for Tick {
    type Output = Tick;
    fn sub(self, rhs: i64) -> Tick {
        Tick(self.0 - rhs)
    }
}

/// The tunable protocol parameters shared by every validator. All nodes must
/// agree on these for a given era.
#[derive(DataSize, Debug, Clone, Serialize, Deserialize)]
pub struct HighwayConf {
    /// Milliseconds represented by a single tick. Typically `1` (ticks are
    /// milliseconds), kept general so a network could run on coarser ticks.
    pub tick_unit_millis: u64,
    /// Wall-clock start of era 0.
    pub genesis_era_start: Instant,
    /// Fixed length of every era, in ticks.
    pub era_duration: i64,
    /// Distance before era-end where the booking block is picked, in ticks.
    pub booking_duration: i64,
    /// Gap between the booking block and the key block, in ticks.
    pub entropy_duration: i64,
    /// Length of the post-era voting window, in ticks.
    pub post_era_voting_duration: i64,
    /// Fractional start of the window within a round where omega ballots are
    /// scheduled. Must satisfy `0.0 < omega_message_time_start < omega_message_time_end < 1.0`.
    pub omega_message_time_start: f64,
    /// Fractional end of the omega-scheduling window.
    pub omega_message_time_end: f64,
}

impl Default for HighwayConf {
    fn default() -> Self {
        HighwayConf {
            tick_unit_millis: 1,
            genesis_era_start: Instant::from_millis(0),
            era_duration: 7 * DAY_MILLIS,
            booking_duration: 10 * DAY_MILLIS,
            entropy_duration: 3 * HOUR_MILLIS,
            post_era_voting_duration: HOUR_MILLIS,
            omega_message_time_start: 0.5,
            omega_message_time_end: 1.0,
        }
    }
}

const HOUR_MILLIS: i64 = 60 * 60 * 1000;
const DAY_MILLIS: i64 = 24 * HOUR_MILLIS;

static_assertions::assert_impl_all!(Instant: Send, Sync);
static_assertions::assert_impl_all!(Tick: Send, Sync);

/// Converts between wall-clock [`Instant`]s and integer [`Tick`]s, and
/// derives round boundaries. Every operation here is a pure function of the
/// conf; `TickClock` holds no mutable state.
#[derive(Debug, Clone)]
pub struct TickClock {
    conf: HighwayConf,
}

impl TickClock {
    pub fn new(conf: HighwayConf) -> Self {
        TickClock { conf }
    }

    pub fn conf(&self) -> &HighwayConf {
        &self.conf
    }

    /// Converts a wall-clock instant into ticks since `genesis_era_start`.
    pub fn to_ticks(&self, instant: Instant) -> Tick {
        let millis_since_genesis =
            instant.millis() as i64 - self.conf.genesis_era_start.millis() as i64;
        Tick(millis_since_genesis / self.conf.tick_unit_millis as i64)
    }

    /// Converts a tick back into a wall-clock instant.
    pub fn to_instant(&self, tick: Tick) -> Instant {
        let millis =
            self.conf.genesis_era_start.millis() as i64 + tick.0 * self.conf.tick_unit_millis as i64;
        Instant::from_millis(millis.max(0) as u64)
    }

    /// The length, in ticks, of a round with the given exponent.
    pub fn round_length(exp: u8) -> i64 {
        1i64 << exp
    }

    /// The smallest tick of the form `base + k * 2^exp` that is strictly
    /// greater than `after`.
    pub fn next_round(base: Tick, exp: u8, after: Tick) -> Tick {
        let round_len = Self::round_length(exp);
        let diff = after.value() - base.value();
        // k is the smallest integer with base + k*round_len > after,
        // i.e. k = floor(diff / round_len) + 1.
        let k = diff.div_euclid(round_len) + 1;
        base + k * round_len
    }

    /// Whether `tick` lies on the round lattice `base + k * 2^exp`.
    pub fn on_lattice(base: Tick, exp: u8, tick: Tick) -> bool {
        (tick.value() - base.value()).rem_euclid(Self::round_length(exp)) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf() -> HighwayConf {
        HighwayConf::default()
    }

    #[test]
    fn to_ticks_and_back_round_trip() {
        let clock = TickClock::new(conf());
        let instant = Instant::from_millis(1_000_000);
        let tick = clock.to_ticks(instant);
        assert_eq!(instant, clock.to_instant(tick));
    }

    #[test]
    fn round_length_is_power_of_two() {
        assert_eq!(1, TickClock::round_length(0));
        assert_eq!(1024, TickClock::round_length(10));
    }

    #[test]
    fn next_round_is_strictly_after() {
        let base = Tick::new(0);
        let exp = 4; // round length 16
        assert_eq!(Tick::new(16), TickClock::next_round(base, exp, Tick::new(0)));
        assert_eq!(Tick::new(16), TickClock::next_round(base, exp, Tick::new(1)));
        assert_eq!(Tick::new(32), TickClock::next_round(base, exp, Tick::new(16)));
        assert_eq!(Tick::new(16), TickClock::next_round(base, exp, Tick::new(15)));
    }

    #[test]
    fn next_round_handles_negative_base() {
        let base = Tick::new(-10);
        let exp = 3; // round length 8
        // lattice points: ..., -10, -2, 6, 14, ...
        assert_eq!(Tick::new(-2), TickClock::next_round(base, exp, Tick::new(-10)));
        assert_eq!(Tick::new(6), TickClock::next_round(base, exp, Tick::new(-2)));
    }

    #[test]
    fn on_lattice_checks_alignment() {
        let base = Tick::new(100);
        let exp = 5; // round length 32
        assert!(TickClock::on_lattice(base, exp, Tick::new(100)));
        assert!(TickClock::on_lattice(base, exp, Tick::new(132)));
        assert!(!TickClock::on_lattice(base, exp, Tick::new(115)));
    }

    #[test]
    fn every_start_round_tick_satisfies_tick_lattice_invariant() {
        // Testable property from spec.md section 8.
        let base = Tick::new(-3);
        let exp = 6;
        let mut after = Tick::new(-100);
        for _ in 0..50 {
            let next = TickClock::next_round(base, exp, after);
            assert!(TickClock::on_lattice(base, exp, next));
            assert!(next > after);
            after = next;
        }
    }

    proptest::proptest! {
        #[test]
        fn next_round_is_always_on_lattice_and_strictly_after(
            base in -1_000_000i64..1_000_000,
            exp in 0u8..20,
            after in -1_000_000i64..1_000_000,
        ) {
            let base = Tick::new(base);
            let after = Tick::new(after);
            let next = TickClock::next_round(base, exp, after);
            proptest::prop_assert!(TickClock::on_lattice(base, exp, next));
            proptest::prop_assert!(next > after);
        }
    }
}
