//! Pure predicates over a parent/child timestamp pair, deciding whether a
//! main-chain edge crosses the booking, key, or switch boundary of an era.
//!
//! These never read the DAG; they are functions of `HighwayConf` and an
//! `Era`'s own boundaries only (spec.md section 4.4).

use crate::clock::{HighwayConf, Tick};
use crate::context::Context;
use crate::era::Era;

/// Computes `EraBoundaries` for one era: the booking and key boundaries, and
/// whether a `(parent, child)` timestamp pair crosses one of them.
pub struct EraBoundaries {
    booking_boundaries: Vec<Tick>,
    key_boundaries: Vec<Tick>,
    end_tick: Tick,
}

impl EraBoundaries {
    /// Builds the boundary set for `era` under `conf`. `bookingBoundaries` is
    /// `{endTick - bookingDuration - k*eraDuration : k >= 0, inside the era}`,
    /// reversed so the earliest boundary comes first.
    ///
    /// "Inside the era" is read as: no further back than one whole
    /// `bookingDuration` before this era's own start. Since `bookingDuration`
    /// is usually not an exact multiple of `eraDuration`, this window
    /// ordinarily contains one candidate, and two whenever the booking point
    /// falls close to an era boundary (see spec.md section 8, scenario 1,
    /// where `bookingDuration = 10d` and `eraDuration = 7d` yield both 12-13
    /// and 12-20 as booking boundaries of the era ending 12-30).
    pub fn new<C: Context>(conf: &HighwayConf, era: &Era<C>) -> Self {
        let floor = era.start_tick - conf.booking_duration;
        let mut booking_boundaries = Vec::new();
        let mut k = 0i64;
        loop {
            let candidate = era.end_tick - conf.booking_duration - k * conf.era_duration;
            if candidate < floor {
                break;
            }
            booking_boundaries.push(candidate);
            k += 1;
        }
        booking_boundaries.reverse();
        let key_boundaries = booking_boundaries
            .iter()
            .map(|&b| b + conf.entropy_duration)
            .collect();
        EraBoundaries {
            booking_boundaries,
            key_boundaries,
            end_tick: era.end_tick,
        }
    }

    pub fn booking_boundaries(&self) -> &[Tick] {
        &self.booking_boundaries
    }

    pub fn key_boundaries(&self) -> &[Tick] {
        &self.key_boundaries
    }

    /// True iff for some booking boundary `b`, `time(p) < b <= time(c)`.
    pub fn is_booking_boundary(&self, p: Tick, c: Tick) -> bool {
        crosses_any(&self.booking_boundaries, p, c)
    }

    /// True iff for some key boundary `b`, `time(p) < b <= time(c)`.
    pub fn is_key_boundary(&self, p: Tick, c: Tick) -> bool {
        crosses_any(&self.key_boundaries, p, c)
    }

    /// True iff `time(p) < endTick <= time(c)`. Note the asymmetry: equality
    /// on the lower bound counts, equality on the upper bound does not (a
    /// block timestamped exactly at `end_tick` is the switch block only if
    /// its parent is strictly before `end_tick`).
    pub fn is_switch_boundary(&self, p: Tick, c: Tick) -> bool {
        p < self.end_tick && self.end_tick <= c
    }
}

fn crosses_any(boundaries: &[Tick], p: Tick, c: Tick) -> bool {
    boundaries.iter().any(|&b| p < b && b <= c)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::TestContext;

    const DAY: i64 = 24 * 60 * 60 * 1000;
    const HOUR: i64 = 60 * 60 * 1000;

    fn conf() -> HighwayConf {
        HighwayConf {
            tick_unit_millis: 1,
            genesis_era_start: crate::clock::Instant::from_millis(0),
            era_duration: 7 * DAY,
            booking_duration: 10 * DAY,
            entropy_duration: 3 * HOUR,
            post_era_voting_duration: HOUR,
            omega_message_time_start: 0.5,
            omega_message_time_end: 1.0,
        }
    }

    fn era(start: i64, end: i64) -> Era<TestContext> {
        Era {
            start_tick: Tick::new(start),
            end_tick: Tick::new(end),
            key_block_hash: 1,
            booking_block_hash: 0,
            leader_seed: 0,
            parent_key_block_hash: None,
            bonds: Default::default(),
        }
    }

    /// Scenario 1 from spec.md section 8: genesis_era_start 2019-12-09,
    /// era_duration 7d, booking_duration 10d, entropy_duration 3h.
    /// Booking boundaries fall at 12-13 and 12-20; key boundaries 3h later.
    #[test]
    fn booking_and_key_boundary_recognition() {
        // Tick 0 is 2019-12-09 00:00. The third era after genesis spans
        // [dec23, dec30) -- far enough from genesis that booking_duration
        // (10d) reaches back across its own start, producing two candidates.
        let dec9 = 0i64;
        let e = era(dec9 + 14 * DAY, dec9 + 21 * DAY);
        let boundaries = EraBoundaries::new(&conf(), &e);
        let dec13 = dec9 + 4 * DAY;
        let dec20 = dec13 + 7 * DAY;
        assert_eq!(vec![Tick::new(dec13), Tick::new(dec20)], boundaries.booking_boundaries());
        let key13 = Tick::new(dec13 + 3 * HOUR);
        let key20 = Tick::new(dec20 + 3 * HOUR);
        assert_eq!(vec![key13, key20], boundaries.key_boundaries());

        assert!(boundaries.is_booking_boundary(Tick::new(dec13 - 2 * DAY), Tick::new(dec13)));
        assert!(!boundaries.is_booking_boundary(Tick::new(dec13), Tick::new(dec13)));
        assert!(!boundaries.is_booking_boundary(Tick::new(dec13), Tick::new(dec13 + DAY)));
    }

    #[test]
    fn switch_boundary_asymmetry() {
        let e = era(0, 1000);
        let boundaries = EraBoundaries::new(&conf(), &e);
        // Lower bound equality counts:
        assert!(boundaries.is_switch_boundary(Tick::new(999), Tick::new(1000)));
        // Upper bound equality on the parent does not:
        assert!(!boundaries.is_switch_boundary(Tick::new(1000), Tick::new(1001)));
        assert!(!boundaries.is_switch_boundary(Tick::new(998), Tick::new(999)));
    }
}
