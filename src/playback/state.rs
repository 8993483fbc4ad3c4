use crate::foundation::error::{ReelError, ReelResult};

/// Coarse phase of a run, derived from the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Fewer than `day_cap` days replayed so far; nothing is erased.
    Accumulating,
    /// The window is full and older arc content sheds as new content arrives.
    Windowed,
    /// The last day has been replayed; the window shrinks one day per iteration.
    WindingDown,
}

/// Day cursor of one playback run.
///
/// `day` never decreases. `day_cap` only changes once `end_of_days` is set, and then only
/// downwards, ending at -1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackState {
    day_cap: i32,
    total_days: u32,
    full_accumulation: bool,
    end_of_days: bool,
    day: u32,
}

impl PlaybackState {
    /// Validate `day_cap` against `1..=total_days`.
    pub fn new(day_cap: i32, total_days: u32) -> ReelResult<Self> {
        if total_days == 0 {
            return Err(ReelError::config("nothing to animate: the query has no days"));
        }
        if day_cap < 1 || i64::from(day_cap) > i64::from(total_days) {
            return Err(ReelError::config(format!(
                "day cap {day_cap} outside 1..={total_days}"
            )));
        }
        Ok(Self {
            day_cap,
            total_days,
            full_accumulation: i64::from(day_cap) == i64::from(total_days),
            end_of_days: false,
            day: 0,
        })
    }

    /// Day being replayed, 0-based.
    pub fn day(&self) -> u32 {
        self.day
    }

    /// Days kept visible at once. Drops below the initial cap only while winding down.
    pub fn day_cap(&self) -> i32 {
        self.day_cap
    }

    /// Days in the presentation being replayed.
    pub fn total_days(&self) -> u32 {
        self.total_days
    }

    /// The cap covers every day, so nothing is ever erased.
    pub fn full_accumulation(&self) -> bool {
        self.full_accumulation
    }

    /// The last day has been replayed and the window is unwinding.
    pub fn end_of_days(&self) -> bool {
        self.end_of_days
    }

    /// Advance at a day boundary. On the last day of a windowed run the cursor stays put and the
    /// cap shrinks instead, so the last day is replayed once per unwind step.
    pub fn step_day(&mut self) {
        if self.day + 1 == self.total_days && !self.full_accumulation {
            self.end_of_days = true;
            self.day_cap -= 1;
        } else {
            self.day += 1;
        }
    }

    /// Whether another day iteration is due.
    pub fn more_days(&self) -> bool {
        self.day < self.total_days && self.day_cap >= 0
    }

    /// Arc content must shed this day.
    pub fn too_many_days(&self) -> bool {
        i64::from(self.day) >= i64::from(self.day_cap)
    }

    /// Last unwind iteration: bands and tick labels erode hour by hour.
    pub fn final_day(&self) -> bool {
        self.end_of_days && self.day_cap == 0
    }

    /// Current [`Phase`], for logging.
    pub fn phase(&self) -> Phase {
        if self.end_of_days {
            Phase::WindingDown
        } else if self.too_many_days() {
            Phase::Windowed
        } else {
            Phase::Accumulating
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_days(mut s: PlaybackState) -> Vec<(u32, i32, bool)> {
        let mut seen = Vec::new();
        while s.more_days() {
            seen.push((s.day(), s.day_cap(), s.end_of_days()));
            s.step_day();
        }
        seen
    }

    #[test]
    fn cap_outside_range_is_a_config_error() {
        for cap in [0, -1, 4] {
            assert!(matches!(
                PlaybackState::new(cap, 3),
                Err(ReelError::Config(_))
            ));
        }
        assert!(PlaybackState::new(1, 0).is_err());
    }

    #[test]
    fn full_accumulation_visits_each_day_once() {
        let s = PlaybackState::new(3, 3).unwrap();
        assert!(s.full_accumulation());
        assert_eq!(
            run_days(s),
            vec![(0, 3, false), (1, 3, false), (2, 3, false)]
        );
    }

    #[test]
    fn windowed_run_unwinds_to_zero() {
        let s = PlaybackState::new(2, 3).unwrap();
        assert_eq!(
            run_days(s),
            vec![
                (0, 2, false),
                (1, 2, false),
                (2, 2, false),
                (2, 1, true),
                (2, 0, true),
            ]
        );
    }

    #[test]
    fn phases_follow_the_cursor() {
        let mut s = PlaybackState::new(1, 2).unwrap();
        assert_eq!(s.phase(), Phase::Accumulating);
        s.step_day();
        assert_eq!(s.phase(), Phase::Windowed);
        assert!(s.too_many_days());
        s.step_day();
        assert_eq!(s.phase(), Phase::WindingDown);
        assert!(s.final_day());
        s.step_day();
        assert!(!s.more_days());
    }
}
