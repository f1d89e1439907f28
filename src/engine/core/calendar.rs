// ABOUTME: Calendar/time driver - Gregorian<->Julian conversion and step-sequence generation
// ABOUTME: Ported from the original model's Calendar.c onto chrono::NaiveDateTime arithmetic

use crate::engine::error::{CoreError, CoreResult};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

const SEC_PER_DAY: i64 = 86_400;

/// A single simulated timestamp, carrying both the calendar fields and the
/// day-of-year the rest of the core (radiation, albedo schedules) indexes
/// monthly/seasonal tables by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepTime {
    pub datetime: NaiveDateTime,
}

impl StepTime {
    pub fn year(&self) -> i32 {
        self.datetime.year()
    }

    pub fn month(&self) -> u32 {
        self.datetime.month()
    }

    pub fn day_of_year(&self) -> u32 {
        self.datetime.ordinal()
    }

    pub fn hour(&self) -> u32 {
        self.datetime.hour()
    }
}

/// Produces the deterministic sequence of step timestamps between `start`
/// and `end` at a fixed step `dt_secs`, plus the `is_new_day`/`is_new_month`
/// predicates a calendar driver needs.
///
/// Contract: the first timestamp equals `start`; step k's
/// timestamp is `start + k * dt_secs`; `dt_secs` must evenly divide 86 400
/// seconds, and `start` must be strictly before `end`.
pub struct Calendar {
    start: NaiveDateTime,
    end: NaiveDateTime,
    dt_secs: i64,
    step: u64,
    current: NaiveDateTime,
}

impl Calendar {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, dt_secs: i64) -> CoreResult<Self> {
        if dt_secs <= 0 || SEC_PER_DAY % dt_secs != 0 {
            return Err(CoreError::InvalidTimeStep(format!(
                "step of {dt_secs}s does not evenly divide 86400s"
            )));
        }
        if start >= end {
            return Err(CoreError::InvalidTimeStep(format!(
                "start {start} must be before end {end}"
            )));
        }
        Ok(Self {
            start,
            end,
            dt_secs,
            step: 0,
            current: start,
        })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn step_index(&self) -> u64 {
        self.step
    }

    pub fn current(&self) -> StepTime {
        StepTime {
            datetime: self.current,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.end
    }

    /// Total number of steps in [start, end), matching the original model's
    /// `NSteps = (End - Start) * (SECPDAY / Interval)` computation.
    pub fn total_steps(&self) -> u64 {
        let span_secs = (self.end - self.start).num_seconds().max(0);
        (span_secs / self.dt_secs) as u64
    }

    /// Advances to the next step timestamp, returning it, or `None` once
    /// `end` has been reached.
    pub fn advance(&mut self) -> Option<StepTime> {
        if self.is_finished() {
            return None;
        }
        self.step += 1;
        self.current = self.start + chrono::Duration::seconds(self.dt_secs * self.step as i64);
        Some(self.current())
    }

    pub fn is_new_day(&self) -> bool {
        self.current.hour() == 0 && self.current.minute() == 0 && self.current.second() == 0
    }

    pub fn is_new_month(&self) -> bool {
        self.is_new_day() && self.current.day() == 1
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn rejects_non_divisor_step() {
        let start = dt(2000, 1, 1, 0, 0, 0);
        let end = dt(2000, 1, 2, 0, 0, 0);
        assert!(Calendar::new(start, end, 86_399).is_err());
    }

    #[test]
    fn rejects_start_after_end() {
        let start = dt(2000, 1, 2, 0, 0, 0);
        let end = dt(2000, 1, 1, 0, 0, 0);
        assert!(Calendar::new(start, end, 3600).is_err());
    }

    #[test]
    fn first_timestamp_equals_start() {
        let start = dt(2000, 1, 1, 0, 0, 0);
        let end = dt(2000, 1, 2, 0, 0, 0);
        let cal = Calendar::new(start, end, 3600).unwrap();
        assert_eq!(cal.current().datetime, start);
    }

    #[test]
    fn leap_year_crossing_feb_29_2000() {
        // Crosses the Feb 2000 leap day: start 2000-02-28 23:00, 3600s step, 48 steps
        // lands on 2000-03-01 23:00 given Feb 2000 has 29 days.
        let start = dt(2000, 2, 28, 23, 0, 0);
        let end = dt(2001, 1, 1, 0, 0, 0);
        let mut cal = Calendar::new(start, end, 3600).unwrap();
        let mut last = cal.current();
        for _ in 0..48 {
            last = cal.advance().unwrap();
        }
        assert_eq!(last.datetime, dt(2000, 3, 1, 23, 0, 0));
    }

    #[test]
    fn is_leap_year_matches_gregorian_rule() {
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2023));
    }

    #[test]
    fn day_of_year_jan_1_is_1() {
        let d = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert_eq!(day_of_year(d), 1);
    }
}
