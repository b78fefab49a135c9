//! The authoritative simulation clock: a monotonic tick counter, calendar
//! conversion for display, and the fixed frequency table subsystems are
//! scheduled against.
//!
//! Two calendars coexist deliberately. Human-readable dates use a 360-day
//! year (12 months of 30 days) because that is what a chronicler-facing
//! display wants: round numbers. Tick frequencies for `Annual`/`Decadal`
//! use 365/3650 because that is what the original simulation actually
//! ran on. Unifying the two would silently change how often annual
//! subsystems fire, so both constants are kept and neither is derived
//! from the other.

use serde::{Deserialize, Serialize};

use crate::ClockError;

/// Days in a calendar month, fixed.
pub const DAYS_PER_MONTH: u64 = 30;
/// Months in a calendar year, fixed.
pub const MONTHS_PER_YEAR: u64 = 12;
/// Days in a calendar year (30 * 12), used only for display conversion.
pub const DAYS_PER_CALENDAR_YEAR: u64 = DAYS_PER_MONTH * MONTHS_PER_YEAR;

/// A named scheduling cadence, expressed as a tick count.
///
/// `Annual` and `Decadal` intentionally do not line up with the 360-day
/// display calendar -- see the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickFrequency {
    Daily,
    Weekly,
    Monthly,
    Seasonal,
    Annual,
    Decadal,
}

impl TickFrequency {
    /// Ticks per occurrence of this frequency.
    pub const fn ticks(self) -> u64 {
        match self {
            TickFrequency::Daily => 1,
            TickFrequency::Weekly => 7,
            TickFrequency::Monthly => 30,
            TickFrequency::Seasonal => 90,
            TickFrequency::Annual => 365,
            TickFrequency::Decadal => 3650,
        }
    }
}

/// A calendar date derived from a tick, for display and save metadata only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDate {
    /// Zero-based calendar year.
    pub year: u64,
    /// One-based month, `1..=12`.
    pub month: u64,
    /// One-based day of month, `1..=30`.
    pub day: u64,
}

/// The world's tick counter.
///
/// `current_tick` is monotone non-decreasing across `advance`/`advance_by`/
/// `set_tick(>= current)`; only `reset` (used by tests and explicit load
/// paths) may move it backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldClock {
    current_tick: u64,
}

impl WorldClock {
    pub fn new() -> Self {
        Self { current_tick: 0 }
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Advance by exactly one tick.
    pub fn advance(&mut self) {
        self.current_tick += 1;
    }

    /// Advance by `n` ticks. Fails if `n` is negative; time never runs
    /// backwards through this entry point.
    pub fn advance_by(&mut self, n: i64) -> Result<(), ClockError> {
        if n < 0 {
            return Err(ClockError::NegativeAdvance(n));
        }
        self.current_tick += n as u64;
        Ok(())
    }

    /// Set the absolute tick. Fails if `t` is negative.
    pub fn set_tick(&mut self, t: i64) -> Result<(), ClockError> {
        if t < 0 {
            return Err(ClockError::NegativeTick(t));
        }
        self.current_tick = t as u64;
        Ok(())
    }

    /// Return to tick 0. The one operation permitted to move time backwards.
    pub fn reset(&mut self) {
        self.current_tick = 0;
    }

    pub fn is_new_week(&self) -> bool {
        self.current_tick % TickFrequency::Weekly.ticks() == 0
    }

    pub fn is_new_month(&self) -> bool {
        self.current_tick % TickFrequency::Monthly.ticks() == 0
    }

    pub fn is_new_season(&self) -> bool {
        self.current_tick % TickFrequency::Seasonal.ticks() == 0
    }

    pub fn is_new_year(&self) -> bool {
        self.current_tick % TickFrequency::Annual.ticks() == 0
    }

    pub fn is_new_decade(&self) -> bool {
        self.current_tick % TickFrequency::Decadal.ticks() == 0
    }

    /// Calendar year/month/day derived from the tick via the 360-day
    /// display calendar. Used only for human-readable output and for the
    /// `worldAge` field on saves -- never consulted for scheduling.
    pub fn calendar_date(&self) -> CalendarDate {
        let day_of_world = self.current_tick;
        let year = day_of_world / DAYS_PER_CALENDAR_YEAR;
        let day_of_year = day_of_world % DAYS_PER_CALENDAR_YEAR;
        let month = day_of_year / DAYS_PER_MONTH + 1;
        let day = day_of_year % DAYS_PER_MONTH + 1;
        CalendarDate { year, month, day }
    }

    pub fn get_elapsed_weeks(&self) -> u64 {
        self.current_tick / TickFrequency::Weekly.ticks()
    }

    pub fn get_elapsed_months(&self) -> u64 {
        self.current_tick / TickFrequency::Monthly.ticks()
    }

    pub fn get_elapsed_seasons(&self) -> u64 {
        self.current_tick / TickFrequency::Seasonal.ticks()
    }

    /// Floors, using the 365-tick annual frequency (not the 360-day
    /// calendar year).
    pub fn get_elapsed_years(&self) -> u64 {
        self.current_tick / TickFrequency::Annual.ticks()
    }

    pub fn get_elapsed_decades(&self) -> u64 {
        self.current_tick / TickFrequency::Decadal.ticks()
    }
}

impl Default for WorldClock {
    fn default() -> Self {
        Self::new()
    }
}
