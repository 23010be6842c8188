//! Game clock and wall clock.
//!
//! `GameTime` is the simulated calendar stored in every snapshot.
//! `WallClock` is real time, used only for save cooldowns and record
//! timestamps. Tests drive it through `ManualClock`.

use crate::types::Millis;
use serde::{Deserialize, Serialize};
use std::{cell::Cell, rc::Rc};

pub const MINUTES_PER_HOUR: u32 = 60;
pub const HOURS_PER_DAY: u32 = 24;
pub const MINUTES_PER_DAY: u64 = (MINUTES_PER_HOUR * HOURS_PER_DAY) as u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameTime {
    pub day:     u32,
    pub hour:    u32,
    pub minute:  u32,
    pub weekday: Weekday,
}

impl Default for GameTime {
    fn default() -> Self {
        Self {
            day:     1,
            hour:    6,
            minute:  0,
            weekday: Weekday::Monday,
        }
    }
}

impl GameTime {
    /// Minutes elapsed since day 1, 00:00.
    pub fn total_minutes(&self) -> u64 {
        (self.day.saturating_sub(1) as u64) * MINUTES_PER_DAY
            + (self.hour as u64) * MINUTES_PER_HOUR as u64
            + self.minute as u64
    }

    /// Advance by `minutes`, rolling hours, days and weekdays.
    /// Returns the number of day boundaries crossed.
    pub fn advance_minutes(&mut self, minutes: u64) -> u32 {
        let before = self.total_minutes();
        let after = before + minutes;
        let days_crossed = (after / MINUTES_PER_DAY - before / MINUTES_PER_DAY) as u32;

        self.day = (after / MINUTES_PER_DAY) as u32 + 1;
        self.hour = ((after % MINUTES_PER_DAY) / MINUTES_PER_HOUR as u64) as u32;
        self.minute = (after % MINUTES_PER_HOUR as u64) as u32;
        for _ in 0..days_crossed % 7 {
            self.weekday = self.weekday.next();
        }
        days_crossed
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub fn next(self) -> Self {
        match self {
            Self::Monday    => Self::Tuesday,
            Self::Tuesday   => Self::Wednesday,
            Self::Wednesday => Self::Thursday,
            Self::Thursday  => Self::Friday,
            Self::Friday    => Self::Saturday,
            Self::Saturday  => Self::Sunday,
            Self::Sunday    => Self::Monday,
        }
    }
}

/// Source of real time.
pub trait WallClock {
    fn now_millis(&self) -> Millis;
}

/// Real system time via chrono.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_millis(&self) -> Millis {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock. Clones share the same instant, so a test can keep
/// one handle and give another to the orchestrator.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Millis>>,
}

impl ManualClock {
    pub fn starting_at(now: Millis) -> Self {
        Self { now: Rc::new(Cell::new(now)) }
    }

    pub fn advance(&self, millis: Millis) {
        self.now.set(self.now.get() + millis);
    }

    pub fn set(&self, now: Millis) {
        self.now.set(now);
    }
}

impl WallClock for ManualClock {
    fn now_millis(&self) -> Millis {
        self.now.get()
    }
}
