//! Monotonic tick clock with day, week and episode cadences.

use crate::config::{CadenceConfig, ConfigError};
use serde::{Deserialize, Serialize};

/// Periodic boundaries derived from the tick counter, in firing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Cadence {
    Day,
    Week,
    /// Four-week period.
    Episode,
}

impl Cadence {
    pub const ALL: [Cadence; 3] = [Cadence::Day, Cadence::Week, Cadence::Episode];
}

/// Tick counter. Only [`Timekeeper::advance`] moves it.
#[derive(Clone, Debug)]
pub struct Timekeeper {
    tick: u64,
    cadence: CadenceConfig,
}

impl Timekeeper {
    /// Fails if any period is zero or periods do not nest.
    pub fn new(cadence: CadenceConfig) -> Result<Self, ConfigError> {
        cadence.validate()?;
        Ok(Self { tick: 0, cadence })
    }

    /// Advance exactly one tick and return the new tick.
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn cadence(&self) -> &CadenceConfig {
        &self.cadence
    }

    pub fn period(&self, cadence: Cadence) -> u64 {
        match cadence {
            Cadence::Day => self.cadence.ticks_per_day,
            Cadence::Week => self.cadence.ticks_per_week,
            Cadence::Episode => self.cadence.ticks_per_episode,
        }
    }

    pub fn is_boundary(&self, cadence: Cadence) -> bool {
        self.tick % self.period(cadence) == 0
    }

    pub fn is_day_boundary(&self) -> bool {
        self.is_boundary(Cadence::Day)
    }

    pub fn is_week_boundary(&self) -> bool {
        self.is_boundary(Cadence::Week)
    }

    pub fn is_episode_boundary(&self) -> bool {
        self.is_boundary(Cadence::Episode)
    }

    /// Cadences firing on the current tick, day first.
    pub fn boundaries(&self) -> impl Iterator<Item = Cadence> + '_ {
        Cadence::ALL
            .into_iter()
            .filter(move |c| self.is_boundary(*c))
    }

    /// Completed days.
    pub fn day(&self) -> u64 {
        self.tick / self.cadence.ticks_per_day
    }

    /// Completed weeks.
    pub fn week(&self) -> u64 {
        self.tick / self.cadence.ticks_per_week
    }

    /// Completed episodes.
    pub fn episode(&self) -> u64 {
        self.tick / self.cadence.ticks_per_episode
    }
}
