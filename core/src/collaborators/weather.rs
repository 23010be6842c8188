use crate::{
    error::SaveResult,
    rng::{CollaboratorSlot, RngBank},
    state::Season,
    subsystem::{capture_state, restore_state, Snapshottable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeatherKind {
    Sunny,
    Cloudy,
    Rain,
    Storm,
    Snow,
}

impl WeatherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sunny  => "sunny",
            Self::Cloudy => "cloudy",
            Self::Rain   => "rain",
            Self::Storm  => "storm",
            Self::Snow   => "snow",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherState {
    pub today:           WeatherKind,
    pub tomorrow:        WeatherKind,
    pub streak_days:     u32,
    pub last_rolled_day: u32,
}

impl Default for WeatherState {
    fn default() -> Self {
        Self {
            today:           WeatherKind::Sunny,
            tomorrow:        WeatherKind::Sunny,
            streak_days:     0,
            last_rolled_day: 0,
        }
    }
}

pub struct WeatherSystem {
    pub state: WeatherState,
    bank:      RngBank,
}

impl WeatherSystem {
    pub fn new(bank: RngBank) -> Self {
        Self { state: WeatherState::default(), bank }
    }

    /// Roll tomorrow's forecast for `day`. Rolling the same day twice is a
    /// no-op.
    pub fn roll_for_day(&mut self, day: u32, season: Season) -> WeatherKind {
        if self.state.last_rolled_day == day {
            return self.state.today;
        }
        let mut rng = self.bank.for_day(CollaboratorSlot::Weather, day);
        let wet = match season {
            Season::Spring => 0.35,
            Season::Summer => 0.20,
            Season::Autumn => 0.40,
            Season::Winter => 0.30,
        };
        let next = if rng.chance(wet) {
            match (season, rng.chance(0.2)) {
                (Season::Winter, _) => WeatherKind::Snow,
                (_, true)           => WeatherKind::Storm,
                (_, false)          => WeatherKind::Rain,
            }
        } else if rng.chance(0.3) {
            WeatherKind::Cloudy
        } else {
            WeatherKind::Sunny
        };

        let previous = self.state.today;
        self.state.today = self.state.tomorrow;
        self.state.tomorrow = next;
        self.state.streak_days = if previous == self.state.today {
            self.state.streak_days + 1
        } else {
            0
        };
        self.state.last_rolled_day = day;
        log::debug!("{}: day={day} today={:?} tomorrow={next:?}", rng.name, self.state.today);
        self.state.today
    }
}

impl Snapshottable for WeatherSystem {
    fn key(&self) -> &'static str { "weather" }

    fn capture(&self) -> SaveResult<Value> {
        capture_state(&self.state)
    }

    fn restore(&mut self, data: Option<&Value>) -> SaveResult<()> {
        restore_state(&mut self.state, data)
    }

    fn reset(&mut self) {
        self.state = WeatherState::default();
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
