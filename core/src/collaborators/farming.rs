use crate::{
    error::SaveResult,
    subsystem::{capture_state, restore_state, Snapshottable},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;

/// Growth stage at which a crop can be harvested.
pub const HARVEST_STAGE: u32 = 4;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plot {
    pub id:      u32,
    pub crop:    Option<String>,
    pub stage:   u32,
    pub watered: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FarmingState {
    pub plots: Vec<Plot>,
}

pub struct FarmingSystem {
    pub state:  FarmingState,
    plot_count: u32,
}

impl FarmingSystem {
    pub fn new(plot_count: u32) -> Self {
        Self { state: Self::empty_field(plot_count), plot_count }
    }

    fn empty_field(plot_count: u32) -> FarmingState {
        FarmingState {
            plots: (0..plot_count).map(|id| Plot { id, ..Plot::default() }).collect(),
        }
    }

    pub fn plant(&mut self, plot_id: u32, crop: &str) -> bool {
        match self.state.plots.iter_mut().find(|p| p.id == plot_id && p.crop.is_none()) {
            Some(plot) => {
                plot.crop = Some(crop.to_string());
                plot.stage = 0;
                true
            }
            None => false,
        }
    }

    pub fn water_all(&mut self) {
        for plot in self.state.plots.iter_mut().filter(|p| p.crop.is_some()) {
            plot.watered = true;
        }
    }

    /// Overnight growth: watered crops advance one stage.
    pub fn grow_overnight(&mut self) {
        for plot in &mut self.state.plots {
            if plot.crop.is_some() && plot.watered && plot.stage < HARVEST_STAGE {
                plot.stage += 1;
            }
            plot.watered = false;
        }
    }

    pub fn harvest(&mut self, plot_id: u32) -> Option<String> {
        let plot = self.state.plots.iter_mut().find(|p| p.id == plot_id)?;
        if plot.stage < HARVEST_STAGE {
            return None;
        }
        plot.stage = 0;
        plot.crop.take()
    }
}

impl Snapshottable for FarmingSystem {
    fn key(&self) -> &'static str { "farming" }

    fn capture(&self) -> SaveResult<Value> {
        capture_state(&self.state)
    }

    fn restore(&mut self, data: Option<&Value>) -> SaveResult<()> {
        restore_state(&mut self.state, data)
    }

    fn identity(&self) -> Value {
        json!({ "key": self.key(), "plotCount": self.plot_count })
    }

    fn reset(&mut self) {
        self.state = Self::empty_field(self.plot_count);
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
