use crate::{
    error::SaveResult,
    rng::{CollaboratorSlot, RngBank},
    subsystem::{capture_state, restore_state, Snapshottable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{any::Any, collections::BTreeMap};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EconomyLedger {
    /// Base sell price per item id.
    pub prices:       BTreeMap<String, i64>,
    /// Multiplier applied on top of base prices for the current market day.
    pub market_drift: f64,
    pub total_earned: i64,
    pub shipped:      Vec<String>,
}

impl Default for EconomyLedger {
    fn default() -> Self {
        Self {
            prices: [
                ("turnip".to_string(),  35),
                ("potato".to_string(),  80),
                ("egg".to_string(),     50),
                ("milk".to_string(),   120),
            ]
            .into_iter()
            .collect(),
            market_drift: 1.0,
            total_earned: 0,
            shipped:      Vec::new(),
        }
    }
}

pub struct EconomySystem {
    pub ledger: EconomyLedger,
    bank:       RngBank,
}

impl EconomySystem {
    pub fn new(bank: RngBank) -> Self {
        Self { ledger: EconomyLedger::default(), bank }
    }

    /// Drift prices by up to ±10% for the market day.
    pub fn open_market(&mut self, day: u32) {
        let mut rng = self.bank.for_day(CollaboratorSlot::Economy, day);
        let swing = rng.next_f64() * 0.2 - 0.1;
        self.ledger.market_drift = (1.0 + swing).clamp(0.9, 1.1);
        self.ledger.shipped.clear();
    }

    /// Sell `quantity` of `item_id`. Returns gold earned; unknown items
    /// earn nothing.
    pub fn sell(&mut self, item_id: &str, quantity: u32) -> i64 {
        let Some(base) = self.ledger.prices.get(item_id) else { return 0 };
        let earned = (*base as f64 * self.ledger.market_drift).round() as i64 * quantity as i64;
        self.ledger.total_earned += earned;
        self.ledger.shipped.push(item_id.to_string());
        earned
    }
}

impl Snapshottable for EconomySystem {
    fn key(&self) -> &'static str { "economy" }

    fn capture(&self) -> SaveResult<Value> {
        capture_state(&self.ledger)
    }

    fn restore(&mut self, data: Option<&Value>) -> SaveResult<()> {
        restore_state(&mut self.ledger, data)
    }

    fn reset(&mut self) {
        self.ledger = EconomyLedger::default();
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
