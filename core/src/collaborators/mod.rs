//! Reference gameplay collaborators.
//!
//! Their rules are deliberately small. What matters here is that each one
//! owns its runtime data and round-trips it through Snapshottable.

mod combat;
mod economy;
mod farming;
mod relationships;
mod weather;

pub use combat::{CombatState, CombatSystem, Enemy};
pub use economy::{EconomyLedger, EconomySystem};
pub use farming::{FarmingState, FarmingSystem, Plot};
pub use relationships::{RelationshipState, RelationshipSystem};
pub use weather::{WeatherKind, WeatherState, WeatherSystem};

use crate::{aggregator::WorldStateAggregator, error::SaveResult, rng::RngBank};

/// Register the standard collaborator set on `world`.
pub fn register_defaults(world: &mut WorldStateAggregator, bank: RngBank) -> SaveResult<()> {
    world.register(Box::new(WeatherSystem::new(bank)))?;
    world.register(Box::new(EconomySystem::new(bank)))?;
    world.register(Box::new(FarmingSystem::new(6)))?;
    world.register(Box::new(CombatSystem::new(bank)))?;
    world.register(Box::new(RelationshipSystem::default()))?;
    Ok(())
}
