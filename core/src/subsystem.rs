//! Collaborator trait and helpers.
//!
//! RULE: Every gameplay subsystem that owns state implements Snapshottable.
//! The aggregator treats each one's blob as opaque: it never reads inside
//! it and never lets one collaborator's failure abort the whole snapshot.

use crate::{error::SaveResult, merge::deep_merge, state::WorldState};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::any::Any;

/// The contract every persisted subsystem must fulfill.
pub trait Snapshottable {
    /// Unique stable key. The blob is stored under `subsystems[key]`.
    fn key(&self) -> &'static str;

    /// Plain JSON view of this subsystem's state. Must not touch any
    /// other subsystem.
    fn capture(&self) -> SaveResult<Value>;

    /// Apply a captured blob. `None` or missing fields leave the current
    /// values in place.
    fn restore(&mut self, data: Option<&Value>) -> SaveResult<()>;

    /// Identifying fields recorded when `capture()` fails.
    fn identity(&self) -> Value {
        json!({ "key": self.key() })
    }

    /// Back to the state of a fresh game.
    fn reset(&mut self);

    /// For downcasting by the host and in tests.
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A live, UI-facing mirror of part of the world state. Re-bound after
/// every load so it never shows pre-load values.
pub trait StateProjection {
    fn rebind(&mut self, state: &WorldState);

    fn as_any(&self) -> &dyn Any;
}

/// Serialize a collaborator's state struct.
pub fn capture_state<T: Serialize>(state: &T) -> SaveResult<Value> {
    Ok(serde_json::to_value(state)?)
}

/// Merge `data` onto the current state and write the result back.
/// On error `state` is left untouched.
pub fn restore_state<T>(state: &mut T, data: Option<&Value>) -> SaveResult<()>
where
    T: Serialize + DeserializeOwned,
{
    let Some(data) = data else { return Ok(()) };
    let merged = deep_merge(serde_json::to_value(&*state)?, data.clone());
    *state = serde_json::from_value(merged)?;
    Ok(())
}
