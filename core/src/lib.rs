//! lifesim-core: world-state snapshots and the save/load pipeline for a
//! life-simulation game.
//!
//! LAYERS (top depends on bottom, never the reverse):
//!   session      — wires one of everything below
//!   resume       — bootstrap and two-phase restore
//!   orchestrator — save tiers, cooldown, reentrancy guard
//!   aggregator   — snapshot capture and deep-merged load
//!   backend      — SaveStore (SQLite) or FallbackBackend (flat store)

pub mod aggregator;
pub mod backend;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod fallback;
pub mod merge;
pub mod migration;
pub mod narrative;
pub mod orchestrator;
pub mod resume;
pub mod rng;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod subsystem;
pub mod types;
