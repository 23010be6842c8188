//! Deterministic random number generation for collaborators.
//!
//! RULE: Collaborators never call a platform RNG. Each one draws from a
//! stream derived from (world seed, collaborator slot, game day), so
//! restoring a save and replaying a day reproduces the same rolls.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// One collaborator's rolls for one game day.
pub struct DayRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl DayRng {
    pub fn new(derived_seed: u64, name: &'static str) -> Self {
        Self {
            name,
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// All collaborator RNGs for one world, keyed by stable slot.
#[derive(Debug, Clone, Copy)]
pub struct RngBank {
    world_seed: u64,
}

impl RngBank {
    pub fn new(world_seed: u64) -> Self {
        Self { world_seed }
    }

    pub fn for_day(&self, slot: CollaboratorSlot, day: u32) -> DayRng {
        let derived = self.world_seed
            ^ (slot as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ (day as u64).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        DayRng::new(derived, slot.name())
    }
}

/// Stable slot assignments.
/// NEVER reorder or remove entries — only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum CollaboratorSlot {
    Weather = 0,
    Economy = 1,
    Combat = 2,
}

impl CollaboratorSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Economy => "economy",
            Self::Combat => "combat",
        }
    }
}
