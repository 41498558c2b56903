//! Handle types for safe references to active effects.
//!
//! Handles provide a stable way to reference an active effect after the
//! apply call returns. A handle stays unique for the lifetime of the
//! target's effects manager, so a stale handle is detected rather than
//! silently resolving to a different effect.

use bevy::prelude::*;

/// A handle to an active effect on some target entity.
///
/// Returned by `apply_effect` for persistent effects, and consumed by
/// `unapply_effect` and the inspection queries. The handle becomes
/// invalid once the underlying active effect is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActiveEffectHandle {
    /// The entity the effect was applied to.
    pub target: Entity,
    /// Manager-local identifier, never reused within one manager.
    pub(crate) id: u64,
}

impl ActiveEffectHandle {
    pub(crate) fn new(target: Entity, id: u64) -> Self {
        Self { target, id }
    }

    /// Checks whether this handle still refers to a live active effect.
    pub fn is_valid(&self, world: &World) -> bool {
        world
            .get::<crate::effects::EffectsManager>(self.target)
            .is_some_and(|manager| manager.contains(self.id))
    }
}
