//! Engine events and the frame tick system.

use bevy::prelude::*;

use crate::core::ActiveEffectHandle;

use super::application::GameplayEffectsExt;
use super::components::EffectsManager;

/// Observer event raised when an effect was applied or merged into an
/// existing stack.
#[derive(Event, Debug, Clone)]
pub struct GameplayEffectAppliedEvent {
    pub target: Entity,
    /// Template name of the effect.
    pub effect: String,
    /// Handle of the active effect; `None` for instant applications.
    pub handle: Option<ActiveEffectHandle>,
}

/// Observer event raised when an active effect was removed.
#[derive(Event, Debug, Clone)]
pub struct GameplayEffectRemovedEvent {
    pub target: Entity,
    pub effect: String,
    /// True when the removal came from duration expiry rather than an
    /// explicit unapply or a removal requirement.
    pub expired: bool,
}

/// Observer event raised for every periodic execution.
#[derive(Event, Debug, Clone)]
pub struct PeriodicEffectExecutedEvent {
    pub target: Entity,
    pub effect: String,
}

/// Exclusive system advancing every effects manager by the frame delta.
///
/// Added by the plugin inside
/// [`EffectRuntimeSet::Tick`](crate::core::EffectRuntimeSet::Tick);
/// games stepping time manually call
/// [`GameplayEffectsExt::update_effects`] themselves instead.
pub fn tick_effects_system(world: &mut World) {
    let delta_secs = world.resource::<Time>().delta_secs();
    if delta_secs <= 0.0 {
        return;
    }
    let mut managers = world.query_filtered::<Entity, With<EffectsManager>>();
    let targets: Vec<Entity> = managers.iter(world).collect();
    for target in targets {
        world.update_effects(target, delta_secs);
    }
}
