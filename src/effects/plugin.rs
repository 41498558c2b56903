//! Effect engine plugin.

use bevy::prelude::*;

use crate::core::EffectRuntimeSet;

use super::dependencies::DependencyIndex;
use super::systems::tick_effects_system;

/// Registers the effect engine: the dependency index resource and the
/// frame tick system.
///
/// # Example
/// ```
/// # use bevy::prelude::*;
/// # use bevy_effect_runtime::effects::EffectsPlugin;
/// App::new().add_plugins(EffectsPlugin);
/// ```
pub struct EffectsPlugin;

impl Plugin for EffectsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<DependencyIndex>()
            .init_resource::<Time>()
            .configure_sets(Update, EffectRuntimeSet::Tick)
            .add_systems(Update, tick_effects_system.in_set(EffectRuntimeSet::Tick));
    }
}
