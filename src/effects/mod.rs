//! Effect specification and lifecycle engine.
//!
//! Effects are authored as immutable templates ([`EffectData`]) and
//! applied to targets through the [`GameplayEffectsExt`] world
//! extension, producing handle-addressed active effects. The engine
//! drives duration and period timers, enforces the stacking policy
//! vector, gates contributions on ongoing tag requirements, tracks
//! non-snapshot attribute dependencies, and raises cues and events on
//! every transition.
//!
//! # Example
//!
//! ```
//! use bevy::prelude::*;
//! use bevy_effect_runtime::prelude::*;
//!
//! let mut world = World::new();
//! let target = world
//!     .spawn(AttributeSet::new().with_attribute("health", 50, 0, 100))
//!     .id();
//! let source = world.spawn_empty().id();
//!
//! let regen = EffectData::builder("regen")
//!     .infinite()
//!     .add_modifier(Modifier::flat("health", MagnitudeSpec::scalar(10.0)))
//!     .build()
//!     .unwrap();
//!
//! let handle = world
//!     .apply_effect(target, &Effect::new(regen, source))
//!     .unwrap()
//!     .unwrap();
//! world.unapply_effect(handle).unwrap();
//! ```

pub mod application;
pub mod components;
pub mod definition;
pub(crate) mod dependencies;
pub(crate) mod lifecycle;
pub mod plugin;
pub mod stacking;
pub mod systems;

pub use application::GameplayEffectsExt;
pub use components::{EffectsManager, EntityTags, StackInfo};
pub use definition::{
    DurationData, Effect, EffectData, EffectDataBuilder, InhibitionRemovedPolicy, Modifier,
    ModifierOperation, PeriodicData,
};
pub use plugin::EffectsPlugin;
pub use stacking::{
    ApplicationRefreshPolicy, LevelComparison, LevelOverrideStackCountPolicy,
    StackExpirationPolicy, StackLevelPolicy, StackMagnitudePolicy, StackOverflowPolicy,
    StackPolicy, StackingData,
};
pub use systems::{
    GameplayEffectAppliedEvent, GameplayEffectRemovedEvent, PeriodicEffectExecutedEvent,
    tick_effects_system,
};
