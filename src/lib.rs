//! Bevy Effect Runtime
//!
//! A deterministic, update-driven gameplay effect engine for Bevy:
//! composable, stackable, temporally-scoped effects that mutate numeric
//! entity attributes and raise typed side-channel cues as they apply,
//! execute, update, and end.
//!
//! # Features
//!
//! - **Attributes**: five-channel integer attributes (base, modifier,
//!   valid modifier, overflow, bounds) with derived-attribute hooks
//! - **Effects**: instant, infinite, bounded-duration, and periodic
//!   effects with an inhibition gate driven by tag requirements
//! - **Magnitudes**: constant curve-scaled, attribute-derived,
//!   set-by-caller, custom calculator, and custom execution sources
//! - **Stacking**: orthogonal policies for merging, level conflicts,
//!   overflow, expiration, and refresh
//! - **Tags**: hierarchical interned identifiers with set algebra, a
//!   byte-coded query language, and a compact wire codec
//! - **Cues**: apply/execute/update/remove notifications with
//!   normalized magnitudes from live sources
//!
//! # Quick Start
//!
//! ```
//! use bevy::prelude::*;
//! use bevy_effect_runtime::prelude::*;
//!
//! App::new()
//!     .add_plugins(EffectRuntimePlugin)
//!     .run();
//! ```
//!
//! The plugin ticks every effects manager from `Res<Time>` each
//! `Update`. Games that need deterministic stepping skip the plugin's
//! tick and call [`GameplayEffectsExt::update_effects`] with their own
//! delta instead; all other operations are synchronous methods on
//! [`bevy::prelude::World`] either way.

pub mod attributes;
pub mod core;
pub mod cues;
pub mod effect_components;
pub mod effects;
pub mod magnitudes;
pub mod tags;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::attributes::{
        AttributeChangedEvent, AttributeChannel, AttributeSet, AttributeSetHook,
        AttributeSetWriter, GameplayAttribute,
    };

    pub use crate::tags::{
        GameplayTag, TagContainer, TagQuery, TagQueryExpression, TagRegistry, validate_tag_key,
    };

    pub use crate::magnitudes::{
        AttributeCaptureDefinition, CalculatorContext, CaptureSource, Curve, CustomCalculator,
        CustomExecution, ExecutionTarget, MagnitudeSpec, ModifierEvaluatedData, ScalableFloat,
        ScalableInt,
    };

    pub use crate::effects::{
        ApplicationRefreshPolicy, DurationData, Effect, EffectData, EffectsManager, EntityTags,
        GameplayEffectAppliedEvent, GameplayEffectRemovedEvent, GameplayEffectsExt,
        InhibitionRemovedPolicy, LevelComparison, LevelOverrideStackCountPolicy, Modifier,
        PeriodicData, PeriodicEffectExecutedEvent, StackExpirationPolicy, StackInfo,
        StackLevelPolicy, StackMagnitudePolicy, StackOverflowPolicy, StackPolicy, StackingData,
    };

    pub use crate::effect_components::{
        ChanceRandom, ChanceToApply, EffectComponent, FixedQueueRandom, ModifierTags,
        TagRequirements, TargetTagRequirements, ThreadRandom,
    };

    pub use crate::cues::{
        CueData, CueEventKind, CueHandler, CueMagnitudeType, CueManager, CueParameters,
        CueTriggeredEvent,
    };

    pub use crate::core::{ActiveEffectHandle, EffectError, EffectRuntimeSet, TagError};

    pub use crate::EffectRuntimePlugin;
}

use bevy::prelude::*;

/// Main plugin for the effect runtime.
///
/// Combines the effect engine and cue sub-plugins; adding it is all a
/// game needs for frame-driven effects.
///
/// # Example
///
/// ```
/// use bevy::prelude::*;
/// use bevy_effect_runtime::EffectRuntimePlugin;
///
/// App::new().add_plugins(EffectRuntimePlugin);
/// ```
pub struct EffectRuntimePlugin;

impl Plugin for EffectRuntimePlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(effects::EffectsPlugin)
            .add_plugins(cues::CuePlugin);
    }
}
