//! Effect specifications.
//!
//! An [`EffectData`] is the immutable template an effect is applied
//! from: its modifiers, temporal shape, stacking policy, cues, and
//! components. Templates are built once, validated for policy
//! coherence, and shared behind an `Arc`. An [`Effect`] binds a
//! template to a source entity and a level.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bevy::prelude::*;

use crate::core::EffectError;
use crate::cues::CueData;
use crate::effect_components::EffectComponent;
use crate::magnitudes::{CustomExecution, MagnitudeSpec, ScalableFloat};
use crate::tags::GameplayTag;

use super::stacking::{StackExpirationPolicy, StackingData};

/// The temporal shape of an effect.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DurationData {
    /// Applies once to base values and keeps no state.
    #[default]
    Instant,
    /// Stays until explicitly removed.
    Infinite,
    /// Stays for a level-scalable number of seconds.
    HasDuration(ScalableFloat),
}

/// What a periodic effect does when its inhibition is lifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InhibitionRemovedPolicy {
    /// The period accumulator keeps whatever it held.
    #[default]
    NeverReset,
    /// The accumulator restarts from zero.
    ResetPeriod,
    /// One execution fires immediately, then the accumulator restarts.
    ExecuteAndResetPeriod,
}

/// Periodic execution settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicData {
    /// Seconds between executions, level-scalable.
    pub period: ScalableFloat,
    /// Execute once immediately on application.
    pub execute_on_application: bool,
    /// Behavior when inhibition is lifted.
    pub inhibition_removed_policy: InhibitionRemovedPolicy,
}

impl PeriodicData {
    pub fn new(period: ScalableFloat) -> Self {
        Self {
            period,
            execute_on_application: false,
            inhibition_removed_policy: InhibitionRemovedPolicy::default(),
        }
    }

    pub fn with_execute_on_application(mut self, execute: bool) -> Self {
        self.execute_on_application = execute;
        self
    }

    pub fn with_inhibition_removed_policy(mut self, policy: InhibitionRemovedPolicy) -> Self {
        self.inhibition_removed_policy = policy;
        self
    }
}

/// The operation a modifier performs on its attribute.
///
/// The engine's aggregation covers the additive channel; the enum is
/// non-exhaustive so richer operations can be introduced without
/// breaking authored data.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModifierOperation {
    /// Additive contribution through the modifier channel (or base
    /// value for instant/periodic executions).
    #[default]
    FlatBonus,
}

/// One attribute modification carried by an effect.
#[derive(Debug, Clone)]
pub struct Modifier {
    /// Name of the attribute on the target.
    pub attribute: String,
    pub operation: ModifierOperation,
    pub magnitude: MagnitudeSpec,
}

impl Modifier {
    /// A flat-bonus modifier.
    pub fn flat(attribute: impl Into<String>, magnitude: MagnitudeSpec) -> Self {
        Self {
            attribute: attribute.into(),
            operation: ModifierOperation::FlatBonus,
            magnitude,
        }
    }
}

/// Immutable effect template.
pub struct EffectData {
    /// Display name, carried into events and errors.
    pub name: String,
    /// Ordered modifiers.
    pub modifiers: Vec<Modifier>,
    pub duration: DurationData,
    pub periodic: Option<PeriodicData>,
    pub stacking: Option<StackingData>,
    /// Custom executions, run with instant semantics alongside the
    /// modifiers on apply (instant) or each period (periodic).
    pub executions: Vec<Arc<dyn CustomExecution>>,
    /// Cues raised on lifecycle transitions.
    pub cues: Vec<CueData>,
    /// Pluggable predicates and tag grants.
    pub components: Vec<Arc<dyn EffectComponent>>,
    /// Freeze the level at instantiation.
    pub snapshot_level: bool,
    /// Suppress cues whose magnitude source is missing or whose
    /// transaction produced no successful modifier.
    pub require_modifier_success_to_trigger_cue: bool,
    /// Skip apply cues on non-first stack merges.
    pub suppress_stacking_cues: bool,
}

impl EffectData {
    /// Starts building a template.
    pub fn builder(name: impl Into<String>) -> EffectDataBuilder {
        EffectDataBuilder {
            data: EffectData {
                name: name.into(),
                modifiers: Vec::new(),
                duration: DurationData::Instant,
                periodic: None,
                stacking: None,
                executions: Vec::new(),
                cues: Vec::new(),
                components: Vec::new(),
                snapshot_level: false,
                require_modifier_success_to_trigger_cue: false,
                suppress_stacking_cues: false,
            },
        }
    }

    /// True for templates that keep no persistent state.
    pub fn is_instant(&self) -> bool {
        matches!(self.duration, DurationData::Instant)
    }
}

impl fmt::Debug for EffectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectData")
            .field("name", &self.name)
            .field("modifiers", &self.modifiers)
            .field("duration", &self.duration)
            .field("periodic", &self.periodic)
            .field("stacking", &self.stacking)
            .field("executions", &self.executions.len())
            .field("cues", &self.cues)
            .field("components", &self.components.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`EffectData`]; `build` validates policy coherence.
pub struct EffectDataBuilder {
    data: EffectData,
}

impl EffectDataBuilder {
    pub fn instant(mut self) -> Self {
        self.data.duration = DurationData::Instant;
        self
    }

    pub fn infinite(mut self) -> Self {
        self.data.duration = DurationData::Infinite;
        self
    }

    pub fn with_duration(mut self, duration: ScalableFloat) -> Self {
        self.data.duration = DurationData::HasDuration(duration);
        self
    }

    pub fn with_periodic(mut self, periodic: PeriodicData) -> Self {
        self.data.periodic = Some(periodic);
        self
    }

    pub fn with_stacking(mut self, stacking: StackingData) -> Self {
        self.data.stacking = Some(stacking);
        self
    }

    pub fn add_modifier(mut self, modifier: Modifier) -> Self {
        self.data.modifiers.push(modifier);
        self
    }

    pub fn add_execution(mut self, execution: Arc<dyn CustomExecution>) -> Self {
        self.data.executions.push(execution);
        self
    }

    pub fn add_cue(mut self, cue: CueData) -> Self {
        self.data.cues.push(cue);
        self
    }

    pub fn add_component(mut self, component: Arc<dyn EffectComponent>) -> Self {
        self.data.components.push(component);
        self
    }

    pub fn snapshot_level(mut self, snapshot: bool) -> Self {
        self.data.snapshot_level = snapshot;
        self
    }

    pub fn require_modifier_success_to_trigger_cue(mut self, require: bool) -> Self {
        self.data.require_modifier_success_to_trigger_cue = require;
        self
    }

    pub fn suppress_stacking_cues(mut self, suppress: bool) -> Self {
        self.data.suppress_stacking_cues = suppress;
        self
    }

    /// Validates coherence and freezes the template.
    pub fn build(self) -> Result<Arc<EffectData>, EffectError> {
        let data = self.data;

        if data.is_instant() && data.periodic.is_some() {
            return Err(EffectError::IncoherentPolicy {
                effect: data.name.clone(),
                reason: "instant effects cannot be periodic".to_string(),
            });
        }
        if data.is_instant() && data.stacking.is_some() {
            return Err(EffectError::IncoherentPolicy {
                effect: data.name.clone(),
                reason: "instant effects cannot stack".to_string(),
            });
        }
        if let Some(periodic) = &data.periodic
            && periodic.period.base <= 0.0
        {
            return Err(EffectError::IncoherentPolicy {
                effect: data.name.clone(),
                reason: "period must be positive".to_string(),
            });
        }
        if let Some(stacking) = &data.stacking
            && stacking.expiration_policy == StackExpirationPolicy::RefreshDuration
            && data.periodic.is_none()
        {
            return Err(EffectError::IncoherentPolicy {
                effect: data.name.clone(),
                reason: "RefreshDuration expiration requires a periodic effect".to_string(),
            });
        }

        Ok(Arc::new(data))
    }
}

/// A template bound to a source entity and a level, ready to apply.
///
/// The same effect value may be applied any number of times; each
/// application resolves stacking against the target independently.
#[derive(Debug, Clone)]
pub struct Effect {
    pub data: Arc<EffectData>,
    /// The entity the effect originates from (attacker, aura owner...).
    pub source: Entity,
    level: i32,
    set_by_caller: HashMap<GameplayTag, f32>,
}

impl Effect {
    pub fn new(data: Arc<EffectData>, source: Entity) -> Self {
        Self {
            data,
            source,
            level: 1,
            set_by_caller: HashMap::new(),
        }
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Bumps the authoring level and returns the new value. Active
    /// effects already applied from this value re-evaluate through
    /// [`GameplayEffectsExt::level_up_effect`](super::GameplayEffectsExt::level_up_effect).
    pub fn level_up(&mut self) -> i32 {
        self.level += 1;
        self.level
    }

    /// Binds a float to a tag key for `SetByCaller` magnitudes.
    pub fn set_magnitude_by_caller(&mut self, tag: GameplayTag, value: f32) {
        self.set_by_caller.insert(tag, value);
    }

    pub fn magnitude_by_caller(&self, tag: &GameplayTag) -> Option<f32> {
        self.set_by_caller.get(tag).copied()
    }

    pub(crate) fn set_by_caller_map(&self) -> &HashMap<GameplayTag, f32> {
        &self.set_by_caller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magnitudes::Curve;

    #[test]
    fn builder_defaults_to_instant() {
        let data = EffectData::builder("strike")
            .add_modifier(Modifier::flat("health", MagnitudeSpec::scalar(-5.0)))
            .build()
            .unwrap();

        assert!(data.is_instant());
        assert_eq!(data.modifiers.len(), 1);
        assert_eq!(data.name, "strike");
    }

    #[test]
    fn instant_periodic_is_incoherent() {
        let result = EffectData::builder("broken")
            .with_periodic(PeriodicData::new(ScalableFloat::new(1.0)))
            .build();

        assert!(matches!(result, Err(EffectError::IncoherentPolicy { .. })));
    }

    #[test]
    fn instant_stacking_is_incoherent() {
        let result = EffectData::builder("broken")
            .with_stacking(StackingData::default())
            .build();

        assert!(matches!(result, Err(EffectError::IncoherentPolicy { .. })));
    }

    #[test]
    fn refresh_duration_expiration_requires_period() {
        let result = EffectData::builder("broken")
            .with_duration(ScalableFloat::new(5.0))
            .with_stacking(
                StackingData::new().with_expiration_policy(StackExpirationPolicy::RefreshDuration),
            )
            .build();
        assert!(matches!(result, Err(EffectError::IncoherentPolicy { .. })));

        let ok = EffectData::builder("fine")
            .with_duration(ScalableFloat::new(5.0))
            .with_periodic(PeriodicData::new(ScalableFloat::new(1.0)))
            .with_stacking(
                StackingData::new().with_expiration_policy(StackExpirationPolicy::RefreshDuration),
            )
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn non_positive_period_is_incoherent() {
        let result = EffectData::builder("broken")
            .infinite()
            .with_periodic(PeriodicData::new(ScalableFloat::new(0.0)))
            .build();
        assert!(matches!(result, Err(EffectError::IncoherentPolicy { .. })));
    }

    #[test]
    fn effect_level_and_bindings() {
        let data = EffectData::builder("buff").infinite().build().unwrap();
        let mut effect = Effect::new(data, Entity::from_bits(1)).with_level(2);

        assert_eq!(effect.level(), 2);
        assert_eq!(effect.level_up(), 3);

        let tag = GameplayTag::from_normalized("data.damage");
        effect.set_magnitude_by_caller(tag.clone(), 12.5);
        assert_eq!(effect.magnitude_by_caller(&tag), Some(12.5));
    }

    #[test]
    fn duration_scales_with_level() {
        let duration = ScalableFloat::with_curve(10.0, Curve::new(vec![(1.0, 1.0), (2.0, 2.0)]));
        let data = EffectData::builder("lasting")
            .with_duration(duration)
            .build()
            .unwrap();

        let DurationData::HasDuration(scalable) = &data.duration else {
            panic!("expected duration data");
        };
        assert_eq!(scalable.evaluate(2), 20.0);
    }
}
