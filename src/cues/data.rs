//! Cue specifications and dispatch parameters.

use std::collections::HashMap;

use bevy::prelude::*;

use crate::tags::TagContainer;

/// The live source a cue's magnitude is read from at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CueMagnitudeType {
    /// Net delta applied to the attribute by the dispatching effect in
    /// this transaction.
    AttributeValueChange(String),
    /// Live current value of the attribute.
    AttributeCurrentValue(String),
    /// Live base value of the attribute.
    AttributeBaseValue(String),
    /// Live modifier channel.
    AttributeModifier(String),
    /// Live valid-modifier channel.
    AttributeValidModifier(String),
    /// Live overflow channel.
    AttributeOverflow(String),
    /// Live lower bound.
    AttributeMin(String),
    /// Live upper bound.
    AttributeMax(String),
    /// Live `base + valid_modifier` before clamping.
    AttributeMagnitudeUpToChannel(String),
    /// Current effect level.
    EffectLevel,
    /// Current stack count.
    StackCount,
}

impl CueMagnitudeType {
    /// The attribute this magnitude reads, when it reads one.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::AttributeValueChange(name)
            | Self::AttributeCurrentValue(name)
            | Self::AttributeBaseValue(name)
            | Self::AttributeModifier(name)
            | Self::AttributeValidModifier(name)
            | Self::AttributeOverflow(name)
            | Self::AttributeMin(name)
            | Self::AttributeMax(name)
            | Self::AttributeMagnitudeUpToChannel(name) => Some(name),
            Self::EffectLevel | Self::StackCount => None,
        }
    }
}

/// Cue specification attached to an effect.
#[derive(Debug, Clone, PartialEq)]
pub struct CueData {
    /// Tags this cue dispatches under.
    pub tags: TagContainer,
    /// Lower bound of the normalization window.
    pub min_value: i32,
    /// Upper bound of the normalization window.
    pub max_value: i32,
    /// Where the raw magnitude comes from.
    pub magnitude_type: CueMagnitudeType,
}

impl CueData {
    pub fn new(tags: TagContainer, min_value: i32, max_value: i32, magnitude_type: CueMagnitudeType) -> Self {
        Self {
            tags,
            min_value,
            max_value,
            magnitude_type,
        }
    }

    /// Maps a raw magnitude into `[0, 1]` against this cue's window.
    pub fn normalize(&self, raw: f32) -> f32 {
        let span = (self.max_value - self.min_value) as f32;
        if span <= 0.0 {
            return 0.0;
        }
        ((raw - self.min_value as f32) / span).clamp(0.0, 1.0)
    }
}

/// Which lifecycle moment a cue dispatch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueEventKind {
    /// A persistent effect was applied (or re-admitted).
    Apply,
    /// An instant or periodic execution ran.
    Execute,
    /// A live magnitude the cue sources from changed.
    Update,
    /// The effect was removed or inhibited.
    Remove,
}

/// Parameters delivered to cue handlers.
#[derive(Debug, Clone)]
pub struct CueParameters {
    /// The entity the effect is applied to.
    pub target: Entity,
    /// The entity the effect originated from.
    pub source: Entity,
    /// Magnitude read from the cue's source at dispatch time.
    pub raw_magnitude: f32,
    /// `raw_magnitude` normalized against the cue's window.
    pub normalized_magnitude: f32,
    /// Values deposited by custom calculators during evaluation.
    pub custom_parameters: HashMap<String, f32>,
}
