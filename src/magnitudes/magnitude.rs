//! Modifier magnitude specifications.
//!
//! A magnitude names where a modifier's numeric value comes from. The
//! five calculation modes of the pipeline are a closed sum type with a
//! single dispatch site in the effect engine; custom executions are the
//! fifth mode but replace the modifier list wholesale, so they live on
//! the effect data rather than here.

use std::fmt;
use std::sync::Arc;

use crate::attributes::AttributeChannel;
use crate::tags::GameplayTag;

use super::calculator::CustomCalculator;
use super::capture::AttributeCaptureDefinition;
use super::curve::{Curve, ScalableFloat};

/// Where a modifier's magnitude comes from.
#[derive(Clone)]
pub enum MagnitudeSpec {
    /// A constant, optionally scaled by effect level.
    Scalable(ScalableFloat),
    /// Derived from a captured attribute:
    /// `(coeff * (captured + pre) + post) * level_curve`.
    AttributeBased {
        capture: AttributeCaptureDefinition,
        channel: AttributeChannel,
        coefficient: ScalableFloat,
        pre_multiply_additive: ScalableFloat,
        post_multiply_additive: ScalableFloat,
        level_curve: Option<Curve>,
    },
    /// A float the caller bound on the effect under a tag key.
    SetByCaller(GameplayTag),
    /// A user calculator, passed through the same envelope as
    /// attribute-based magnitudes.
    Custom {
        calculator: Arc<dyn CustomCalculator>,
        coefficient: ScalableFloat,
        pre_multiply_additive: ScalableFloat,
        post_multiply_additive: ScalableFloat,
        level_curve: Option<Curve>,
    },
}

impl MagnitudeSpec {
    /// A flat constant magnitude.
    pub fn scalar(value: f32) -> Self {
        Self::Scalable(ScalableFloat::new(value))
    }

    /// A constant scaled by a level curve.
    pub fn scalar_with_curve(value: f32, curve: Curve) -> Self {
        Self::Scalable(ScalableFloat::with_curve(value, curve))
    }

    /// A plain attribute-based magnitude reading the current value with
    /// an identity envelope.
    pub fn from_attribute(capture: AttributeCaptureDefinition) -> Self {
        Self::AttributeBased {
            capture,
            channel: AttributeChannel::Current,
            coefficient: ScalableFloat::new(1.0),
            pre_multiply_additive: ScalableFloat::new(0.0),
            post_multiply_additive: ScalableFloat::new(0.0),
            level_curve: None,
        }
    }

    /// A caller-bound magnitude.
    pub fn set_by_caller(tag: GameplayTag) -> Self {
        Self::SetByCaller(tag)
    }

    /// A custom calculator with an identity envelope.
    pub fn custom(calculator: Arc<dyn CustomCalculator>) -> Self {
        Self::Custom {
            calculator,
            coefficient: ScalableFloat::new(1.0),
            pre_multiply_additive: ScalableFloat::new(0.0),
            post_multiply_additive: ScalableFloat::new(0.0),
            level_curve: None,
        }
    }

    /// The capture this magnitude depends on, if any.
    pub fn capture(&self) -> Option<&AttributeCaptureDefinition> {
        match self {
            Self::AttributeBased { capture, .. } => Some(capture),
            _ => None,
        }
    }
}

impl fmt::Debug for MagnitudeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalable(value) => f.debug_tuple("Scalable").field(value).finish(),
            Self::AttributeBased { capture, channel, .. } => f
                .debug_struct("AttributeBased")
                .field("capture", capture)
                .field("channel", channel)
                .finish_non_exhaustive(),
            Self::SetByCaller(tag) => f.debug_tuple("SetByCaller").field(tag).finish(),
            Self::Custom { .. } => f.write_str("Custom(..)"),
        }
    }
}

/// Applies the shared `(coefficient, pre, post, curve)` envelope to a
/// raw captured or calculated value.
pub(crate) fn apply_envelope(
    raw: f32,
    coefficient: &ScalableFloat,
    pre: &ScalableFloat,
    post: &ScalableFloat,
    level_curve: Option<&Curve>,
    level: i32,
) -> f32 {
    let enveloped =
        coefficient.evaluate(level) * (raw + pre.evaluate(level)) + post.evaluate(level);
    match level_curve {
        Some(curve) => enveloped * curve.evaluate(level as f32),
        None => enveloped,
    }
}
