//! Custom calculator and custom execution extension points.
//!
//! These are the only open extension points of the magnitude pipeline.
//! Both declare the attribute captures they need up front so the engine
//! can marshal them into its uniform snapshot/live tracking, and both
//! operate on a context of pre-resolved capture values rather than on
//! world state directly.

use std::collections::HashMap;

use crate::tags::GameplayTag;

use super::capture::{AttributeCaptureDefinition, CaptureSource};

/// Evaluation context handed to calculators and executions.
///
/// Capture values are resolved by the engine before the call: snapshot
/// captures carry their frozen value, live captures the current one.
/// Entries written into `custom_parameters` flow into cue dispatch.
pub struct CalculatorContext<'a> {
    /// Current effect level.
    pub level: i32,
    /// Current stack count (1 for non-stacking effects).
    pub stack_count: i32,
    captured: &'a [(AttributeCaptureDefinition, f32)],
    set_by_caller: &'a HashMap<GameplayTag, f32>,
    /// Free-form values surfaced to cue handlers of this dispatch.
    pub custom_parameters: &'a mut HashMap<String, f32>,
}

impl<'a> CalculatorContext<'a> {
    pub(crate) fn new(
        level: i32,
        stack_count: i32,
        captured: &'a [(AttributeCaptureDefinition, f32)],
        set_by_caller: &'a HashMap<GameplayTag, f32>,
        custom_parameters: &'a mut HashMap<String, f32>,
    ) -> Self {
        Self {
            level,
            stack_count,
            captured,
            set_by_caller,
            custom_parameters,
        }
    }

    /// Value of a declared capture; 0.0 when the attribute was missing
    /// or the capture was never declared.
    pub fn captured_value(&self, attribute: &str, source: CaptureSource) -> f32 {
        self.captured
            .iter()
            .find(|(def, _)| def.attribute == attribute && def.source == source)
            .map_or(0.0, |(_, value)| *value)
    }

    /// A value the caller bound on the effect by tag, if any.
    pub fn set_by_caller(&self, tag: &GameplayTag) -> Option<f32> {
        self.set_by_caller.get(tag).copied()
    }
}

/// User-defined magnitude source.
///
/// The returned value is passed through the same
/// coefficient/pre/post/curve envelope as attribute-based magnitudes.
pub trait CustomCalculator: Send + Sync + 'static {
    /// Captures this calculator needs resolved before evaluation.
    fn captures(&self) -> Vec<AttributeCaptureDefinition> {
        Vec::new()
    }

    /// Produces the raw magnitude.
    fn calculate(&self, ctx: &mut CalculatorContext<'_>) -> f32;
}

/// Which entity an execution's output lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionTarget {
    Source,
    Target,
}

/// One attribute write produced by a custom execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierEvaluatedData {
    pub target: ExecutionTarget,
    pub attribute: String,
    pub magnitude: f32,
}

impl ModifierEvaluatedData {
    pub fn new(target: ExecutionTarget, attribute: impl Into<String>, magnitude: f32) -> Self {
        Self {
            target,
            attribute: attribute.into(),
            magnitude,
        }
    }
}

/// User-defined execution replacing an effect's modifier list.
///
/// Executions run with instant semantics: their outputs are applied as
/// base-value deltas on the named entities, once per execution (on
/// apply for instant effects, per period for periodic ones).
pub trait CustomExecution: Send + Sync + 'static {
    /// Captures this execution needs resolved before evaluation.
    fn captures(&self) -> Vec<AttributeCaptureDefinition> {
        Vec::new()
    }

    /// Produces the attribute writes for one execution.
    fn execute(&self, ctx: &mut CalculatorContext<'_>) -> Vec<ModifierEvaluatedData>;
}
