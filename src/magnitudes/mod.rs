//! Magnitude pipeline.
//!
//! Everything that turns a modifier specification into a number: curves
//! and level-scalable values, attribute captures, the magnitude sum
//! type, and the custom calculator/execution extension points. The
//! actual evaluation against world state happens in the effect engine,
//! which owns the capture snapshots.

pub mod calculator;
pub mod capture;
pub mod curve;
pub mod magnitude;

pub use calculator::{
    CalculatorContext, CustomCalculator, CustomExecution, ExecutionTarget, ModifierEvaluatedData,
};
pub use capture::{AttributeCaptureDefinition, CaptureSource};
pub use curve::{Curve, ScalableFloat, ScalableInt};
pub use magnitude::MagnitudeSpec;
