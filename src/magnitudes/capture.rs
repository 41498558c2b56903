//! Attribute capture definitions.
//!
//! A capture names an attribute on the effect's source or target and
//! whether its value is frozen at effect instantiation (snapshot) or
//! re-read live, in which case the engine subscribes to the attribute's
//! changes and re-evaluates the effect when it moves.

/// Which side of the effect the captured attribute lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureSource {
    /// The entity the effect originated from.
    Source,
    /// The entity the effect is applied to.
    Target,
}

/// Declaration of one attribute capture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeCaptureDefinition {
    /// Name of the captured attribute.
    pub attribute: String,
    /// Side the attribute is read from.
    pub source: CaptureSource,
    /// Freeze at instantiation instead of tracking live changes.
    pub snapshot: bool,
}

impl AttributeCaptureDefinition {
    /// A capture of an attribute on the effect's source.
    pub fn source(attribute: impl Into<String>, snapshot: bool) -> Self {
        Self {
            attribute: attribute.into(),
            source: CaptureSource::Source,
            snapshot,
        }
    }

    /// A capture of an attribute on the effect's target.
    pub fn target(attribute: impl Into<String>, snapshot: bool) -> Self {
        Self {
            attribute: attribute.into(),
            source: CaptureSource::Target,
            snapshot,
        }
    }
}
