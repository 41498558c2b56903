//! Error types for the effect runtime.
//!
//! Errors split into two families: validation errors from the tag layer
//! (`TagError`) and contract errors from the effect layer (`EffectError`).
//! Tolerant lookups (missing attributes, unknown cue tags) do not error at
//! all; they yield sentinel values instead.

use thiserror::Error;

/// Validation errors raised by the tag registry, containers, and the
/// wire codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// The requested key has not been registered with the tag registry.
    #[error("tag key `{0}` is not registered")]
    NotRegistered(String),

    /// The key failed validation at registry construction.
    #[error("invalid tag key `{key}`: {reason}")]
    InvalidKey { key: String, reason: String },

    /// A serialized net index lies strictly beyond the registry's
    /// invalid-index sentinel.
    #[error("net index {0} is out of range for this registry")]
    InvalidNetIndex(u16),

    /// A container holds more tags than the wire format can carry.
    #[error("container holds {count} tags, wire format allows at most {max}")]
    ContainerTooLarge { count: usize, max: usize },

    /// The byte stream ended before the declared payload was read.
    #[error("tag container stream ended prematurely")]
    StreamTooShort,

    /// More tags than the 16-bit net index space can address.
    #[error("registry would hold {0} nodes, exceeding the net index space")]
    RegistryTooLarge(usize),
}

/// Contract errors raised by the effect lifecycle engine.
///
/// These indicate a misuse of the API rather than bad data: the caller
/// violated a precondition the engine enforces.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// A non-snapshot capture references an attribute the same effect
    /// writes through its own modifiers.
    #[error("effect `{effect}` captures attribute `{attribute}` that it also modifies")]
    DependencyCycle { effect: String, attribute: String },

    /// The combination of duration, period, and stacking policies is
    /// logically incoherent.
    #[error("incoherent effect configuration for `{effect}`: {reason}")]
    IncoherentPolicy { effect: String, reason: String },

    /// The handle no longer refers to a live active effect.
    #[error("active effect handle is stale")]
    StaleHandle,

    /// The target entity carries no effects manager (or no longer exists).
    #[error("entity has no effects manager")]
    MissingEffectsManager,
}
