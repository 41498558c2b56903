//! System sets for ordering effect runtime systems.

use bevy::prelude::*;

/// System sets for the effect runtime.
///
/// Games that drive time through the plugin can order their own systems
/// against these sets. The runtime itself is synchronous: the tick set
/// contains the single exclusive system that advances every effects
/// manager by the frame delta.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectRuntimeSet {
    /// Advance durations and periods, process expirations and inhibition
    /// transitions for every entity with an effects manager.
    Tick,
}
