//! ECS-side cue notification.

use bevy::prelude::*;

use crate::tags::TagContainer;

use super::data::CueEventKind;

/// Observer event mirroring every cue dispatch.
///
/// Systems that drive particles, audio, or UI can observe this instead
/// of registering a [`CueHandler`](super::CueHandler) object.
#[derive(Event, Debug, Clone)]
pub struct CueTriggeredEvent {
    /// Tags the cue dispatched under.
    pub tags: TagContainer,
    /// Which lifecycle moment fired.
    pub kind: CueEventKind,
    /// The entity the effect is applied to.
    pub target: Entity,
    /// The entity the effect originated from.
    pub source: Entity,
    /// Magnitude read from the cue's source.
    pub raw_magnitude: f32,
    /// Magnitude normalized against the cue's window.
    pub normalized_magnitude: f32,
}
