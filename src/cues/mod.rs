//! Cue pipeline.
//!
//! Cues are typed side-channel notifications raised as effects apply,
//! execute, update, and end. Each cue carries a magnitude read live
//! from one of several sources and normalized against the cue's
//! configured window. The engine delivers structured events only;
//! rendering and audio stay with the host game.

pub mod data;
pub mod events;
pub mod manager;
pub mod plugin;

pub use data::{CueData, CueEventKind, CueMagnitudeType, CueParameters};
pub use events::CueTriggeredEvent;
pub use manager::{CueHandler, CueManager, SharedCueHandler};
pub use plugin::CuePlugin;
