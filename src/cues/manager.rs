//! Cue handler registration and dispatch.
//!
//! Handlers are registered against a tag; a cue dispatch reaches every
//! handler whose tag the cue's container carries (with hierarchy, so a
//! handler on "fx.fire" hears "fx.fire.burst"). Unregistered cue tags
//! match nothing and fail silently.

use std::sync::{Arc, Mutex};

use bevy::prelude::*;

use crate::tags::{GameplayTag, TagContainer};

use super::data::{CueEventKind, CueParameters};

/// Receiver for cue notifications.
///
/// All callbacks default to no-ops so a handler only implements the
/// moments it cares about. Handlers run inside the mutating engine
/// call; they may read state but must not mutate the dispatching
/// entity's effect list.
pub trait CueHandler: Send + Sync + 'static {
    fn on_apply(&mut self, params: &CueParameters) {
        let _ = params;
    }

    fn on_execute(&mut self, params: &CueParameters) {
        let _ = params;
    }

    fn on_update(&mut self, params: &CueParameters) {
        let _ = params;
    }

    fn on_remove(&mut self, params: &CueParameters) {
        let _ = params;
    }
}

/// Shared, lockable handler reference so one handler can serve several
/// registration tags.
pub type SharedCueHandler = Arc<Mutex<dyn CueHandler>>;

/// Registry of cue handlers.
///
/// Registration order is dispatch order, which keeps notification
/// sequences deterministic.
#[derive(Resource, Default)]
pub struct CueManager {
    handlers: Vec<(GameplayTag, SharedCueHandler)>,
}

impl CueManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under a single tag.
    pub fn register_cue(&mut self, tag: GameplayTag, handler: impl CueHandler) {
        self.register_shared(tag, Arc::new(Mutex::new(handler)));
    }

    /// Registers one shared handler under every tag of a container.
    pub fn register_cue_container(&mut self, tags: &TagContainer, handler: SharedCueHandler) {
        for tag in tags.iter() {
            self.register_shared(tag.clone(), handler.clone());
        }
    }

    /// Registers an already-shared handler under a tag.
    pub fn register_shared(&mut self, tag: GameplayTag, handler: SharedCueHandler) {
        if tag.is_valid() {
            self.handlers.push((tag, handler));
        }
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Dispatches one cue event to every handler whose tag the cue's
    /// container carries.
    pub fn dispatch(&self, cue_tags: &TagContainer, kind: CueEventKind, params: &CueParameters) {
        for (tag, handler) in &self.handlers {
            if !cue_tags.has_tag(tag) {
                continue;
            }
            let mut handler = handler
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match kind {
                CueEventKind::Apply => handler.on_apply(params),
                CueEventKind::Execute => handler.on_execute(params),
                CueEventKind::Update => handler.on_update(params),
                CueEventKind::Remove => handler.on_remove(params),
            }
        }
    }
}
