//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use bevy_effect_runtime::prelude::*;

/// A cue handler that records every callback it receives.
#[derive(Default, Clone)]
pub struct RecordingCueHandler {
    pub events: Arc<Mutex<Vec<(CueEventKind, f32, f32)>>>,
}

impl RecordingCueHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<(CueEventKind, f32, f32)> {
        self.events.lock().unwrap().clone()
    }

    pub fn count_of(&self, kind: CueEventKind) -> usize {
        self.recorded().iter().filter(|(k, _, _)| *k == kind).count()
    }

    fn record(&self, kind: CueEventKind, params: &CueParameters) {
        self.events.lock().unwrap().push((
            kind,
            params.raw_magnitude,
            params.normalized_magnitude,
        ));
    }
}

impl CueHandler for RecordingCueHandler {
    fn on_apply(&mut self, params: &CueParameters) {
        self.record(CueEventKind::Apply, params);
    }

    fn on_execute(&mut self, params: &CueParameters) {
        self.record(CueEventKind::Execute, params);
    }

    fn on_update(&mut self, params: &CueParameters) {
        self.record(CueEventKind::Update, params);
    }

    fn on_remove(&mut self, params: &CueParameters) {
        self.record(CueEventKind::Remove, params);
    }
}

pub fn tag(key: &str) -> GameplayTag {
    let registry = TagRegistry::new([key]).unwrap();
    registry.request_tag(key, true).unwrap()
}

pub fn tags(keys: &[&str]) -> TagContainer {
    let registry = TagRegistry::new(keys.to_vec()).unwrap();
    registry.request_tag_container(keys.to_vec(), true).unwrap()
}

/// A world with the cue manager resource, one source entity, and one
/// target entity carrying the given attribute set.
pub fn world_with(attributes: AttributeSet) -> (World, Entity, Entity) {
    let mut world = World::new();
    world.insert_resource(CueManager::new());
    let source = world.spawn_empty().id();
    let target = world.spawn(attributes).id();
    (world, source, target)
}

pub fn current(world: &World, entity: Entity, name: &str) -> i32 {
    world
        .get::<AttributeSet>(entity)
        .and_then(|set| set.get(name))
        .map(|attribute| attribute.current_value())
        .unwrap_or_else(|| panic!("attribute {name} missing"))
}

pub fn base(world: &World, entity: Entity, name: &str) -> i32 {
    world
        .get::<AttributeSet>(entity)
        .and_then(|set| set.get(name))
        .map(|attribute| attribute.base_value())
        .unwrap_or_else(|| panic!("attribute {name} missing"))
}

pub fn modifier(world: &World, entity: Entity, name: &str) -> i32 {
    world
        .get::<AttributeSet>(entity)
        .and_then(|set| set.get(name))
        .map(|attribute| attribute.modifier())
        .unwrap_or_else(|| panic!("attribute {name} missing"))
}

pub fn register_cue(world: &mut World, key: &str) -> RecordingCueHandler {
    let handler = RecordingCueHandler::new();
    world
        .resource_mut::<CueManager>()
        .register_cue(tag(key), handler.clone());
    handler
}
