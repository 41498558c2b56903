//! Runtime components of the effect engine.
//!
//! Each entity that receives effects carries an [`EffectsManager`]
//! holding its active effects in insertion order, and an
//! [`EntityTags`] component tracking owned tags plus counted grants
//! from active effects.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;

use crate::attributes::GameplayAttribute;
use crate::magnitudes::AttributeCaptureDefinition;
use crate::tags::{GameplayTag, TagContainer};

use super::definition::EffectData;

/// One committed modifier contribution, remembered so removal and
/// re-evaluation are exact.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AppliedModifier {
    pub(crate) attribute: String,
    pub(crate) delta: i32,
}

/// How a capture reads its attribute.
#[derive(Debug, Clone)]
pub(crate) enum CaptureMode {
    /// Frozen at instantiation. `None` when the attribute was missing
    /// at that moment; it stays missing for the effect's lifetime.
    Snapshot(Option<GameplayAttribute>),
    /// Re-read live on every evaluation.
    Live,
}

/// A resolved attribute capture of one active effect.
#[derive(Debug, Clone)]
pub(crate) struct CaptureSlot {
    pub(crate) def: AttributeCaptureDefinition,
    /// The concrete entity the capture reads from.
    pub(crate) entity: Entity,
    pub(crate) mode: CaptureMode,
}

/// A live binding of an effect template to a target.
pub(crate) struct ActiveEffect {
    pub(crate) id: u64,
    pub(crate) data: Arc<EffectData>,
    pub(crate) source: Entity,
    pub(crate) level: i32,
    pub(crate) set_by_caller: HashMap<GameplayTag, f32>,
    /// Seconds left; unused for infinite effects.
    pub(crate) remaining_duration: f32,
    pub(crate) period: f32,
    pub(crate) period_accumulator: f32,
    pub(crate) stack_count: i32,
    pub(crate) inhibited: bool,
    /// Modifier deltas currently written into attributes. Empty while
    /// inhibited or for periodic effects.
    pub(crate) committed: Vec<AppliedModifier>,
    pub(crate) captures: Vec<CaptureSlot>,
    /// Tags currently granted to the target by this effect.
    pub(crate) granted_tags: TagContainer,
}

impl ActiveEffect {
    pub(crate) fn has_duration(&self) -> bool {
        matches!(
            self.data.duration,
            super::definition::DurationData::HasDuration(_)
        )
    }

    pub(crate) fn is_periodic(&self) -> bool {
        self.data.periodic.is_some()
    }
}

/// Inspection snapshot of one active stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackInfo {
    pub stack_count: i32,
    pub level: i32,
    /// Seconds left; 0.0 for infinite effects.
    pub remaining_duration: f32,
    pub inhibited: bool,
}

/// Per-entity list of active effects, in insertion order.
///
/// The manager is exclusively owned by its entity; all mutation goes
/// through the [`GameplayEffectsExt`](super::GameplayEffectsExt) world
/// extension.
#[derive(Component, Default)]
pub struct EffectsManager {
    pub(crate) effects: Vec<ActiveEffect>,
    next_id: u64,
}

impl EffectsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active effects, inhibited ones included.
    pub fn active_effect_count(&self) -> usize {
        self.effects.len()
    }

    pub(crate) fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(crate) fn contains(&self, id: u64) -> bool {
        self.effects.iter().any(|effect| effect.id == id)
    }

    pub(crate) fn get(&self, id: u64) -> Option<&ActiveEffect> {
        self.effects.iter().find(|effect| effect.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut ActiveEffect> {
        self.effects.iter_mut().find(|effect| effect.id == id)
    }

    pub(crate) fn take(&mut self, id: u64) -> Option<ActiveEffect> {
        let index = self.effects.iter().position(|effect| effect.id == id)?;
        Some(self.effects.remove(index))
    }

    pub(crate) fn ids(&self) -> Vec<u64> {
        self.effects.iter().map(|effect| effect.id).collect()
    }
}

/// The tag state of an entity: tags it owns plus tags granted by
/// active effects.
///
/// Grants are counted so overlapping effects granting the same tag do
/// not clobber each other on removal.
#[derive(Component, Default)]
pub struct EntityTags {
    owned: TagContainer,
    granted: HashMap<GameplayTag, u32>,
}

impl EntityTags {
    pub fn new(owned: TagContainer) -> Self {
        Self {
            owned,
            granted: HashMap::new(),
        }
    }

    /// Tags the entity owns outright.
    pub fn owned(&self) -> &TagContainer {
        &self.owned
    }

    pub(crate) fn owned_mut(&mut self) -> &mut TagContainer {
        &mut self.owned
    }

    /// Tags currently granted by active effects.
    pub fn granted(&self) -> TagContainer {
        TagContainer::from_tags(self.granted.keys().cloned())
    }

    /// Owned and granted tags together; this is the state requirements
    /// are checked against.
    pub fn combined(&self) -> TagContainer {
        let mut combined = self.owned.clone();
        for tag in self.granted.keys() {
            combined.add_tag(tag.clone());
        }
        combined
    }

    pub(crate) fn grant(&mut self, tags: &TagContainer) {
        for tag in tags.iter() {
            *self.granted.entry(tag.clone()).or_insert(0) += 1;
        }
    }

    pub(crate) fn revoke(&mut self, tags: &TagContainer) {
        for tag in tags.iter() {
            if let Some(count) = self.granted.get_mut(tag) {
                *count -= 1;
                if *count == 0 {
                    self.granted.remove(tag);
                }
            }
        }
    }
}
