//! Attribute write transactions and live dependency tracking.
//!
//! Every public engine operation runs inside a transaction: attribute
//! writes are logged, dependent non-snapshot effects re-evaluate as the
//! log grows, and only at commit do external observers hear about the
//! result. Listeners therefore see one net change per attribute per
//! transaction, and each update cue fires once with final magnitudes.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bevy::prelude::*;

use crate::attributes::{
    AttributeChange, AttributeChangedEvent, AttributeSet, GameplayAttribute,
};
use crate::attributes::set::AttributeWrite;
use crate::core::ActiveEffectHandle;
use crate::cues::{
    CueData, CueEventKind, CueMagnitudeType, CueManager, CueParameters, CueTriggeredEvent,
};

use super::definition::EffectData;
use super::systems::{
    GameplayEffectAppliedEvent, GameplayEffectRemovedEvent, PeriodicEffectExecutedEvent,
};

/// Upper bound on log entries processed by one propagation walk.
/// Cross-effect dependency chains settle well below this; hitting it
/// means a feedback loop between effects.
const MAX_PROPAGATION: usize = 256;

/// Index of non-snapshot capture subscriptions.
///
/// Keyed by the watched `(entity, attribute)`; values name the active
/// effects to re-evaluate when it changes.
#[derive(Resource, Default)]
pub(crate) struct DependencyIndex {
    listeners: HashMap<(Entity, String), Vec<(Entity, u64)>>,
}

impl DependencyIndex {
    pub(crate) fn register(
        &mut self,
        watched: Entity,
        attribute: &str,
        target: Entity,
        effect_id: u64,
    ) {
        let listeners = self
            .listeners
            .entry((watched, attribute.to_string()))
            .or_default();
        if !listeners.contains(&(target, effect_id)) {
            listeners.push((target, effect_id));
        }
    }

    pub(crate) fn unregister_effect(&mut self, target: Entity, effect_id: u64) {
        self.listeners.retain(|_, listeners| {
            listeners.retain(|&(t, id)| !(t == target && id == effect_id));
            !listeners.is_empty()
        });
    }

    pub(crate) fn listeners_for(&self, watched: Entity, attribute: &str) -> Vec<(Entity, u64)> {
        self.listeners
            .get(&(watched, attribute.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

/// Which cues an update dispatch reaches.
#[derive(Debug, Clone, Default)]
pub(crate) struct CueUpdateScope {
    /// Stack-count and level magnitudes (stack merges).
    pub(crate) stacking: bool,
    /// Everything except stack count (level-ups).
    pub(crate) level_and_magnitude: bool,
    /// Cues whose magnitude references one of these attributes
    /// (dependency refreshes).
    pub(crate) attributes: BTreeSet<String>,
}

impl CueUpdateScope {
    pub(crate) fn stacking() -> Self {
        Self {
            stacking: true,
            ..Default::default()
        }
    }

    pub(crate) fn level_and_magnitude() -> Self {
        Self {
            level_and_magnitude: true,
            ..Default::default()
        }
    }

    pub(crate) fn attributes<I: IntoIterator<Item = String>>(attributes: I) -> Self {
        Self {
            attributes: attributes.into_iter().collect(),
            ..Default::default()
        }
    }

    fn merge(&mut self, other: CueUpdateScope) {
        self.stacking |= other.stacking;
        self.level_and_magnitude |= other.level_and_magnitude;
        self.attributes.extend(other.attributes);
    }

    fn passes(&self, magnitude_type: &CueMagnitudeType) -> bool {
        if self.stacking
            && matches!(
                magnitude_type,
                CueMagnitudeType::StackCount | CueMagnitudeType::EffectLevel
            )
        {
            return true;
        }
        if self.level_and_magnitude && !matches!(magnitude_type, CueMagnitudeType::StackCount) {
            return true;
        }
        magnitude_type
            .attribute()
            .is_some_and(|name| self.attributes.contains(name))
    }
}

/// A deferred cue dispatch.
///
/// Carries everything needed at commit so dispatch survives the record
/// being removed mid-transaction (remove cues outlive their effect).
pub(crate) struct PendingCue {
    pub(crate) data: Arc<EffectData>,
    pub(crate) target: Entity,
    pub(crate) source: Entity,
    pub(crate) level: i32,
    pub(crate) stack_count: i32,
    pub(crate) kind: CueEventKind,
    /// Identity for update deduplication within a transaction.
    pub(crate) effect_id: Option<u64>,
    /// Update dispatches reach only the cues in scope.
    pub(crate) scope: CueUpdateScope,
    /// Net deltas this effect applied per attribute, for
    /// `AttributeValueChange` magnitudes.
    pub(crate) value_changes: HashMap<String, f32>,
    pub(crate) custom_parameters: HashMap<String, f32>,
    /// Whether any modifier found its attribute this transaction.
    pub(crate) any_modifier_success: bool,
}

/// Events the engine raises on commit.
pub(crate) enum EngineEvent {
    Applied {
        target: Entity,
        effect: String,
        handle: Option<ActiveEffectHandle>,
    },
    Removed {
        target: Entity,
        effect: String,
        expired: bool,
    },
    PeriodicExecuted {
        target: Entity,
        effect: String,
    },
}

/// Accumulated state of one engine operation.
#[derive(Default)]
pub(crate) struct Transaction {
    /// Append-only log of observed attribute changes; drives dependency
    /// propagation and is merged per attribute at commit.
    pub(crate) log: Vec<(Entity, AttributeChange)>,
    cues: Vec<PendingCue>,
    pub(crate) events: Vec<EngineEvent>,
}

impl Transaction {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Applies one attribute write, logging every resulting change
    /// (hook cascades included). Returns the net current-value delta on
    /// the written attribute itself.
    pub(crate) fn write_attribute(
        &mut self,
        world: &mut World,
        entity: Entity,
        name: &str,
        write: AttributeWrite,
    ) -> i32 {
        let changes = match world.get_mut::<AttributeSet>(entity) {
            Some(mut set) => set.apply_write(name, write),
            None => Vec::new(),
        };
        let mut direct = 0;
        for change in changes {
            if change.attribute == name {
                direct += change.delta();
            }
            self.log.push((entity, change));
        }
        direct
    }

    /// Enqueues a cue dispatch. Update dispatches for the same active
    /// effect merge into one.
    pub(crate) fn enqueue_cue(&mut self, cue: PendingCue) {
        if cue.kind == CueEventKind::Update
            && let Some(existing) = self.cues.iter_mut().find(|pending| {
                pending.kind == CueEventKind::Update
                    && pending.effect_id == cue.effect_id
                    && pending.target == cue.target
                    && pending.effect_id.is_some()
            })
        {
            existing.scope.merge(cue.scope);
            for (attribute, delta) in cue.value_changes {
                *existing.value_changes.entry(attribute).or_insert(0.0) += delta;
            }
            existing.custom_parameters.extend(cue.custom_parameters);
            existing.any_modifier_success |= cue.any_modifier_success;
            existing.level = cue.level;
            existing.stack_count = cue.stack_count;
            return;
        }
        self.cues.push(cue);
    }

    /// Walks the change log, re-evaluating every non-snapshot listener
    /// of each changed attribute. New writes extend the log and are
    /// walked in turn.
    pub(crate) fn propagate(&mut self, world: &mut World) {
        let mut cursor = 0;
        let mut processed = 0;
        while cursor < self.log.len() {
            if processed >= MAX_PROPAGATION {
                warn!("attribute dependency propagation did not settle, stopping");
                break;
            }
            let (entity, change) = self.log[cursor].clone();
            cursor += 1;
            processed += 1;
            if change.delta() == 0 {
                continue;
            }
            let listeners = world
                .get_resource::<DependencyIndex>()
                .map(|index| index.listeners_for(entity, &change.attribute))
                .unwrap_or_default();
            for (target, effect_id) in listeners {
                super::lifecycle::re_evaluate_effect(
                    world,
                    self,
                    target,
                    effect_id,
                    CueUpdateScope::attributes([change.attribute.clone()]),
                );
            }
        }
    }

    /// Publishes the transaction: merged attribute change events, cue
    /// dispatches with final magnitudes, and engine events.
    pub(crate) fn commit(self, world: &mut World) {
        // Merge the log down to one net change per (entity, attribute).
        let mut merged: Vec<(Entity, AttributeChange)> = Vec::new();
        for (entity, change) in self.log {
            match merged
                .iter_mut()
                .find(|(e, c)| *e == entity && c.attribute == change.attribute)
            {
                Some((_, existing)) => existing.new_current = change.new_current,
                None => merged.push((entity, change)),
            }
        }
        for (entity, change) in merged {
            if change.delta() != 0 {
                world.trigger(AttributeChangedEvent {
                    entity,
                    attribute: change.attribute,
                    old_value: change.old_current,
                    new_value: change.new_current,
                });
            }
        }

        for pending in &self.cues {
            dispatch_pending_cue(world, pending);
        }

        for event in self.events {
            match event {
                EngineEvent::Applied {
                    target,
                    effect,
                    handle,
                } => world.trigger(GameplayEffectAppliedEvent {
                    target,
                    effect,
                    handle,
                }),
                EngineEvent::Removed {
                    target,
                    effect,
                    expired,
                } => world.trigger(GameplayEffectRemovedEvent {
                    target,
                    effect,
                    expired,
                }),
                EngineEvent::PeriodicExecuted { target, effect } => {
                    world.trigger(PeriodicEffectExecutedEvent { target, effect })
                }
            }
        }
    }
}

/// Reads one attribute off an entity's set.
pub(crate) fn read_attribute(
    world: &World,
    entity: Entity,
    name: &str,
) -> Option<GameplayAttribute> {
    world
        .get::<AttributeSet>(entity)
        .and_then(|set| set.get(name).copied())
}

fn dispatch_pending_cue(world: &mut World, pending: &PendingCue) {
    for cue in &pending.data.cues {
        if pending.kind == CueEventKind::Update && !pending.scope.passes(&cue.magnitude_type) {
            continue;
        }

        let (raw, attribute_found) = resolve_cue_magnitude(world, cue, pending);
        if pending.data.require_modifier_success_to_trigger_cue
            && (!attribute_found || !pending.any_modifier_success)
        {
            continue;
        }

        let params = CueParameters {
            target: pending.target,
            source: pending.source,
            raw_magnitude: raw,
            normalized_magnitude: cue.normalize(raw),
            custom_parameters: pending.custom_parameters.clone(),
        };
        if let Some(manager) = world.get_resource::<CueManager>() {
            manager.dispatch(&cue.tags, pending.kind, &params);
        }
        world.trigger(CueTriggeredEvent {
            tags: cue.tags.clone(),
            kind: pending.kind,
            target: pending.target,
            source: pending.source,
            raw_magnitude: params.raw_magnitude,
            normalized_magnitude: params.normalized_magnitude,
        });
    }
}

/// Resolves a cue's raw magnitude from its live source. The second
/// value reports whether the backing attribute exists (always true for
/// level and stack sources).
fn resolve_cue_magnitude(world: &World, cue: &CueData, pending: &PendingCue) -> (f32, bool) {
    use crate::attributes::AttributeChannel;

    let channel_read = |name: &str, channel: AttributeChannel| -> (f32, bool) {
        match read_attribute(world, pending.target, name) {
            Some(attribute) => (attribute.channel_value(channel) as f32, true),
            None => (0.0, false),
        }
    };

    match &cue.magnitude_type {
        CueMagnitudeType::AttributeValueChange(name) => (
            pending.value_changes.get(name).copied().unwrap_or(0.0),
            read_attribute(world, pending.target, name).is_some(),
        ),
        CueMagnitudeType::AttributeCurrentValue(name) => {
            channel_read(name, AttributeChannel::Current)
        }
        CueMagnitudeType::AttributeBaseValue(name) => channel_read(name, AttributeChannel::Base),
        CueMagnitudeType::AttributeModifier(name) => channel_read(name, AttributeChannel::Modifier),
        CueMagnitudeType::AttributeValidModifier(name) => {
            channel_read(name, AttributeChannel::ValidModifier)
        }
        CueMagnitudeType::AttributeOverflow(name) => channel_read(name, AttributeChannel::Overflow),
        CueMagnitudeType::AttributeMin(name) => channel_read(name, AttributeChannel::Min),
        CueMagnitudeType::AttributeMax(name) => channel_read(name, AttributeChannel::Max),
        CueMagnitudeType::AttributeMagnitudeUpToChannel(name) => {
            channel_read(name, AttributeChannel::MagnitudeUpToChannel)
        }
        CueMagnitudeType::EffectLevel => (pending.level as f32, true),
        CueMagnitudeType::StackCount => (pending.stack_count as f32, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_registers_and_unregisters() {
        let mut index = DependencyIndex::default();
        let watched = Entity::from_bits(1);
        let target = Entity::from_bits(2);

        index.register(watched, "mana", target, 7);
        index.register(watched, "mana", target, 7);
        assert_eq!(index.listeners_for(watched, "mana"), vec![(target, 7)]);

        index.unregister_effect(target, 7);
        assert!(index.listeners_for(watched, "mana").is_empty());
    }

    #[test]
    fn scope_filters_magnitude_types() {
        let stacking = CueUpdateScope::stacking();
        assert!(stacking.passes(&CueMagnitudeType::StackCount));
        assert!(stacking.passes(&CueMagnitudeType::EffectLevel));
        assert!(!stacking.passes(&CueMagnitudeType::AttributeCurrentValue("health".into())));

        let level = CueUpdateScope::level_and_magnitude();
        assert!(level.passes(&CueMagnitudeType::EffectLevel));
        assert!(level.passes(&CueMagnitudeType::AttributeCurrentValue("health".into())));
        assert!(!level.passes(&CueMagnitudeType::StackCount));

        let attrs = CueUpdateScope::attributes(["health".to_string()]);
        assert!(attrs.passes(&CueMagnitudeType::AttributeValueChange("health".into())));
        assert!(!attrs.passes(&CueMagnitudeType::AttributeValueChange("mana".into())));
    }
}
