//! Effect application and the public engine surface.
//!
//! All engine operations hang off [`GameplayEffectsExt`], an extension
//! trait on [`World`]. Operations are synchronous and run to completion
//! on the caller's stack: attribute writes, dependency re-evaluation,
//! inhibition transitions, and cue dispatch all settle before the call
//! returns. Handlers invoked during dispatch may read state but must
//! not mutate the same entity's effect list.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;

use crate::attributes::set::AttributeWrite;
use crate::core::{ActiveEffectHandle, EffectError};
use crate::cues::CueEventKind;
use crate::effect_components::{CanApplyContext, EffectComponent as _};
use crate::magnitudes::{
    AttributeCaptureDefinition, CaptureSource, CustomCalculator as _, CustomExecution as _,
    MagnitudeSpec,
};
use crate::tags::{GameplayTag, TagContainer};

use super::components::{
    ActiveEffect, CaptureMode, CaptureSlot, EffectsManager, EntityTags, StackInfo,
};
use super::definition::{Effect, EffectData};
use super::dependencies::{
    CueUpdateScope, DependencyIndex, EngineEvent, PendingCue, Transaction, read_attribute,
};
use super::lifecycle::{
    EffectEvalView, collect_modifier_tags, commit_modifiers, effect_duration, effect_period,
    entity_combined_tags, execute_once, execute_periodic, ongoing_met, re_evaluate_effect,
    record_view, refresh_inhibition_states, remove_effect, set_effect_level,
    update_entity_effects, with_record,
};
use super::stacking::{
    ApplicationRefreshPolicy, LevelOverrideStackCountPolicy, StackLevelPolicy, StackOverflowPolicy,
    StackPolicy, StackingData,
};

/// World extension exposing the effect engine.
pub trait GameplayEffectsExt {
    /// Applies an effect to a target.
    ///
    /// Instant effects return `Ok(None)` after committing their writes;
    /// persistent effects return a handle unless a component veto or
    /// stacking policy denied the application (`Ok(None)`, no side
    /// effects). Contract violations (a non-snapshot capture of an
    /// attribute the effect itself modifies) are errors.
    fn apply_effect(
        &mut self,
        target: Entity,
        effect: &Effect,
    ) -> Result<Option<ActiveEffectHandle>, EffectError>;

    /// Predicts whether an application would pass the component gates
    /// and stacking denial policies. Chance components roll their
    /// injected randomness here too.
    fn can_apply_effect(&self, target: Entity, effect: &Effect) -> bool;

    /// Removes an active effect by handle. Returns `Ok(false)` when the
    /// handle is stale.
    fn unapply_effect(&mut self, handle: ActiveEffectHandle) -> Result<bool, EffectError>;

    /// Advances every active effect on the target by `delta_secs`.
    fn update_effects(&mut self, target: Entity, delta_secs: f32);

    /// Inspection of the active stacks created from a template.
    fn effect_stack_info(&self, target: Entity, data: &Arc<EffectData>) -> Vec<StackInfo>;

    /// Sets the level of one active effect. No-op for effects that
    /// snapshotted their level.
    fn update_effect_level(
        &mut self,
        handle: ActiveEffectHandle,
        level: i32,
    ) -> Result<(), EffectError>;

    /// Bumps the authoring level of `effect` and re-evaluates every
    /// active effect applied from it. Returns the new level.
    fn level_up_effect(&mut self, effect: &mut Effect) -> i32;

    /// Adds a tag to the entity's owned set and re-checks ongoing
    /// requirements of its active effects.
    fn add_owned_tag(&mut self, entity: Entity, tag: GameplayTag);

    /// Removes a tag from the entity's owned set and re-checks ongoing
    /// requirements of its active effects.
    fn remove_owned_tag(&mut self, entity: Entity, tag: &GameplayTag);

    /// Writes an attribute's base value through the engine so dependent
    /// effects and listeners observe the change.
    fn set_attribute_base_value(&mut self, entity: Entity, attribute: &str, value: i32);

    /// Adds to an attribute's base value through the engine.
    fn add_attribute_base_value(&mut self, entity: Entity, attribute: &str, delta: i32);

    /// Reconfigures an attribute's lower bound through the engine.
    fn set_attribute_min(&mut self, entity: Entity, attribute: &str, min: i32);

    /// Reconfigures an attribute's upper bound through the engine.
    fn set_attribute_max(&mut self, entity: Entity, attribute: &str, max: i32);
}

impl GameplayEffectsExt for World {
    fn apply_effect(
        &mut self,
        target: Entity,
        effect: &Effect,
    ) -> Result<Option<ActiveEffectHandle>, EffectError> {
        if self.get_entity(target).is_err() {
            return Err(EffectError::MissingEffectsManager);
        }
        self.init_resource::<DependencyIndex>();

        // Component gates run first; any refusal is silent.
        let tags = entity_combined_tags(self, target);
        let ctx = CanApplyContext {
            target_tags: &tags,
            level: effect.level(),
        };
        if !effect
            .data
            .components
            .iter()
            .all(|component| component.can_apply(&ctx))
        {
            return Ok(None);
        }

        if effect.data.is_instant() {
            let mut tx = Transaction::new();
            let view = instant_view(self, effect, target);
            let (value_changes, any_found, custom_parameters) = execute_once(self, &mut tx, &view);
            tx.enqueue_cue(PendingCue {
                data: effect.data.clone(),
                target,
                source: effect.source,
                level: effect.level(),
                stack_count: 1,
                kind: CueEventKind::Execute,
                effect_id: None,
                scope: CueUpdateScope::default(),
                value_changes,
                custom_parameters,
                any_modifier_success: any_found,
            });
            tx.propagate(self);
            tx.commit(self);
            return Ok(None);
        }

        ensure_runtime_components(self, target)?;

        let mut tx = Transaction::new();
        let outcome = match &effect.data.stacking {
            Some(stacking) => match find_existing_stack(self, target, effect, stacking) {
                Some(existing) => merge_into_stack(self, &mut tx, target, existing, effect),
                None => create_active_effect(self, &mut tx, target, effect).map(Some),
            },
            None => create_active_effect(self, &mut tx, target, effect).map(Some),
        }?;

        tx.propagate(self);
        tx.commit(self);
        Ok(outcome)
    }

    fn can_apply_effect(&self, target: Entity, effect: &Effect) -> bool {
        if self.get_entity(target).is_err() {
            return false;
        }
        let tags = entity_combined_tags(self, target);
        let ctx = CanApplyContext {
            target_tags: &tags,
            level: effect.level(),
        };
        if !effect
            .data
            .components
            .iter()
            .all(|component| component.can_apply(&ctx))
        {
            return false;
        }

        if let Some(stacking) = &effect.data.stacking
            && let Some(existing) = find_existing_stack(self, target, effect, stacking)
            && let Some(record) = self
                .get::<EffectsManager>(target)
                .and_then(|manager| manager.get(existing))
        {
            let limit = stacking.stack_limit.evaluate(record.level).max(1);
            if record.stack_count >= limit
                && stacking.overflow_policy == StackOverflowPolicy::DenyApplication
            {
                return false;
            }
            if effect.level() != record.level
                && stacking
                    .level_denial_policy
                    .matches(effect.level(), record.level)
            {
                return false;
            }
        }
        true
    }

    fn unapply_effect(&mut self, handle: ActiveEffectHandle) -> Result<bool, EffectError> {
        let exists = self
            .get::<EffectsManager>(handle.target)
            .is_some_and(|manager| manager.contains(handle.id));
        if !exists {
            return Ok(false);
        }
        let mut tx = Transaction::new();
        remove_effect(self, &mut tx, handle.target, handle.id, false);
        refresh_inhibition_states(self, &mut tx, handle.target);
        tx.propagate(self);
        tx.commit(self);
        Ok(true)
    }

    fn update_effects(&mut self, target: Entity, delta_secs: f32) {
        if self.get::<EffectsManager>(target).is_none() {
            return;
        }
        self.init_resource::<DependencyIndex>();
        let mut tx = Transaction::new();
        update_entity_effects(self, &mut tx, target, delta_secs);
        tx.propagate(self);
        tx.commit(self);
    }

    fn effect_stack_info(&self, target: Entity, data: &Arc<EffectData>) -> Vec<StackInfo> {
        self.get::<EffectsManager>(target)
            .map(|manager| {
                manager
                    .effects
                    .iter()
                    .filter(|record| Arc::ptr_eq(&record.data, data))
                    .map(|record| StackInfo {
                        stack_count: record.stack_count,
                        level: record.level,
                        remaining_duration: if record.has_duration() {
                            record.remaining_duration
                        } else {
                            0.0
                        },
                        inhibited: record.inhibited,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn update_effect_level(
        &mut self,
        handle: ActiveEffectHandle,
        level: i32,
    ) -> Result<(), EffectError> {
        let exists = self
            .get::<EffectsManager>(handle.target)
            .is_some_and(|manager| manager.contains(handle.id));
        if !exists {
            return Err(EffectError::StaleHandle);
        }
        let mut tx = Transaction::new();
        set_effect_level(self, &mut tx, handle.target, handle.id, level);
        tx.propagate(self);
        tx.commit(self);
        Ok(())
    }

    fn level_up_effect(&mut self, effect: &mut Effect) -> i32 {
        let level = effect.level_up();
        let mut affected = Vec::new();
        let mut query = self.query::<(Entity, &EffectsManager)>();
        for (entity, manager) in query.iter(self) {
            for record in &manager.effects {
                if Arc::ptr_eq(&record.data, &effect.data) && record.source == effect.source {
                    affected.push((entity, record.id));
                }
            }
        }
        for (target, id) in affected {
            let mut tx = Transaction::new();
            set_effect_level(self, &mut tx, target, id, level);
            tx.propagate(self);
            tx.commit(self);
        }
        level
    }

    fn add_owned_tag(&mut self, entity: Entity, tag: GameplayTag) {
        let Ok(mut entity_mut) = self.get_entity_mut(entity) else {
            return;
        };
        if !entity_mut.contains::<EntityTags>() {
            entity_mut.insert(EntityTags::default());
        }
        if let Some(mut tags) = self.get_mut::<EntityTags>(entity) {
            tags.owned_mut().add_tag(tag);
        }
        self.init_resource::<DependencyIndex>();
        let mut tx = Transaction::new();
        refresh_inhibition_states(self, &mut tx, entity);
        tx.propagate(self);
        tx.commit(self);
    }

    fn remove_owned_tag(&mut self, entity: Entity, tag: &GameplayTag) {
        if let Some(mut tags) = self.get_mut::<EntityTags>(entity) {
            tags.owned_mut().remove_tag(tag);
        }
        self.init_resource::<DependencyIndex>();
        let mut tx = Transaction::new();
        refresh_inhibition_states(self, &mut tx, entity);
        tx.propagate(self);
        tx.commit(self);
    }

    fn set_attribute_base_value(&mut self, entity: Entity, attribute: &str, value: i32) {
        self.init_resource::<DependencyIndex>();
        let mut tx = Transaction::new();
        tx.write_attribute(self, entity, attribute, AttributeWrite::SetBaseValue(value));
        tx.propagate(self);
        tx.commit(self);
    }

    fn add_attribute_base_value(&mut self, entity: Entity, attribute: &str, delta: i32) {
        self.init_resource::<DependencyIndex>();
        let mut tx = Transaction::new();
        tx.write_attribute(self, entity, attribute, AttributeWrite::AddBaseValue(delta));
        tx.propagate(self);
        tx.commit(self);
    }

    fn set_attribute_min(&mut self, entity: Entity, attribute: &str, min: i32) {
        self.init_resource::<DependencyIndex>();
        let mut tx = Transaction::new();
        tx.write_attribute(self, entity, attribute, AttributeWrite::SetMin(min));
        tx.propagate(self);
        tx.commit(self);
    }

    fn set_attribute_max(&mut self, entity: Entity, attribute: &str, max: i32) {
        self.init_resource::<DependencyIndex>();
        let mut tx = Transaction::new();
        tx.write_attribute(self, entity, attribute, AttributeWrite::SetMax(max));
        tx.propagate(self);
        tx.commit(self);
    }
}

/// Inserts the runtime components a target needs, once.
fn ensure_runtime_components(world: &mut World, target: Entity) -> Result<(), EffectError> {
    let Ok(mut entity) = world.get_entity_mut(target) else {
        return Err(EffectError::MissingEffectsManager);
    };
    if !entity.contains::<EffectsManager>() {
        entity.insert(EffectsManager::default());
    }
    if !entity.contains::<EntityTags>() {
        entity.insert(EntityTags::default());
    }
    Ok(())
}

/// Collects every capture an effect needs: attribute-based modifier
/// captures plus the declared captures of calculators and executions.
fn build_captures(
    world: &World,
    data: &EffectData,
    source: Entity,
    target: Entity,
) -> Vec<CaptureSlot> {
    let mut defs: Vec<AttributeCaptureDefinition> = Vec::new();
    let mut push = |def: AttributeCaptureDefinition| {
        if !defs.contains(&def) {
            defs.push(def);
        }
    };

    for modifier in &data.modifiers {
        match &modifier.magnitude {
            MagnitudeSpec::AttributeBased { capture, .. } => push(capture.clone()),
            MagnitudeSpec::Custom { calculator, .. } => {
                for def in calculator.captures() {
                    push(def);
                }
            }
            _ => {}
        }
    }
    for execution in &data.executions {
        for def in execution.captures() {
            push(def);
        }
    }

    defs.into_iter()
        .map(|def| {
            let entity = match def.source {
                CaptureSource::Source => source,
                CaptureSource::Target => target,
            };
            let mode = if def.snapshot {
                CaptureMode::Snapshot(read_attribute(world, entity, &def.attribute))
            } else {
                CaptureMode::Live
            };
            CaptureSlot { def, entity, mode }
        })
        .collect()
}

/// Evaluation view for an instant application; captures resolve live
/// since the effect evaluates exactly once, right now.
fn instant_view(world: &World, effect: &Effect, target: Entity) -> EffectEvalView {
    EffectEvalView {
        data: effect.data.clone(),
        target,
        source: effect.source,
        level: effect.level(),
        stack_count: 1,
        set_by_caller: effect.set_by_caller_map().clone(),
        captures: build_captures(world, &effect.data, effect.source, target),
    }
}

/// Finds the stack an incoming application merges into, per the stack
/// and level policies.
fn find_existing_stack(
    world: &World,
    target: Entity,
    effect: &Effect,
    stacking: &StackingData,
) -> Option<u64> {
    let manager = world.get::<EffectsManager>(target)?;
    manager
        .effects
        .iter()
        .find(|record| {
            Arc::ptr_eq(&record.data, &effect.data)
                && (stacking.stack_policy == StackPolicy::AggregateByTarget
                    || record.source == effect.source)
                && (stacking.stack_level_policy == StackLevelPolicy::AggregateLevels
                    || record.level == effect.level())
        })
        .map(|record| record.id)
}

/// Instantiates a fresh active effect: captures resolved, cycles
/// rejected, subscriptions registered, modifiers committed, cues
/// raised.
fn create_active_effect(
    world: &mut World,
    tx: &mut Transaction,
    target: Entity,
    effect: &Effect,
) -> Result<ActiveEffectHandle, EffectError> {
    let data = effect.data.clone();
    let level = effect.level();
    let captures = build_captures(world, &data, effect.source, target);

    // An effect must not watch an attribute it writes itself; the
    // feedback would never settle.
    for slot in &captures {
        if matches!(slot.mode, CaptureMode::Live)
            && slot.entity == target
            && data
                .modifiers
                .iter()
                .any(|modifier| modifier.attribute == slot.def.attribute)
        {
            return Err(EffectError::DependencyCycle {
                effect: data.name.clone(),
                attribute: slot.def.attribute.clone(),
            });
        }
    }

    let tags = entity_combined_tags(world, target);
    let inhibited = !ongoing_met(&data, &tags);
    let stack_count = data.stacking.as_ref().map_or(1, |stacking| {
        let limit = stacking.stack_limit.evaluate(level).max(1);
        stacking.initial_stack.evaluate(level).clamp(1, limit)
    });

    let id = {
        let Some(mut manager) = world.get_mut::<EffectsManager>(target) else {
            return Err(EffectError::MissingEffectsManager);
        };
        let id = manager.allocate_id();
        manager.effects.push(ActiveEffect {
            id,
            data: data.clone(),
            source: effect.source,
            level,
            set_by_caller: effect.set_by_caller_map().clone(),
            remaining_duration: effect_duration(&data, level),
            period: effect_period(&data, level),
            period_accumulator: 0.0,
            stack_count,
            inhibited,
            committed: Vec::new(),
            captures: captures.clone(),
            granted_tags: TagContainer::new(),
        });
        id
    };
    let handle = ActiveEffectHandle::new(target, id);

    {
        let mut index = world.resource_mut::<DependencyIndex>();
        for slot in &captures {
            if matches!(slot.mode, CaptureMode::Live) {
                index.register(slot.entity, &slot.def.attribute, target, id);
            }
        }
    }

    if !inhibited {
        let (value_changes, any_found, custom_parameters) = if data.periodic.is_none() {
            commit_modifiers(world, tx, target, id)
        } else {
            (HashMap::new(), true, HashMap::new())
        };

        tx.enqueue_cue(PendingCue {
            data: data.clone(),
            target,
            source: effect.source,
            level,
            stack_count,
            kind: CueEventKind::Apply,
            effect_id: Some(id),
            scope: CueUpdateScope::default(),
            value_changes,
            custom_parameters,
            any_modifier_success: any_found,
        });

        if let Some(periodic) = &data.periodic
            && periodic.execute_on_application
        {
            execute_periodic(world, tx, target, id);
        }

        let granted = collect_modifier_tags(&data);
        if !granted.is_empty() {
            if let Some(mut entity_tags) = world.get_mut::<EntityTags>(target) {
                entity_tags.grant(&granted);
            }
            with_record(world, target, id, |record| record.granted_tags = granted);
        }
    }

    refresh_inhibition_states(world, tx, target);

    tx.events.push(EngineEvent::Applied {
        target,
        effect: data.name.clone(),
        handle: Some(handle),
    });
    Ok(handle)
}

/// Merges an application into an existing stack, per the stacking
/// decision procedure.
fn merge_into_stack(
    world: &mut World,
    tx: &mut Transaction,
    target: Entity,
    id: u64,
    effect: &Effect,
) -> Result<Option<ActiveEffectHandle>, EffectError> {
    let Some((data, current_level, stack_count)) = world
        .get::<EffectsManager>(target)
        .and_then(|manager| manager.get(id))
        .map(|record| (record.data.clone(), record.level, record.stack_count))
    else {
        return Ok(None);
    };
    let Some(stacking) = data.stacking.clone() else {
        return Ok(None);
    };

    let limit = stacking.stack_limit.evaluate(current_level).max(1);
    let at_limit = stack_count >= limit;
    if at_limit && stacking.overflow_policy == StackOverflowPolicy::DenyApplication {
        return Ok(None);
    }

    let incoming = effect.level();
    if incoming != current_level {
        if stacking.level_denial_policy.matches(incoming, current_level) {
            return Ok(None);
        }
        if stacking.level_override_policy.matches(incoming, current_level) {
            let new_limit = stacking.stack_limit.evaluate(incoming).max(1);
            with_record(world, target, id, |record| {
                record.level = incoming;
                match stacking.level_override_stack_count_policy {
                    LevelOverrideStackCountPolicy::ResetStacks => {
                        record.stack_count =
                            stacking.initial_stack.evaluate(incoming).clamp(1, new_limit);
                    }
                    LevelOverrideStackCountPolicy::IncreaseStacks => {
                        if record.stack_count < new_limit {
                            record.stack_count += 1;
                        }
                    }
                }
            });
        } else if !at_limit {
            with_record(world, target, id, |record| record.stack_count += 1);
        }
    } else if !at_limit {
        with_record(world, target, id, |record| record.stack_count += 1);
    }

    if stacking.application_refresh_policy == ApplicationRefreshPolicy::RefreshOnSuccessfulApplication
    {
        let refreshed_level =
            with_record(world, target, id, |record| record.level).unwrap_or(current_level);
        let duration = effect_duration(&data, refreshed_level);
        with_record(world, target, id, |record| {
            record.remaining_duration = duration;
        });
    }

    if data.periodic.is_some() {
        // Periodic magnitudes pick the new count up at execution time;
        // only the stack-derived cues need a dispatch now.
        if let Some(view) = record_view(world, target, id) {
            tx.enqueue_cue(PendingCue {
                data: view.data.clone(),
                target,
                source: view.source,
                level: view.level,
                stack_count: view.stack_count,
                kind: CueEventKind::Update,
                effect_id: Some(id),
                scope: CueUpdateScope::stacking(),
                value_changes: HashMap::new(),
                custom_parameters: HashMap::new(),
                any_modifier_success: true,
            });
        }
    } else {
        re_evaluate_effect(world, tx, target, id, CueUpdateScope::stacking());
    }

    if !data.suppress_stacking_cues
        && let Some(view) = record_view(world, target, id)
    {
        tx.enqueue_cue(PendingCue {
            data: view.data.clone(),
            target,
            source: view.source,
            level: view.level,
            stack_count: view.stack_count,
            kind: CueEventKind::Apply,
            effect_id: Some(id),
            scope: CueUpdateScope::default(),
            value_changes: HashMap::new(),
            custom_parameters: HashMap::new(),
            any_modifier_success: true,
        });
    }

    let handle = ActiveEffectHandle::new(target, id);
    tx.events.push(EngineEvent::Applied {
        target,
        effect: data.name.clone(),
        handle: Some(handle),
    });
    Ok(Some(handle))
}
