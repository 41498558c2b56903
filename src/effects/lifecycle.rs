//! Active-effect lifecycle internals.
//!
//! Magnitude evaluation against live world state, modifier commit and
//! removal, periodic execution, inhibition transitions, duration expiry,
//! and level changes. Everything here operates inside a
//! [`Transaction`](super::dependencies::Transaction) opened by the
//! public API in `application.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;

use crate::attributes::set::AttributeWrite;
use crate::cues::CueEventKind;
use crate::effect_components::EffectComponent;
use crate::magnitudes::{
    CalculatorContext, CustomCalculator as _, CustomExecution as _, ExecutionTarget, MagnitudeSpec,
};
use crate::magnitudes::magnitude::apply_envelope;
use crate::tags::{GameplayTag, TagContainer};

use super::components::{ActiveEffect, AppliedModifier, CaptureMode, CaptureSlot, EffectsManager, EntityTags};
use super::definition::{DurationData, EffectData, InhibitionRemovedPolicy};
use super::dependencies::{
    CueUpdateScope, DependencyIndex, EngineEvent, PendingCue, Transaction, read_attribute,
};
use super::stacking::{StackExpirationPolicy, StackMagnitudePolicy};

/// Bound on inhibition re-check passes within one operation. Tag
/// grants between effects settle quickly; hitting the bound means the
/// ongoing requirements oscillate.
const MAX_INHIBITION_PASSES: usize = 8;

/// Cloneable snapshot of everything magnitude evaluation needs.
#[derive(Clone)]
pub(crate) struct EffectEvalView {
    pub(crate) data: Arc<EffectData>,
    pub(crate) target: Entity,
    pub(crate) source: Entity,
    pub(crate) level: i32,
    pub(crate) stack_count: i32,
    pub(crate) set_by_caller: HashMap<GameplayTag, f32>,
    pub(crate) captures: Vec<CaptureSlot>,
}

impl ActiveEffect {
    pub(crate) fn eval_view(&self, target: Entity) -> EffectEvalView {
        EffectEvalView {
            data: self.data.clone(),
            target,
            source: self.source,
            level: self.level,
            stack_count: self.stack_count,
            set_by_caller: self.set_by_caller.clone(),
            captures: self.captures.clone(),
        }
    }
}

/// One evaluated modifier ready to apply.
pub(crate) struct EvaluatedModifier {
    pub(crate) attribute: String,
    pub(crate) delta: i32,
    pub(crate) found: bool,
}

/// Result of evaluating every modifier of an effect.
pub(crate) struct EvaluatedSet {
    pub(crate) entries: Vec<EvaluatedModifier>,
    pub(crate) custom_parameters: HashMap<String, f32>,
    pub(crate) any_found: bool,
}

/// Runs a closure against one active effect record, if it still exists.
pub(crate) fn with_record<R>(
    world: &mut World,
    target: Entity,
    id: u64,
    f: impl FnOnce(&mut ActiveEffect) -> R,
) -> Option<R> {
    let mut manager = world.get_mut::<EffectsManager>(target)?;
    manager.get_mut(id).map(f)
}

/// Snapshots a record for evaluation.
pub(crate) fn record_view(world: &World, target: Entity, id: u64) -> Option<EffectEvalView> {
    world
        .get::<EffectsManager>(target)?
        .get(id)
        .map(|record| record.eval_view(target))
}

/// The scaled duration of an effect at a level; 0.0 unless bounded.
pub(crate) fn effect_duration(data: &EffectData, level: i32) -> f32 {
    match &data.duration {
        DurationData::HasDuration(duration) => duration.evaluate(level),
        _ => 0.0,
    }
}

/// The scaled period of an effect at a level; 0.0 unless periodic.
pub(crate) fn effect_period(data: &EffectData, level: i32) -> f32 {
    data.periodic
        .as_ref()
        .map_or(0.0, |periodic| periodic.period.evaluate(level))
}

/// Reads the attribute a capture slot points at, honoring snapshots.
fn capture_attribute(
    world: &World,
    slot: &CaptureSlot,
) -> Option<crate::attributes::GameplayAttribute> {
    match &slot.mode {
        CaptureMode::Snapshot(frozen) => *frozen,
        CaptureMode::Live => read_attribute(world, slot.entity, &slot.def.attribute),
    }
}

/// Current-value floats of every capture, for calculator contexts.
fn resolve_context_captures(
    world: &World,
    view: &EffectEvalView,
) -> Vec<(crate::magnitudes::AttributeCaptureDefinition, f32)> {
    view.captures
        .iter()
        .map(|slot| {
            let value = capture_attribute(world, slot)
                .map_or(0.0, |attribute| attribute.current_value() as f32);
            (slot.def.clone(), value)
        })
        .collect()
}

/// Evaluates one magnitude spec against the view.
fn evaluate_magnitude(
    world: &World,
    view: &EffectEvalView,
    spec: &MagnitudeSpec,
    custom_parameters: &mut HashMap<String, f32>,
) -> f32 {
    match spec {
        MagnitudeSpec::Scalable(value) => value.evaluate(view.level),
        MagnitudeSpec::AttributeBased {
            capture,
            channel,
            coefficient,
            pre_multiply_additive,
            post_multiply_additive,
            level_curve,
        } => {
            let raw = view
                .captures
                .iter()
                .find(|slot| {
                    slot.def.attribute == capture.attribute && slot.def.source == capture.source
                })
                .and_then(|slot| capture_attribute(world, slot))
                .map_or(0.0, |attribute| attribute.channel_value(*channel) as f32);
            apply_envelope(
                raw,
                coefficient,
                pre_multiply_additive,
                post_multiply_additive,
                level_curve.as_ref(),
                view.level,
            )
        }
        MagnitudeSpec::SetByCaller(tag) => match view.set_by_caller.get(tag) {
            Some(value) => *value,
            None => {
                warn!(
                    "effect `{}` has no set-by-caller binding for `{}`",
                    view.data.name, tag
                );
                0.0
            }
        },
        MagnitudeSpec::Custom {
            calculator,
            coefficient,
            pre_multiply_additive,
            post_multiply_additive,
            level_curve,
        } => {
            let captured = resolve_context_captures(world, view);
            let mut ctx = CalculatorContext::new(
                view.level,
                view.stack_count,
                &captured,
                &view.set_by_caller,
                custom_parameters,
            );
            let raw = calculator.calculate(&mut ctx);
            apply_envelope(
                raw,
                coefficient,
                pre_multiply_additive,
                post_multiply_additive,
                level_curve.as_ref(),
                view.level,
            )
        }
    }
}

/// Evaluates every modifier of the view, applying the stack-count
/// multiplier when the magnitude policy is Sum.
pub(crate) fn evaluate_modifiers(world: &World, view: &EffectEvalView) -> EvaluatedSet {
    let stack_factor = match view.data.stacking.as_ref().map(|s| s.magnitude_policy) {
        Some(StackMagnitudePolicy::Sum) => view.stack_count.max(1),
        _ => 1,
    };
    let mut custom_parameters = HashMap::new();
    let mut entries = Vec::with_capacity(view.data.modifiers.len());
    let mut any_found = false;

    for modifier in &view.data.modifiers {
        let magnitude = evaluate_magnitude(world, view, &modifier.magnitude, &mut custom_parameters);
        let found = read_attribute(world, view.target, &modifier.attribute).is_some();
        any_found |= found;
        entries.push(EvaluatedModifier {
            attribute: modifier.attribute.clone(),
            delta: (magnitude * stack_factor as f32) as i32,
            found,
        });
    }

    EvaluatedSet {
        entries,
        custom_parameters,
        any_found,
    }
}

/// Applies the view's modifiers and executions with instant semantics:
/// base-value writes on the named entities. Returns the per-attribute
/// net deltas, whether any attribute was found, and calculator
/// parameters.
pub(crate) fn execute_once(
    world: &mut World,
    tx: &mut Transaction,
    view: &EffectEvalView,
) -> (HashMap<String, f32>, bool, HashMap<String, f32>) {
    let evaluated = evaluate_modifiers(world, view);
    let mut value_changes: HashMap<String, f32> = HashMap::new();
    let mut any_found = evaluated.any_found;
    let mut custom_parameters = evaluated.custom_parameters;

    for entry in &evaluated.entries {
        let direct = tx.write_attribute(
            world,
            view.target,
            &entry.attribute,
            AttributeWrite::AddBaseValue(entry.delta),
        );
        *value_changes.entry(entry.attribute.clone()).or_insert(0.0) += direct as f32;
    }

    for execution in view.data.executions.clone() {
        let captured = resolve_context_captures(world, view);
        let outputs = {
            let mut ctx = CalculatorContext::new(
                view.level,
                view.stack_count,
                &captured,
                &view.set_by_caller,
                &mut custom_parameters,
            );
            execution.execute(&mut ctx)
        };
        for output in outputs {
            let entity = match output.target {
                ExecutionTarget::Source => view.source,
                ExecutionTarget::Target => view.target,
            };
            any_found |= read_attribute(world, entity, &output.attribute).is_some();
            let direct = tx.write_attribute(
                world,
                entity,
                &output.attribute,
                AttributeWrite::AddBaseValue(output.magnitude as i32),
            );
            *value_changes.entry(output.attribute.clone()).or_insert(0.0) += direct as f32;
        }
    }

    (value_changes, any_found, custom_parameters)
}

/// Evaluates and writes the view's modifier-channel contributions,
/// remembering the applied deltas on the record.
pub(crate) fn commit_modifiers(
    world: &mut World,
    tx: &mut Transaction,
    target: Entity,
    id: u64,
) -> (HashMap<String, f32>, bool, HashMap<String, f32>) {
    let Some(view) = record_view(world, target, id) else {
        return (HashMap::new(), false, HashMap::new());
    };
    let evaluated = evaluate_modifiers(world, &view);
    let mut value_changes: HashMap<String, f32> = HashMap::new();
    let mut committed = Vec::with_capacity(evaluated.entries.len());

    for entry in &evaluated.entries {
        let direct = tx.write_attribute(
            world,
            target,
            &entry.attribute,
            AttributeWrite::AddFlatModifier(entry.delta),
        );
        *value_changes.entry(entry.attribute.clone()).or_insert(0.0) += direct as f32;
        committed.push(AppliedModifier {
            attribute: entry.attribute.clone(),
            delta: entry.delta,
        });
    }

    with_record(world, target, id, |record| record.committed = committed);
    (value_changes, evaluated.any_found, evaluated.custom_parameters)
}

/// Reverses the record's committed contributions exactly.
pub(crate) fn uncommit_modifiers(
    world: &mut World,
    tx: &mut Transaction,
    target: Entity,
    id: u64,
) -> HashMap<String, f32> {
    let committed =
        with_record(world, target, id, |record| std::mem::take(&mut record.committed))
            .unwrap_or_default();
    let mut value_changes: HashMap<String, f32> = HashMap::new();
    for applied in committed {
        let direct = tx.write_attribute(
            world,
            target,
            &applied.attribute,
            AttributeWrite::AddFlatModifier(-applied.delta),
        );
        *value_changes.entry(applied.attribute).or_insert(0.0) += direct as f32;
    }
    value_changes
}

/// Re-evaluates a non-snapshot-dependent effect and applies the
/// magnitude differences as one net write per attribute.
pub(crate) fn re_evaluate_effect(
    world: &mut World,
    tx: &mut Transaction,
    target: Entity,
    id: u64,
    mut scope: CueUpdateScope,
) {
    let Some(view) = record_view(world, target, id) else {
        return;
    };
    let inhibited = with_record(world, target, id, |record| record.inhibited).unwrap_or(true);
    // Periodic effects evaluate at execution time; there is no
    // committed channel to refresh.
    if inhibited || view.data.periodic.is_some() {
        return;
    }

    let evaluated = evaluate_modifiers(world, &view);
    let old = with_record(world, target, id, |record| record.committed.clone()).unwrap_or_default();

    let mut value_changes: HashMap<String, f32> = HashMap::new();
    let mut committed = Vec::with_capacity(evaluated.entries.len());
    let mut any_diff = false;

    for (index, entry) in evaluated.entries.iter().enumerate() {
        let old_delta = old.get(index).map_or(0, |applied| applied.delta);
        if entry.delta != old_delta {
            any_diff = true;
            let direct = tx.write_attribute(
                world,
                target,
                &entry.attribute,
                AttributeWrite::AddFlatModifier(entry.delta - old_delta),
            );
            *value_changes.entry(entry.attribute.clone()).or_insert(0.0) += direct as f32;
            scope.attributes.insert(entry.attribute.clone());
        }
        committed.push(AppliedModifier {
            attribute: entry.attribute.clone(),
            delta: entry.delta,
        });
    }

    if any_diff {
        with_record(world, target, id, |record| record.committed = committed);
    }
    if any_diff || scope.stacking || scope.level_and_magnitude {
        tx.enqueue_cue(PendingCue {
            data: view.data.clone(),
            target,
            source: view.source,
            level: view.level,
            stack_count: view.stack_count,
            kind: CueEventKind::Update,
            effect_id: Some(id),
            scope,
            value_changes,
            custom_parameters: evaluated.custom_parameters,
            any_modifier_success: evaluated.any_found,
        });
    }
}

/// Performs one periodic execution of an active effect.
pub(crate) fn execute_periodic(world: &mut World, tx: &mut Transaction, target: Entity, id: u64) {
    let Some(view) = record_view(world, target, id) else {
        return;
    };
    let (value_changes, any_found, custom_parameters) = execute_once(world, tx, &view);
    tx.enqueue_cue(PendingCue {
        data: view.data.clone(),
        target,
        source: view.source,
        level: view.level,
        stack_count: view.stack_count,
        kind: CueEventKind::Execute,
        effect_id: Some(id),
        scope: CueUpdateScope::default(),
        value_changes,
        custom_parameters,
        any_modifier_success: any_found,
    });
    tx.events.push(EngineEvent::PeriodicExecuted {
        target,
        effect: view.data.name.clone(),
    });
}

/// Collects the tags an effect's components grant while active.
pub(crate) fn collect_modifier_tags(data: &EffectData) -> TagContainer {
    let mut tags = TagContainer::new();
    for component in &data.components {
        if let Some(granted) = component.modifier_tags() {
            tags.append_tags(granted);
        }
    }
    tags
}

/// The combined (owned plus granted) tag state of an entity.
pub(crate) fn entity_combined_tags(world: &World, entity: Entity) -> TagContainer {
    world
        .get::<EntityTags>(entity)
        .map(|tags| tags.combined())
        .unwrap_or_default()
}

pub(crate) fn ongoing_met(data: &EffectData, tags: &TagContainer) -> bool {
    data.components.iter().all(|component| {
        component
            .ongoing_requirements()
            .is_none_or(|requirements| requirements.met_by(tags))
    })
}

fn removal_met(data: &EffectData, tags: &TagContainer) -> bool {
    data.components.iter().any(|component| {
        component
            .removal_requirements()
            .is_some_and(|requirements| !requirements.is_empty() && requirements.met_by(tags))
    })
}

/// Suppresses contributions of an effect whose ongoing requirements
/// stopped holding; the record stays alive for re-admission.
pub(crate) fn inhibit_effect(world: &mut World, tx: &mut Transaction, target: Entity, id: u64) {
    let Some(view) = record_view(world, target, id) else {
        return;
    };
    let value_changes = uncommit_modifiers(world, tx, target, id);

    let granted =
        with_record(world, target, id, |record| std::mem::take(&mut record.granted_tags))
            .unwrap_or_default();
    if !granted.is_empty()
        && let Some(mut tags) = world.get_mut::<EntityTags>(target)
    {
        tags.revoke(&granted);
    }

    with_record(world, target, id, |record| record.inhibited = true);
    tx.enqueue_cue(PendingCue {
        data: view.data.clone(),
        target,
        source: view.source,
        level: view.level,
        stack_count: view.stack_count,
        kind: CueEventKind::Remove,
        effect_id: Some(id),
        scope: CueUpdateScope::default(),
        value_changes,
        custom_parameters: HashMap::new(),
        any_modifier_success: true,
    });
}

/// Re-admits an inhibited effect: contributions are re-applied, tags
/// re-granted, and the periodic accumulator handled per policy.
pub(crate) fn uninhibit_effect(world: &mut World, tx: &mut Transaction, target: Entity, id: u64) {
    let Some(view) = record_view(world, target, id) else {
        return;
    };
    with_record(world, target, id, |record| record.inhibited = false);

    let granted = collect_modifier_tags(&view.data);
    if !granted.is_empty() {
        if let Some(mut tags) = world.get_mut::<EntityTags>(target) {
            tags.grant(&granted);
        }
        with_record(world, target, id, |record| record.granted_tags = granted);
    }

    let mut value_changes = HashMap::new();
    let mut any_found = true;
    let mut custom_parameters = HashMap::new();

    if let Some(periodic) = &view.data.periodic {
        match periodic.inhibition_removed_policy {
            InhibitionRemovedPolicy::NeverReset => {}
            InhibitionRemovedPolicy::ResetPeriod => {
                with_record(world, target, id, |record| record.period_accumulator = 0.0);
            }
            InhibitionRemovedPolicy::ExecuteAndResetPeriod => {
                with_record(world, target, id, |record| record.period_accumulator = 0.0);
                execute_periodic(world, tx, target, id);
            }
        }
    } else {
        let (changes, found, parameters) = commit_modifiers(world, tx, target, id);
        value_changes = changes;
        any_found = found;
        custom_parameters = parameters;
    }

    tx.enqueue_cue(PendingCue {
        data: view.data.clone(),
        target,
        source: view.source,
        level: view.level,
        stack_count: view.stack_count,
        kind: CueEventKind::Apply,
        effect_id: Some(id),
        scope: CueUpdateScope::default(),
        value_changes,
        custom_parameters,
        any_modifier_success: any_found,
    });
}

/// Re-checks ongoing and removal requirements of every active effect
/// on the target until the tag state settles.
pub(crate) fn refresh_inhibition_states(world: &mut World, tx: &mut Transaction, target: Entity) {
    for pass in 0.. {
        if pass >= MAX_INHIBITION_PASSES {
            warn!("ongoing tag requirements did not settle, stopping");
            break;
        }
        let combined = entity_combined_tags(world, target);
        let ids = match world.get::<EffectsManager>(target) {
            Some(manager) => manager.ids(),
            None => return,
        };
        let mut changed = false;
        for id in ids {
            let Some((data, inhibited)) = world
                .get::<EffectsManager>(target)
                .and_then(|manager| manager.get(id))
                .map(|record| (record.data.clone(), record.inhibited))
            else {
                continue;
            };
            if removal_met(&data, &combined) {
                remove_effect(world, tx, target, id, false);
                changed = true;
                continue;
            }
            let met = ongoing_met(&data, &combined);
            if met && inhibited {
                uninhibit_effect(world, tx, target, id);
                changed = true;
            } else if !met && !inhibited {
                inhibit_effect(world, tx, target, id);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Removes an active effect: contributions reversed, subscriptions
/// dropped, granted tags revoked, remove cues raised.
pub(crate) fn remove_effect(
    world: &mut World,
    tx: &mut Transaction,
    target: Entity,
    id: u64,
    expired: bool,
) {
    let Some(record) = world
        .get_mut::<EffectsManager>(target)
        .and_then(|mut manager| manager.take(id))
    else {
        return;
    };

    let mut value_changes: HashMap<String, f32> = HashMap::new();
    for applied in &record.committed {
        let direct = tx.write_attribute(
            world,
            target,
            &applied.attribute,
            AttributeWrite::AddFlatModifier(-applied.delta),
        );
        *value_changes.entry(applied.attribute.clone()).or_insert(0.0) += direct as f32;
    }

    if !record.granted_tags.is_empty()
        && let Some(mut tags) = world.get_mut::<EntityTags>(target)
    {
        tags.revoke(&record.granted_tags);
    }

    if let Some(mut index) = world.get_resource_mut::<DependencyIndex>() {
        index.unregister_effect(target, id);
    }

    tx.enqueue_cue(PendingCue {
        data: record.data.clone(),
        target,
        source: record.source,
        level: record.level,
        stack_count: record.stack_count,
        kind: CueEventKind::Remove,
        effect_id: Some(id),
        scope: CueUpdateScope::default(),
        value_changes,
        custom_parameters: HashMap::new(),
        any_modifier_success: true,
    });
    tx.events.push(EngineEvent::Removed {
        target,
        effect: record.data.name.clone(),
        expired,
    });
}

/// Handles a bounded-duration effect reaching zero remaining time.
fn handle_expiration(world: &mut World, tx: &mut Transaction, target: Entity, id: u64) {
    let Some((data, level, stack_count)) = world
        .get::<EffectsManager>(target)
        .and_then(|manager| manager.get(id))
        .map(|record| (record.data.clone(), record.level, record.stack_count))
    else {
        return;
    };

    let policy = data.stacking.as_ref().map(|stacking| stacking.expiration_policy);
    match policy {
        None | Some(StackExpirationPolicy::ClearEntireStack) => {
            remove_effect(world, tx, target, id, true);
        }
        Some(StackExpirationPolicy::RemoveSingleStackAndRefreshDuration) => {
            if stack_count <= 1 {
                remove_effect(world, tx, target, id, true);
                return;
            }
            let duration = effect_duration(&data, level);
            with_record(world, target, id, |record| {
                record.stack_count -= 1;
                record.remaining_duration = duration;
            });
            re_evaluate_effect(world, tx, target, id, CueUpdateScope::stacking());
        }
        Some(StackExpirationPolicy::RefreshDuration) => {
            let duration = effect_duration(&data, level);
            with_record(world, target, id, |record| {
                record.remaining_duration = duration;
            });
        }
    }
}

/// Advances every active effect on one entity by `delta_secs`.
pub(crate) fn update_entity_effects(
    world: &mut World,
    tx: &mut Transaction,
    target: Entity,
    delta_secs: f32,
) {
    // Pick up external tag-state changes before advancing time.
    refresh_inhibition_states(world, tx, target);

    let ids = match world.get::<EffectsManager>(target) {
        Some(manager) => manager.ids(),
        None => return,
    };

    for id in ids {
        let Some((has_duration, remaining_before, periodic, inhibited, period)) =
            world
                .get::<EffectsManager>(target)
                .and_then(|manager| manager.get(id))
                .map(|record| {
                    (
                        record.has_duration(),
                        record.remaining_duration,
                        record.is_periodic(),
                        record.inhibited,
                        record.period,
                    )
                })
        else {
            continue;
        };

        // Periods fire before expiry removal, and never past the end of
        // a bounded duration.
        if periodic && !inhibited && period > 0.0 {
            let periodic_delta = if has_duration {
                delta_secs.min(remaining_before.max(0.0))
            } else {
                delta_secs
            };
            with_record(world, target, id, |record| {
                record.period_accumulator += periodic_delta;
            });
            loop {
                let fired = with_record(world, target, id, |record| {
                    if record.period_accumulator >= record.period {
                        record.period_accumulator -= record.period;
                        true
                    } else {
                        false
                    }
                })
                .unwrap_or(false);
                if !fired {
                    break;
                }
                execute_periodic(world, tx, target, id);
            }
        }

        if has_duration {
            let remaining = with_record(world, target, id, |record| {
                record.remaining_duration -= delta_secs;
                record.remaining_duration
            });
            if let Some(remaining) = remaining
                && remaining <= 0.0
            {
                handle_expiration(world, tx, target, id);
            }
        }
    }

    // Expiry may have revoked granted tags.
    refresh_inhibition_states(world, tx, target);
}

/// Changes the level of an active effect and re-evaluates what depends
/// on it. No-op when the effect snapshotted its level.
pub(crate) fn set_effect_level(
    world: &mut World,
    tx: &mut Transaction,
    target: Entity,
    id: u64,
    level: i32,
) {
    let Some(snapshot_level) =
        with_record(world, target, id, |record| record.data.snapshot_level)
    else {
        return;
    };
    if snapshot_level {
        return;
    }
    with_record(world, target, id, |record| record.level = level);

    let is_periodic =
        with_record(world, target, id, |record| record.is_periodic()).unwrap_or(false);
    if is_periodic {
        // Periodic magnitudes re-read the level at execution time; only
        // the cues need to hear about the change now.
        let Some(view) = record_view(world, target, id) else {
            return;
        };
        tx.enqueue_cue(PendingCue {
            data: view.data.clone(),
            target,
            source: view.source,
            level: view.level,
            stack_count: view.stack_count,
            kind: CueEventKind::Update,
            effect_id: Some(id),
            scope: CueUpdateScope::level_and_magnitude(),
            value_changes: HashMap::new(),
            custom_parameters: HashMap::new(),
            any_modifier_success: true,
        });
    } else {
        re_evaluate_effect(world, tx, target, id, CueUpdateScope::level_and_magnitude());
    }
}
