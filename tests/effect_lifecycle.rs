//! Lifecycle scenarios: instant application, clamping, periodic
//! scheduling, inhibition, level changes, and custom extension points.

mod common;

use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use bevy_effect_runtime::prelude::*;
// Explicit so the piecewise-linear curve wins over bevy's `Curve` trait.
use bevy_effect_runtime::magnitudes::Curve;

use common::{base, current, modifier, tag, tags, world_with};

#[test]
fn instant_add_scales_with_level() {
    let (mut world, source, target) =
        world_with(AttributeSet::new().with_attribute("a1", 0, 0, 100));

    let data = EffectData::builder("instant_add")
        .add_modifier(Modifier::flat(
            "a1",
            MagnitudeSpec::scalar_with_curve(3.0, Curve::new(vec![(1.0, 1.0), (2.0, 2.0)])),
        ))
        .build()
        .unwrap();
    let mut effect = Effect::new(data, source);

    assert!(world.apply_effect(target, &effect).unwrap().is_none());
    assert_eq!(base(&world, target, "a1"), 3);
    assert_eq!(current(&world, target, "a1"), 3);
    assert_eq!(modifier(&world, target, "a1"), 0);

    effect.level_up();
    world.apply_effect(target, &effect).unwrap();
    assert_eq!(base(&world, target, "a1"), 9);
}

#[test]
fn infinite_effect_clamps_and_overflows() {
    let (mut world, source, target) = world_with(AttributeSet::new().with_attribute("a1", 1, 0, 10));

    let data = EffectData::builder("big_buff")
        .infinite()
        .add_modifier(Modifier::flat("a1", MagnitudeSpec::scalar(99.0)))
        .build()
        .unwrap();

    let handle = world
        .apply_effect(target, &Effect::new(data, source))
        .unwrap()
        .unwrap();

    let set = world.get::<AttributeSet>(target).unwrap();
    let a1 = set.get("a1").unwrap();
    assert_eq!(a1.current_value(), 10);
    assert_eq!(a1.modifier(), 99);
    assert_eq!(a1.valid_modifier(), 9);
    assert_eq!(a1.overflow(), 90);

    // Raising the bound restores the overflowed contribution.
    world.set_attribute_max(target, "a1", 100);
    assert_eq!(current(&world, target, "a1"), 100);

    assert!(world.unapply_effect(handle).unwrap());
    assert_eq!(current(&world, target, "a1"), 1);
    assert_eq!(modifier(&world, target, "a1"), 0);
}

#[test]
fn periodic_effect_over_bounded_duration() {
    let (mut world, source, target) =
        world_with(AttributeSet::new().with_attribute("a1", 0, 0, 100));

    let executed = Arc::new(Mutex::new(0usize));
    let removed = Arc::new(Mutex::new(0usize));
    {
        let executed = executed.clone();
        world.add_observer(move |_: On<PeriodicEffectExecutedEvent>| {
            *executed.lock().unwrap() += 1;
        });
        let removed = removed.clone();
        world.add_observer(move |_: On<GameplayEffectRemovedEvent>| {
            *removed.lock().unwrap() += 1;
        });
    }

    let data = EffectData::builder("dot")
        .with_duration(ScalableFloat::new(10.0))
        .with_periodic(
            PeriodicData::new(ScalableFloat::new(1.0)).with_execute_on_application(true),
        )
        .add_modifier(Modifier::flat("a1", MagnitudeSpec::scalar(1.0)))
        .build()
        .unwrap();

    let handle = world
        .apply_effect(target, &Effect::new(data.clone(), source))
        .unwrap()
        .unwrap();
    assert_eq!(base(&world, target, "a1"), 1);
    assert_eq!(modifier(&world, target, "a1"), 0);

    world.update_effects(target, 5.0);
    assert_eq!(base(&world, target, "a1"), 6);

    // The period landing exactly on expiry fires before removal.
    world.update_effects(target, 5.0);
    assert_eq!(base(&world, target, "a1"), 11);

    assert_eq!(*executed.lock().unwrap(), 11);
    assert_eq!(*removed.lock().unwrap(), 1);
    assert!(!handle.is_valid(&world));
    assert!(world.effect_stack_info(target, &data).is_empty());
}

#[test]
fn duration_expiry_without_period() {
    let (mut world, source, target) =
        world_with(AttributeSet::new().with_attribute("speed", 10, 0, 100));

    let data = EffectData::builder("sprint")
        .with_duration(ScalableFloat::new(3.0))
        .add_modifier(Modifier::flat("speed", MagnitudeSpec::scalar(5.0)))
        .build()
        .unwrap();

    let handle = world
        .apply_effect(target, &Effect::new(data, source))
        .unwrap()
        .unwrap();
    assert_eq!(current(&world, target, "speed"), 15);

    world.update_effects(target, 2.0);
    assert_eq!(current(&world, target, "speed"), 15);
    assert!(handle.is_valid(&world));

    world.update_effects(target, 1.0);
    assert_eq!(current(&world, target, "speed"), 10);
    assert!(!handle.is_valid(&world));
}

#[test]
fn ongoing_requirements_gate_contributions() {
    let (mut world, source, target) =
        world_with(AttributeSet::new().with_attribute("armor", 0, 0, 100));

    let data = EffectData::builder("stance")
        .infinite()
        .add_modifier(Modifier::flat("armor", MagnitudeSpec::scalar(20.0)))
        .add_component(Arc::new(TargetTagRequirements::new().with_ongoing(
            TagRequirements::new().require(tag("state.combat")),
        )))
        .build()
        .unwrap();

    // Applied while the requirement fails: registered but inert.
    world
        .apply_effect(target, &Effect::new(data.clone(), source))
        .unwrap()
        .unwrap();
    assert_eq!(current(&world, target, "armor"), 0);
    let info = world.effect_stack_info(target, &data);
    assert_eq!(info.len(), 1);
    assert!(info[0].inhibited);

    world.add_owned_tag(target, tag("state.combat"));
    assert_eq!(current(&world, target, "armor"), 20);
    assert!(!world.effect_stack_info(target, &data)[0].inhibited);

    // Requirements failing again remove the contribution exactly but
    // keep the effect alive for re-admission.
    world.remove_owned_tag(target, &tag("state.combat"));
    assert_eq!(current(&world, target, "armor"), 0);
    assert_eq!(world.effect_stack_info(target, &data).len(), 1);

    world.add_owned_tag(target, tag("state.combat"));
    assert_eq!(current(&world, target, "armor"), 20);
}

#[test]
fn modifier_tags_feed_other_effects_requirements() {
    let (mut world, source, target) =
        world_with(AttributeSet::new().with_attribute("power", 0, 0, 100));

    // Grants "state.empowered" while active.
    let granting = EffectData::builder("empower")
        .infinite()
        .add_component(Arc::new(ModifierTags::new(tags(&["state.empowered"]))))
        .build()
        .unwrap();

    // Requires it to contribute.
    let dependent = EffectData::builder("surge")
        .infinite()
        .add_modifier(Modifier::flat("power", MagnitudeSpec::scalar(30.0)))
        .add_component(Arc::new(TargetTagRequirements::new().with_ongoing(
            TagRequirements::new().require(tag("state.empowered")),
        )))
        .build()
        .unwrap();

    world
        .apply_effect(target, &Effect::new(dependent.clone(), source))
        .unwrap()
        .unwrap();
    assert_eq!(current(&world, target, "power"), 0);

    let granting_handle = world
        .apply_effect(target, &Effect::new(granting, source))
        .unwrap()
        .unwrap();
    assert_eq!(current(&world, target, "power"), 30);

    // Removing the granting effect re-inhibits the dependent one.
    world.unapply_effect(granting_handle).unwrap();
    world.update_effects(target, 0.0);
    assert_eq!(current(&world, target, "power"), 0);
    assert_eq!(world.effect_stack_info(target, &dependent).len(), 1);
}

#[test]
fn removal_requirements_eject_the_effect() {
    let (mut world, source, target) =
        world_with(AttributeSet::new().with_attribute("health", 50, 0, 100));

    let data = EffectData::builder("bless")
        .infinite()
        .add_modifier(Modifier::flat("health", MagnitudeSpec::scalar(10.0)))
        .add_component(Arc::new(TargetTagRequirements::new().with_removal(
            TagRequirements::new().require(tag("state.cursed")),
        )))
        .build()
        .unwrap();

    world
        .apply_effect(target, &Effect::new(data.clone(), source))
        .unwrap()
        .unwrap();
    assert_eq!(current(&world, target, "health"), 60);

    world.add_owned_tag(target, tag("state.cursed"));
    assert_eq!(current(&world, target, "health"), 50);
    assert!(world.effect_stack_info(target, &data).is_empty());

    // Applying straight into a removal state is not gated: the effect
    // applies, then the same call's requirement re-check reaps it.
    let handle = world
        .apply_effect(target, &Effect::new(data.clone(), source))
        .unwrap()
        .unwrap();
    assert!(!handle.is_valid(&world));
    assert_eq!(current(&world, target, "health"), 50);
    assert!(world.effect_stack_info(target, &data).is_empty());
}

#[test]
fn execute_and_reset_period_fires_at_uninhibition() {
    let (mut world, source, target) =
        world_with(AttributeSet::new().with_attribute("a1", 0, 0, 100));

    let data = EffectData::builder("pulse")
        .infinite()
        .with_periodic(
            PeriodicData::new(ScalableFloat::new(2.0)).with_inhibition_removed_policy(
                InhibitionRemovedPolicy::ExecuteAndResetPeriod,
            ),
        )
        .add_modifier(Modifier::flat("a1", MagnitudeSpec::scalar(1.0)))
        .add_component(Arc::new(TargetTagRequirements::new().with_ongoing(
            TagRequirements::new().require(tag("state.on")),
        )))
        .build()
        .unwrap();

    world
        .apply_effect(target, &Effect::new(data, source))
        .unwrap()
        .unwrap();
    assert_eq!(base(&world, target, "a1"), 0);

    world.update_effects(target, 10.0);
    assert_eq!(base(&world, target, "a1"), 0);

    // Un-inhibition executes immediately, even though the inhibited
    // interval dwarfed the period.
    world.add_owned_tag(target, tag("state.on"));
    assert_eq!(base(&world, target, "a1"), 1);

    world.update_effects(target, 2.0);
    assert_eq!(base(&world, target, "a1"), 2);
}

#[test]
fn chance_component_uses_injected_randomness() {
    let (mut world, source, target) =
        world_with(AttributeSet::new().with_attribute("gold", 0, 0, 1000));

    let data = EffectData::builder("lucky_strike")
        .add_modifier(Modifier::flat("gold", MagnitudeSpec::scalar(10.0)))
        .add_component(Arc::new(ChanceToApply::with_random(
            ScalableFloat::new(0.5),
            FixedQueueRandom::new([0.9, 0.1]),
        )))
        .build()
        .unwrap();
    let effect = Effect::new(data, source);

    // 0.9 misses, 0.1 hits.
    world.apply_effect(target, &effect).unwrap();
    assert_eq!(base(&world, target, "gold"), 0);
    world.apply_effect(target, &effect).unwrap();
    assert_eq!(base(&world, target, "gold"), 10);
}

#[test]
fn set_by_caller_binds_magnitudes() {
    let (mut world, source, target) =
        world_with(AttributeSet::new().with_attribute("damage", 0, 0, 1000));

    let data = EffectData::builder("scaled_hit")
        .add_modifier(Modifier::flat(
            "damage",
            MagnitudeSpec::set_by_caller(tag("data.damage")),
        ))
        .build()
        .unwrap();

    let mut effect = Effect::new(data.clone(), source);
    effect.set_magnitude_by_caller(tag("data.damage"), 42.0);
    world.apply_effect(target, &effect).unwrap();
    assert_eq!(base(&world, target, "damage"), 42);

    // A missing binding degrades to zero.
    let unbound = Effect::new(data, source);
    world.apply_effect(target, &unbound).unwrap();
    assert_eq!(base(&world, target, "damage"), 42);
}

struct StrengthScaled;

impl CustomCalculator for StrengthScaled {
    fn captures(&self) -> Vec<AttributeCaptureDefinition> {
        vec![AttributeCaptureDefinition::source("strength", false)]
    }

    fn calculate(&self, ctx: &mut CalculatorContext<'_>) -> f32 {
        ctx.captured_value("strength", CaptureSource::Source) * 2.0
    }
}

#[test]
fn custom_calculator_with_live_source_capture() {
    let mut world = World::new();
    world.insert_resource(CueManager::new());
    let source = world
        .spawn(AttributeSet::new().with_attribute("strength", 6, 0, 100))
        .id();
    let target = world
        .spawn(AttributeSet::new().with_attribute("damage", 0, 0, 1000))
        .id();

    let data = EffectData::builder("might")
        .infinite()
        .add_modifier(Modifier::flat(
            "damage",
            MagnitudeSpec::custom(Arc::new(StrengthScaled)),
        ))
        .build()
        .unwrap();

    world
        .apply_effect(target, &Effect::new(data, source))
        .unwrap()
        .unwrap();
    assert_eq!(modifier(&world, target, "damage"), 12);

    // The capture is live: source strength changes flow through.
    world.add_attribute_base_value(source, "strength", 4);
    assert_eq!(modifier(&world, target, "damage"), 20);
}

struct LifeDrain;

impl CustomExecution for LifeDrain {
    fn captures(&self) -> Vec<AttributeCaptureDefinition> {
        vec![AttributeCaptureDefinition::target("health", false)]
    }

    fn execute(&self, ctx: &mut CalculatorContext<'_>) -> Vec<ModifierEvaluatedData> {
        let drained = (ctx.captured_value("health", CaptureSource::Target) * 0.5).floor();
        vec![
            ModifierEvaluatedData::new(ExecutionTarget::Target, "health", -drained),
            ModifierEvaluatedData::new(ExecutionTarget::Source, "health", drained),
        ]
    }
}

#[test]
fn custom_execution_writes_both_entities() {
    let mut world = World::new();
    world.insert_resource(CueManager::new());
    let source = world
        .spawn(AttributeSet::new().with_attribute("health", 10, 0, 100))
        .id();
    let target = world
        .spawn(AttributeSet::new().with_attribute("health", 40, 0, 100))
        .id();

    let data = EffectData::builder("drain")
        .add_execution(Arc::new(LifeDrain))
        .build()
        .unwrap();

    world
        .apply_effect(target, &Effect::new(data, source))
        .unwrap();
    assert_eq!(base(&world, target, "health"), 20);
    assert_eq!(base(&world, source, "health"), 30);
}

#[test]
fn level_up_re_evaluates_unless_snapshotted() {
    let (mut world, source, target) =
        world_with(AttributeSet::new().with_attribute("power", 0, 0, 100));

    let curve = Curve::new(vec![(1.0, 1.0), (2.0, 2.0)]);
    let live = EffectData::builder("growing")
        .infinite()
        .add_modifier(Modifier::flat(
            "power",
            MagnitudeSpec::scalar_with_curve(3.0, curve.clone()),
        ))
        .build()
        .unwrap();
    let frozen = EffectData::builder("frozen")
        .infinite()
        .snapshot_level(true)
        .add_modifier(Modifier::flat(
            "power",
            MagnitudeSpec::scalar_with_curve(5.0, curve),
        ))
        .build()
        .unwrap();

    let mut live_effect = Effect::new(live.clone(), source);
    let mut frozen_effect = Effect::new(frozen.clone(), source);
    world.apply_effect(target, &live_effect).unwrap().unwrap();
    world.apply_effect(target, &frozen_effect).unwrap().unwrap();
    assert_eq!(modifier(&world, target, "power"), 8);

    world.level_up_effect(&mut live_effect);
    assert_eq!(modifier(&world, target, "power"), 11); // 3 -> 6

    world.level_up_effect(&mut frozen_effect);
    assert_eq!(modifier(&world, target, "power"), 11); // snapshot holds

    assert_eq!(world.effect_stack_info(target, &live)[0].level, 2);
    assert_eq!(world.effect_stack_info(target, &frozen)[0].level, 1);
}

#[test]
fn unapply_restores_prior_state() {
    let (mut world, source, target) = world_with(
        AttributeSet::new()
            .with_attribute("health", 50, 0, 100)
            .with_attribute("armor", 5, 0, 50),
    );

    let data = EffectData::builder("wardrobe")
        .infinite()
        .add_modifier(Modifier::flat("health", MagnitudeSpec::scalar(25.0)))
        .add_modifier(Modifier::flat("armor", MagnitudeSpec::scalar(10.0)))
        .add_component(Arc::new(ModifierTags::new(tags(&["state.armored"]))))
        .build()
        .unwrap();

    let handle = world
        .apply_effect(target, &Effect::new(data, source))
        .unwrap()
        .unwrap();
    assert_eq!(current(&world, target, "health"), 75);
    assert_eq!(current(&world, target, "armor"), 15);
    assert!(
        world
            .get::<EntityTags>(target)
            .unwrap()
            .combined()
            .has_tag(&tag("state.armored"))
    );

    world.unapply_effect(handle).unwrap();
    assert_eq!(current(&world, target, "health"), 50);
    assert_eq!(current(&world, target, "armor"), 5);
    assert_eq!(modifier(&world, target, "health"), 0);
    assert!(
        !world
            .get::<EntityTags>(target)
            .unwrap()
            .combined()
            .has_tag(&tag("state.armored"))
    );
    assert!(!handle.is_valid(&world));
    assert!(!world.unapply_effect(handle).unwrap());
}

#[test]
fn application_tag_requirements_veto_silently() {
    let (mut world, source, target) =
        world_with(AttributeSet::new().with_attribute("mana", 0, 0, 100));

    let data = EffectData::builder("ritual")
        .infinite()
        .add_modifier(Modifier::flat("mana", MagnitudeSpec::scalar(10.0)))
        .add_component(Arc::new(TargetTagRequirements::new().with_application(
            TagRequirements::new().require(tag("class.mage")),
        )))
        .build()
        .unwrap();
    let effect = Effect::new(data.clone(), source);

    assert!(!world.can_apply_effect(target, &effect));
    assert!(world.apply_effect(target, &effect).unwrap().is_none());
    assert!(world.effect_stack_info(target, &data).is_empty());

    world.add_owned_tag(target, tag("class.mage"));
    assert!(world.can_apply_effect(target, &effect));
    assert!(world.apply_effect(target, &effect).unwrap().is_some());
    assert_eq!(current(&world, target, "mana"), 10);
}
