//! Attribute sets: the per-entity collection of named attributes.
//!
//! A set owns its attributes in declaration order and optionally carries
//! a hook that reacts to value changes before any external listener,
//! which is how derived-attribute rules (`max_health = vitality * 10`)
//! are expressed. Hook cascades run to a fixed point with a bounded
//! pass count.

use bevy::prelude::*;

use super::attribute::GameplayAttribute;

/// Upper bound on hook cascade length within one write. Reaching it
/// means the hook rules never settle; the engine stops and warns.
const MAX_CASCADE: usize = 64;

/// One observed change to an attribute's current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub attribute: String,
    pub old_current: i32,
    pub new_current: i32,
}

impl AttributeChange {
    pub fn delta(&self) -> i32 {
        self.new_current - self.old_current
    }
}

/// A single write against one attribute channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttributeWrite {
    AddFlatModifier(i32),
    AddBaseValue(i32),
    SetBaseValue(i32),
    SetMin(i32),
    SetMax(i32),
}

/// Derived-attribute rules attached to a set.
///
/// The hook runs before external listeners see the change and may
/// reconfigure sibling attributes through the writer; those writes feed
/// back into the same cascade.
pub trait AttributeSetHook: Send + Sync + 'static {
    fn on_value_changed(&self, set: &mut AttributeSetWriter<'_>, attribute: &str, delta: i32);
}

/// Named collection of attributes owned by one entity.
#[derive(Component, Default)]
pub struct AttributeSet {
    attributes: Vec<(String, GameplayAttribute)>,
    hook: Option<Box<dyn AttributeSetHook>>,
}

impl AttributeSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute with a default base value and bounds. Re-adding
    /// an existing name replaces it.
    pub fn with_attribute(mut self, name: impl Into<String>, default: i32, min: i32, max: i32) -> Self {
        let name = name.into();
        let attribute = GameplayAttribute::new(default, min, max);
        if let Some(slot) = self.attributes.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = attribute;
        } else {
            self.attributes.push((name, attribute));
        }
        self
    }

    /// Adds an attribute without bounds.
    pub fn with_unbounded_attribute(self, name: impl Into<String>, default: i32) -> Self {
        self.with_attribute(name, default, i32::MIN, i32::MAX)
    }

    /// Installs the derived-attribute hook.
    pub fn with_hook(mut self, hook: impl AttributeSetHook) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Looks an attribute up by name.
    pub fn get(&self, name: &str) -> Option<&GameplayAttribute> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
    }

    /// True when the set holds an attribute of that name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates `(name, attribute)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GameplayAttribute)> {
        self.attributes.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut GameplayAttribute> {
        self.attributes
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
    }

    /// Applies one write and runs the hook cascade to a fixed point.
    ///
    /// Returns every current-value change observed, in occurrence order.
    /// A write against a missing attribute is silently tolerated and
    /// produces no changes.
    pub(crate) fn apply_write(&mut self, name: &str, write: AttributeWrite) -> Vec<AttributeChange> {
        let mut changes = Vec::new();
        self.write_channel(name, write, &mut changes);
        self.run_hook_cascade(&mut changes);
        changes
    }

    fn write_channel(&mut self, name: &str, write: AttributeWrite, changes: &mut Vec<AttributeChange>) {
        let Some(attribute) = self.get_mut(name) else {
            return;
        };
        let old_current = attribute.current_value();
        let delta = match write {
            AttributeWrite::AddFlatModifier(delta) => attribute.add_flat_modifier(delta),
            AttributeWrite::AddBaseValue(delta) => attribute.add_base_value(delta),
            AttributeWrite::SetBaseValue(value) => attribute.set_base_value(value),
            AttributeWrite::SetMin(min) => attribute.set_min(min),
            AttributeWrite::SetMax(max) => attribute.set_max(max),
        };
        if delta != 0 {
            changes.push(AttributeChange {
                attribute: name.to_string(),
                old_current,
                new_current: old_current + delta,
            });
        }
    }

    fn run_hook_cascade(&mut self, changes: &mut Vec<AttributeChange>) {
        let Some(hook) = self.hook.take() else {
            return;
        };
        let mut cursor = 0;
        while cursor < changes.len() {
            if cursor >= MAX_CASCADE {
                warn!("attribute hook cascade did not settle, stopping");
                break;
            }
            let change = changes[cursor].clone();
            cursor += 1;
            let mut writer = AttributeSetWriter {
                set: &mut *self,
                changes: &mut *changes,
            };
            hook.on_value_changed(&mut writer, &change.attribute, change.delta());
        }
        self.hook = Some(hook);
    }
}

/// Mutable view of a set handed to [`AttributeSetHook`] implementations.
///
/// Every mutation made through the writer is recorded into the ongoing
/// cascade so downstream rules and listeners observe it.
pub struct AttributeSetWriter<'a> {
    set: &'a mut AttributeSet,
    changes: &'a mut Vec<AttributeChange>,
}

impl AttributeSetWriter<'_> {
    pub fn get(&self, name: &str) -> Option<&GameplayAttribute> {
        self.set.get(name)
    }

    pub fn set_min(&mut self, name: &str, min: i32) {
        self.set
            .write_channel(name, AttributeWrite::SetMin(min), self.changes);
    }

    pub fn set_max(&mut self, name: &str, max: i32) {
        self.set
            .write_channel(name, AttributeWrite::SetMax(max), self.changes);
    }

    pub fn set_base_value(&mut self, name: &str, value: i32) {
        self.set
            .write_channel(name, AttributeWrite::SetBaseValue(value), self.changes);
    }
}
