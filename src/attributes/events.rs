//! Attribute change notification.

use bevy::prelude::*;

/// Observer event raised when an attribute's current value changed.
///
/// One event fires per attribute per transaction, carrying the net
/// delta: intermediate values produced while a transaction settles are
/// never observable from the outside.
#[derive(Event, Debug, Clone)]
pub struct AttributeChangedEvent {
    /// The entity owning the attribute set.
    pub entity: Entity,
    /// Name of the changed attribute.
    pub attribute: String,
    /// Current value before the transaction.
    pub old_value: i32,
    /// Current value after the transaction.
    pub new_value: i32,
}

impl AttributeChangedEvent {
    /// Signed net change in current value.
    pub fn delta(&self) -> i32 {
        self.new_value - self.old_value
    }
}
