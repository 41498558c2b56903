//! Single attribute data with base, modifier, overflow, and bound
//! channels.
//!
//! The modifier channel accumulates every submitted flat delta exactly;
//! the portion that would push the value past `max` is tracked as
//! overflow so it can be restored when the bound moves. The derived
//! current value always stays inside `[min, max]`.

/// The channels an attribute exposes for capture and cue sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeChannel {
    /// The clamped, user-visible value.
    Current,
    /// The permanent value written by instant and periodic executions.
    Base,
    /// The exact sum of submitted flat deltas.
    Modifier,
    /// The modifier minus any overflowed portion.
    ValidModifier,
    /// The portion of the modifier lost past the max bound.
    Overflow,
    /// Lower bound.
    Min,
    /// Upper bound.
    Max,
    /// `base + valid_modifier`, before the final clamp.
    MagnitudeUpToChannel,
}

/// A five-channel integer attribute.
///
/// All mutation goes through the owning [`AttributeSet`](super::AttributeSet);
/// external code reads channels and listens for change events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameplayAttribute {
    base_value: i32,
    modifier: i32,
    valid_modifier: i32,
    overflow: i32,
    min: i32,
    max: i32,
    current_value: i32,
}

impl GameplayAttribute {
    /// Creates an attribute with the given default base and bounds. The
    /// default is clamped into `[min, max]`.
    pub fn new(default_value: i32, min: i32, max: i32) -> Self {
        let max = max.max(min);
        let mut attribute = Self {
            base_value: default_value.clamp(min, max),
            modifier: 0,
            valid_modifier: 0,
            overflow: 0,
            min,
            max,
            current_value: 0,
        };
        attribute.recompute();
        attribute
    }

    /// An attribute with the full `i32` range as bounds.
    pub fn unbounded(default_value: i32) -> Self {
        Self::new(default_value, i32::MIN, i32::MAX)
    }

    pub fn base_value(&self) -> i32 {
        self.base_value
    }

    pub fn current_value(&self) -> i32 {
        self.current_value
    }

    pub fn modifier(&self) -> i32 {
        self.modifier
    }

    pub fn valid_modifier(&self) -> i32 {
        self.valid_modifier
    }

    pub fn overflow(&self) -> i32 {
        self.overflow
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    /// Reads one channel.
    pub fn channel_value(&self, channel: AttributeChannel) -> i32 {
        match channel {
            AttributeChannel::Current => self.current_value,
            AttributeChannel::Base => self.base_value,
            AttributeChannel::Modifier => self.modifier,
            AttributeChannel::ValidModifier => self.valid_modifier,
            AttributeChannel::Overflow => self.overflow,
            AttributeChannel::Min => self.min,
            AttributeChannel::Max => self.max,
            AttributeChannel::MagnitudeUpToChannel => {
                self.base_value.saturating_add(self.valid_modifier)
            }
        }
    }

    /// Adds a signed delta to the modifier channel and returns the
    /// resulting change in current value.
    pub(crate) fn add_flat_modifier(&mut self, delta: i32) -> i32 {
        self.modifier = self.modifier.saturating_add(delta);
        self.recompute()
    }

    /// Adds a signed delta to the base value (clamped into bounds) and
    /// returns the resulting change in current value.
    pub(crate) fn add_base_value(&mut self, delta: i32) -> i32 {
        self.set_base_value(self.base_value.saturating_add(delta))
    }

    /// Sets the base value (clamped into bounds) and returns the
    /// resulting change in current value.
    pub(crate) fn set_base_value(&mut self, value: i32) -> i32 {
        self.base_value = value.clamp(self.min, self.max);
        self.recompute()
    }

    /// Reconfigures the lower bound (kept at or below `max`) and
    /// returns the resulting change in current value. Bounds only
    /// redistribute the derived channels; the base value is untouched.
    pub(crate) fn set_min(&mut self, min: i32) -> i32 {
        self.min = min.min(self.max);
        self.recompute()
    }

    /// Reconfigures the upper bound (kept at or above `min`) and
    /// returns the resulting change in current value. Value lost past
    /// the old bound is restored when the bound rises; the base value
    /// is untouched.
    pub(crate) fn set_max(&mut self, max: i32) -> i32 {
        self.max = max.max(self.min);
        self.recompute()
    }

    /// Re-derives valid modifier, overflow, and current value from the
    /// base/modifier channels and bounds. Returns the signed change in
    /// current value.
    fn recompute(&mut self) -> i32 {
        let previous = self.current_value;
        let prospective = self.base_value.saturating_add(self.modifier);
        if prospective > self.max {
            self.overflow = prospective - self.max;
            self.valid_modifier = self.modifier - self.overflow;
        } else {
            self.overflow = 0;
            self.valid_modifier = self.modifier;
        }
        self.current_value = prospective.clamp(self.min, self.max);
        self.current_value - previous
    }
}
