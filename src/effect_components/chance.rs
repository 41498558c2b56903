//! Probabilistic application gate.

use std::collections::VecDeque;
use std::sync::Mutex;

use rand::RngExt;

use crate::magnitudes::ScalableFloat;

use super::{CanApplyContext, EffectComponent};

/// Source of uniform values in `[0, 1)` for chance rolls.
///
/// The engine never reaches for a global RNG; the source is injected so
/// tests can make rolls deterministic.
pub trait ChanceRandom: Send + Sync {
    fn next_value(&mut self) -> f32;
}

/// Production randomness backed by the thread-local generator.
#[derive(Debug, Default)]
pub struct ThreadRandom;

impl ChanceRandom for ThreadRandom {
    fn next_value(&mut self) -> f32 {
        rand::rng().random::<f32>()
    }
}

/// Deterministic randomness serving values from a fixed queue.
///
/// An exhausted queue keeps returning 0.0, which passes any non-zero
/// chance.
#[derive(Debug, Default)]
pub struct FixedQueueRandom {
    queue: VecDeque<f32>,
}

impl FixedQueueRandom {
    pub fn new<I: IntoIterator<Item = f32>>(values: I) -> Self {
        Self {
            queue: values.into_iter().collect(),
        }
    }
}

impl ChanceRandom for FixedQueueRandom {
    fn next_value(&mut self) -> f32 {
        self.queue.pop_front().unwrap_or(0.0)
    }
}

/// Gates application on a level-scalable probability.
pub struct ChanceToApply {
    chance: ScalableFloat,
    random: Mutex<Box<dyn ChanceRandom>>,
}

impl ChanceToApply {
    /// Uses thread-local randomness.
    pub fn new(chance: ScalableFloat) -> Self {
        Self::with_random(chance, ThreadRandom)
    }

    /// Uses an injected randomness source.
    pub fn with_random(chance: ScalableFloat, random: impl ChanceRandom + 'static) -> Self {
        Self {
            chance,
            random: Mutex::new(Box::new(random)),
        }
    }
}

impl EffectComponent for ChanceToApply {
    fn can_apply(&self, ctx: &CanApplyContext<'_>) -> bool {
        let mut random = self
            .random
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        random.next_value() < self.chance.evaluate(ctx.level)
    }
}
