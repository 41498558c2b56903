//! Pluggable effect components.
//!
//! Components are predicates and modifiers attached to an effect
//! specification. The hook set is deliberately finite: a component may
//! veto application, contribute ongoing/removal tag requirements, and
//! grant tags while the effect is active. The lifecycle invokes each
//! hook at its defined pipeline stage.

pub mod chance;
pub mod tag_requirements;

use crate::tags::TagContainer;

pub use chance::{ChanceRandom, ChanceToApply, FixedQueueRandom, ThreadRandom};
pub use tag_requirements::{ModifierTags, TagRequirements, TargetTagRequirements};

/// Context handed to `can_apply` checks.
pub struct CanApplyContext<'a> {
    /// The combined tag state of the target (owned plus granted).
    pub target_tags: &'a TagContainer,
    /// The level the effect would be applied at.
    pub level: i32,
}

/// Hook interface for effect components.
///
/// Every hook is opt-in with a pass-through default, so a component
/// only participates in the stages it cares about.
pub trait EffectComponent: Send + Sync + 'static {
    /// Consulted in declaration order before application; any refusal
    /// aborts the apply with no side effects.
    fn can_apply(&self, ctx: &CanApplyContext<'_>) -> bool {
        let _ = ctx;
        true
    }

    /// Requirements that must hold for the effect to stay uninhibited.
    fn ongoing_requirements(&self) -> Option<&TagRequirements> {
        None
    }

    /// Requirements that, once met, remove the effect outright.
    fn removal_requirements(&self) -> Option<&TagRequirements> {
        None
    }

    /// Tags granted to the target while the effect is active and
    /// uninhibited.
    fn modifier_tags(&self) -> Option<&TagContainer> {
        None
    }
}
