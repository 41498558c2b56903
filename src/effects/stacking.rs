//! Stacking policies.
//!
//! An effect with stacking data merges into an existing stack instead
//! of coexisting with it. The policy axes are orthogonal; the decision
//! procedure lives in the application pipeline.

use crate::magnitudes::ScalableInt;

/// What identifies a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackPolicy {
    /// Stacks are keyed on (source, target): different sources keep
    /// separate stacks.
    #[default]
    AggregateBySource,
    /// Stacks are keyed on the target alone.
    AggregateByTarget,
}

/// Whether different levels share a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackLevelPolicy {
    /// One stack regardless of level; level conflicts go through the
    /// denial/override policies.
    #[default]
    AggregateLevels,
    /// Each level keeps its own stack.
    SegregateLevels,
}

/// How the stack count feeds modifier magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackMagnitudePolicy {
    /// Modifier magnitude scales with the stack count.
    #[default]
    Sum,
    /// The count is cosmetic; magnitudes ignore it.
    DontStack,
}

/// What happens when an application arrives at the stack limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackOverflowPolicy {
    /// The application succeeds without changing the count (refresh
    /// policies still apply).
    #[default]
    AllowApplication,
    /// The application is rejected outright.
    DenyApplication,
}

/// What happens when a stacked effect's duration expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackExpirationPolicy {
    /// Drop one stack and restart the clock; the effect ends when the
    /// count reaches zero.
    #[default]
    RemoveSingleStackAndRefreshDuration,
    /// Remove the whole effect.
    ClearEntireStack,
    /// Just restart the clock. Only coherent on periodic effects.
    RefreshDuration,
}

/// What the stack count does when a level override succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelOverrideStackCountPolicy {
    /// Reset the count to the initial stack.
    #[default]
    ResetStacks,
    /// Keep counting up.
    IncreaseStacks,
}

/// Whether each successful application re-arms the duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplicationRefreshPolicy {
    #[default]
    RefreshOnSuccessfulApplication,
    NeverRefresh,
}

/// A set of level-comparison flags.
///
/// Each flag selects one relation of the incoming application's level
/// against the current stack's level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelComparison {
    pub lower: bool,
    pub equal: bool,
    pub higher: bool,
}

impl LevelComparison {
    /// No relation selected; never matches.
    pub const NONE: Self = Self {
        lower: false,
        equal: false,
        higher: false,
    };

    pub const LOWER: Self = Self {
        lower: true,
        equal: false,
        higher: false,
    };

    pub const EQUAL: Self = Self {
        lower: false,
        equal: true,
        higher: false,
    };

    pub const HIGHER: Self = Self {
        lower: false,
        equal: false,
        higher: true,
    };

    /// Union of two flag sets.
    pub const fn or(self, other: Self) -> Self {
        Self {
            lower: self.lower || other.lower,
            equal: self.equal || other.equal,
            higher: self.higher || other.higher,
        }
    }

    /// Whether the relation of `incoming` against `current` is selected.
    pub fn matches(&self, incoming: i32, current: i32) -> bool {
        (incoming < current && self.lower)
            || (incoming == current && self.equal)
            || (incoming > current && self.higher)
    }
}

/// Full stacking policy vector for an effect.
#[derive(Debug, Clone, PartialEq)]
pub struct StackingData {
    pub stack_policy: StackPolicy,
    pub stack_level_policy: StackLevelPolicy,
    pub magnitude_policy: StackMagnitudePolicy,
    pub overflow_policy: StackOverflowPolicy,
    pub expiration_policy: StackExpirationPolicy,
    /// Deny application when the incoming level relates like this to
    /// the current one.
    pub level_denial_policy: LevelComparison,
    /// Replace the current level when the incoming level relates like
    /// this to it.
    pub level_override_policy: LevelComparison,
    pub level_override_stack_count_policy: LevelOverrideStackCountPolicy,
    pub application_refresh_policy: ApplicationRefreshPolicy,
    /// Maximum stack count.
    pub stack_limit: ScalableInt,
    /// Count established by the first application.
    pub initial_stack: ScalableInt,
}

impl Default for StackingData {
    fn default() -> Self {
        Self {
            stack_policy: StackPolicy::default(),
            stack_level_policy: StackLevelPolicy::default(),
            magnitude_policy: StackMagnitudePolicy::default(),
            overflow_policy: StackOverflowPolicy::default(),
            expiration_policy: StackExpirationPolicy::default(),
            level_denial_policy: LevelComparison::NONE,
            level_override_policy: LevelComparison::NONE,
            level_override_stack_count_policy: LevelOverrideStackCountPolicy::default(),
            application_refresh_policy: ApplicationRefreshPolicy::default(),
            stack_limit: ScalableInt::new(1),
            initial_stack: ScalableInt::new(1),
        }
    }
}

impl StackingData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: ScalableInt) -> Self {
        self.stack_limit = limit;
        self
    }

    pub fn with_initial_stack(mut self, initial: ScalableInt) -> Self {
        self.initial_stack = initial;
        self
    }

    pub fn with_stack_policy(mut self, policy: StackPolicy) -> Self {
        self.stack_policy = policy;
        self
    }

    pub fn with_level_policy(mut self, policy: StackLevelPolicy) -> Self {
        self.stack_level_policy = policy;
        self
    }

    pub fn with_magnitude_policy(mut self, policy: StackMagnitudePolicy) -> Self {
        self.magnitude_policy = policy;
        self
    }

    pub fn with_overflow_policy(mut self, policy: StackOverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn with_expiration_policy(mut self, policy: StackExpirationPolicy) -> Self {
        self.expiration_policy = policy;
        self
    }

    pub fn with_level_denial(mut self, comparison: LevelComparison) -> Self {
        self.level_denial_policy = comparison;
        self
    }

    pub fn with_level_override(mut self, comparison: LevelComparison) -> Self {
        self.level_override_policy = comparison;
        self
    }

    pub fn with_level_override_stack_count(mut self, policy: LevelOverrideStackCountPolicy) -> Self {
        self.level_override_stack_count_policy = policy;
        self
    }

    pub fn with_application_refresh(mut self, policy: ApplicationRefreshPolicy) -> Self {
        self.application_refresh_policy = policy;
        self
    }
}
