//! Tag requirement checks used by effect components.

use crate::tags::{TagContainer, TagQuery};

use super::{CanApplyContext, EffectComponent};

/// A set of conditions over an entity's tag state.
///
/// All required tags must be present (hierarchy match), no ignored tag
/// may be present, and the optional query must match. Empty
/// requirements are always met.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagRequirements {
    /// Tags that must all be present.
    pub require_tags: TagContainer,
    /// Tags that must not be present.
    pub ignore_tags: TagContainer,
    /// Optional byte-coded query that must match.
    pub query: Option<TagQuery>,
}

impl TagRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires a tag to be present.
    pub fn require(mut self, tag: crate::tags::GameplayTag) -> Self {
        self.require_tags.add_tag(tag);
        self
    }

    /// Forbids a tag from being present.
    pub fn ignore(mut self, tag: crate::tags::GameplayTag) -> Self {
        self.ignore_tags.add_tag(tag);
        self
    }

    /// Adds a query condition.
    pub fn with_query(mut self, query: TagQuery) -> Self {
        self.query = Some(query);
        self
    }

    /// True when there is nothing to check.
    pub fn is_empty(&self) -> bool {
        self.require_tags.is_empty() && self.ignore_tags.is_empty() && self.query.is_none()
    }

    /// Checks the requirements against a tag state.
    pub fn met_by(&self, tags: &TagContainer) -> bool {
        if !tags.has_all(&self.require_tags) {
            return false;
        }
        if tags.has_any(&self.ignore_tags) {
            return false;
        }
        match &self.query {
            Some(query) => tags.matches_query(query),
            None => true,
        }
    }
}

/// Tag requirements against the target at three pipeline moments:
/// application (gate), removal (ejects the effect once met), and
/// ongoing (inhibition gate).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetTagRequirements {
    pub application: TagRequirements,
    pub removal: TagRequirements,
    pub ongoing: TagRequirements,
}

impl TargetTagRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_application(mut self, requirements: TagRequirements) -> Self {
        self.application = requirements;
        self
    }

    pub fn with_removal(mut self, requirements: TagRequirements) -> Self {
        self.removal = requirements;
        self
    }

    pub fn with_ongoing(mut self, requirements: TagRequirements) -> Self {
        self.ongoing = requirements;
        self
    }
}

impl EffectComponent for TargetTagRequirements {
    fn can_apply(&self, ctx: &CanApplyContext<'_>) -> bool {
        self.application.met_by(ctx.target_tags)
    }

    fn ongoing_requirements(&self) -> Option<&TagRequirements> {
        Some(&self.ongoing)
    }

    fn removal_requirements(&self) -> Option<&TagRequirements> {
        Some(&self.removal)
    }
}

/// Tags granted to the target while the effect is active and
/// uninhibited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifierTags {
    pub tags: TagContainer,
}

impl ModifierTags {
    pub fn new(tags: TagContainer) -> Self {
        Self { tags }
    }
}

impl EffectComponent for ModifierTags {
    fn modifier_tags(&self) -> Option<&TagContainer> {
        Some(&self.tags)
    }
}
