//! Tag containers: sets of tags with a cached ancestor closure.
//!
//! A container holds the tags that were explicitly added plus a derived
//! set of every ancestor of those tags, so hierarchy matches are set
//! lookups rather than string walks. The parent cache is re-derived
//! after every mutation unless the caller opts into deferred batching.

use std::collections::BTreeSet;
use std::fmt;

use super::query::TagQuery;
use super::tag::GameplayTag;

/// An unordered set of gameplay tags.
///
/// Two containers are equal when their explicit tag sets have the same
/// membership, regardless of insertion order. The parent closure is a
/// cache and never participates in equality.
#[derive(Clone, Default)]
pub struct TagContainer {
    tags: BTreeSet<GameplayTag>,
    parent_tags: BTreeSet<GameplayTag>,
    defer_parent_update: bool,
}

impl TagContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a container from the given tags.
    pub fn from_tags<I>(tags: I) -> Self
    where
        I: IntoIterator<Item = GameplayTag>,
    {
        let mut container = Self::new();
        container.set_defer_parent_update(true);
        for tag in tags {
            container.add_tag(tag);
        }
        container.set_defer_parent_update(false);
        container
    }

    /// Number of explicit tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True when no explicit tags are present.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterates the explicit tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = &GameplayTag> {
        self.tags.iter()
    }

    /// The first explicit tag in key order, if any.
    pub fn first(&self) -> Option<&GameplayTag> {
        self.tags.iter().next()
    }

    /// Adds a tag. Invalid sentinel tags are ignored.
    pub fn add_tag(&mut self, tag: GameplayTag) {
        if !tag.is_valid() {
            return;
        }
        if self.tags.insert(tag.clone()) && !self.defer_parent_update {
            for ancestor in tag.ancestors() {
                self.parent_tags.insert(ancestor);
            }
        }
    }

    /// Adds every explicit tag of `other`.
    pub fn append_tags(&mut self, other: &TagContainer) {
        for tag in other.iter() {
            self.add_tag(tag.clone());
        }
    }

    /// Removes a tag, re-deriving the parent closure.
    ///
    /// Returns true when the tag was present.
    pub fn remove_tag(&mut self, tag: &GameplayTag) -> bool {
        let removed = self.tags.remove(tag);
        if removed && !self.defer_parent_update {
            self.fill_parent_tags();
        }
        removed
    }

    /// Removes every explicit tag of `other`.
    pub fn remove_tags(&mut self, other: &TagContainer) {
        let mut any = false;
        for tag in other.iter() {
            any |= self.tags.remove(tag);
        }
        if any && !self.defer_parent_update {
            self.fill_parent_tags();
        }
    }

    /// Drops all tags.
    pub fn clear(&mut self) {
        self.tags.clear();
        self.parent_tags.clear();
    }

    /// Toggles deferred parent maintenance for batch mutation. Turning
    /// the flag off re-derives the closure immediately.
    pub fn set_defer_parent_update(&mut self, defer: bool) {
        self.defer_parent_update = defer;
        if !defer {
            self.fill_parent_tags();
        }
    }

    /// Re-derives the parent closure from the explicit tags. Only needed
    /// manually while deferred batching is active.
    pub fn fill_parent_tags(&mut self) {
        self.parent_tags.clear();
        for tag in &self.tags {
            for ancestor in tag.ancestors() {
                self.parent_tags.insert(ancestor);
            }
        }
    }

    /// Hierarchy membership: `tag` is present explicitly or as an
    /// ancestor of a present tag ("enemy" is in {"enemy.undead"}).
    pub fn has_tag(&self, tag: &GameplayTag) -> bool {
        tag.is_valid() && (self.tags.contains(tag) || self.parent_tags.contains(tag))
    }

    /// Exact membership.
    pub fn has_tag_exact(&self, tag: &GameplayTag) -> bool {
        tag.is_valid() && self.tags.contains(tag)
    }

    /// True when any tag of `other` passes [`TagContainer::has_tag`].
    /// An empty `other` yields false.
    pub fn has_any(&self, other: &TagContainer) -> bool {
        other.iter().any(|tag| self.has_tag(tag))
    }

    /// True when any tag of `other` passes [`TagContainer::has_tag_exact`].
    pub fn has_any_exact(&self, other: &TagContainer) -> bool {
        other.iter().any(|tag| self.has_tag_exact(tag))
    }

    /// True when every tag of `other` passes [`TagContainer::has_tag`].
    /// An empty `other` yields true.
    pub fn has_all(&self, other: &TagContainer) -> bool {
        other.iter().all(|tag| self.has_tag(tag))
    }

    /// True when every tag of `other` passes [`TagContainer::has_tag_exact`].
    pub fn has_all_exact(&self, other: &TagContainer) -> bool {
        other.iter().all(|tag| self.has_tag_exact(tag))
    }

    /// New container of the explicit tags whose hierarchy overlaps
    /// `filter`: a tag survives when it equals or descends from any of
    /// `filter`'s tags.
    pub fn filter(&self, filter: &TagContainer) -> TagContainer {
        TagContainer::from_tags(
            self.tags
                .iter()
                .filter(|tag| filter.iter().any(|f| tag.matches(f)))
                .cloned(),
        )
    }

    /// New container of the explicit tags exactly present in `filter`.
    pub fn filter_exact(&self, filter: &TagContainer) -> TagContainer {
        TagContainer::from_tags(
            self.tags
                .iter()
                .filter(|tag| filter.has_tag_exact(tag))
                .cloned(),
        )
    }

    /// Evaluates a byte-coded query against this container.
    pub fn matches_query(&self, query: &TagQuery) -> bool {
        query.matches(self)
    }
}

impl PartialEq for TagContainer {
    fn eq(&self, other: &Self) -> bool {
        self.tags == other.tags
    }
}

impl Eq for TagContainer {}

impl fmt::Debug for TagContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.tags.iter()).finish()
    }
}

impl FromIterator<GameplayTag> for TagContainer {
    fn from_iter<I: IntoIterator<Item = GameplayTag>>(iter: I) -> Self {
        Self::from_tags(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(key: &str) -> GameplayTag {
        GameplayTag::from_normalized(key)
    }

    #[test]
    fn hierarchy_membership() {
        let container = TagContainer::from_tags([tag("enemy.undead.zombie")]);

        assert!(container.has_tag(&tag("enemy")));
        assert!(container.has_tag(&tag("enemy.undead")));
        assert!(container.has_tag(&tag("enemy.undead.zombie")));
        assert!(!container.has_tag(&tag("enemy.beast")));

        assert!(container.has_tag_exact(&tag("enemy.undead.zombie")));
        assert!(!container.has_tag_exact(&tag("enemy")));
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let mut a = TagContainer::new();
        a.add_tag(tag("color.red"));
        a.add_tag(tag("color.blue"));

        let mut b = TagContainer::new();
        b.add_tag(tag("color.blue"));
        b.add_tag(tag("color.red"));

        assert_eq!(a, b);
    }

    #[test]
    fn empty_container_truth_table() {
        let empty = TagContainer::new();
        let other = TagContainer::from_tags([tag("enemy")]);

        assert!(!empty.has_tag(&tag("enemy")));
        assert!(!empty.has_any(&other));
        assert!(empty.has_all(&TagContainer::new()));
        assert!(!empty.has_any(&TagContainer::new()));
        assert!(other.has_all(&TagContainer::new()));
        assert!(!other.has_any(&TagContainer::new()));
    }

    #[test]
    fn removal_rederives_parents() {
        let mut container = TagContainer::from_tags([tag("enemy.undead"), tag("enemy.beast")]);
        assert!(container.has_tag(&tag("enemy")));

        container.remove_tag(&tag("enemy.undead"));
        assert!(container.has_tag(&tag("enemy")));

        container.remove_tag(&tag("enemy.beast"));
        assert!(!container.has_tag(&tag("enemy")));
    }

    #[test]
    fn deferred_parent_batching() {
        let mut container = TagContainer::new();
        container.set_defer_parent_update(true);
        container.add_tag(tag("enemy.undead"));
        assert!(!container.has_tag(&tag("enemy")));

        container.fill_parent_tags();
        assert!(container.has_tag(&tag("enemy")));

        container.set_defer_parent_update(false);
        container.remove_tag(&tag("enemy.undead"));
        container.fill_parent_tags();
        assert!(!container.has_tag(&tag("enemy")));
    }

    #[test]
    fn filter_keeps_hierarchy_overlap() {
        let container =
            TagContainer::from_tags([tag("enemy.undead.zombie"), tag("enemy.beast"), tag("ally")]);
        let filter = TagContainer::from_tags([tag("enemy.undead"), tag("ally")]);

        let filtered = container.filter(&filter);
        assert!(filtered.has_tag_exact(&tag("enemy.undead.zombie")));
        assert!(filtered.has_tag_exact(&tag("ally")));
        assert!(!filtered.has_tag_exact(&tag("enemy.beast")));
    }

    #[test]
    fn filter_exact_is_strict() {
        let container = TagContainer::from_tags([tag("enemy.undead.zombie"), tag("enemy.beast")]);
        let filter = TagContainer::from_tags([tag("enemy.undead"), tag("enemy.beast")]);

        let filtered = container.filter_exact(&filter);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.has_tag_exact(&tag("enemy.beast")));
    }

    #[test]
    fn append_and_remove_sets() {
        let mut container = TagContainer::from_tags([tag("a.b")]);
        let other = TagContainer::from_tags([tag("c.d"), tag("a.b")]);

        container.append_tags(&other);
        assert_eq!(container.len(), 2);
        assert!(container.has_tag(&tag("c")));

        container.remove_tags(&other);
        assert!(container.is_empty());
        assert!(!container.has_tag(&tag("c")));
    }
}
