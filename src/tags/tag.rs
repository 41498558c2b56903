//! Interned gameplay tag identifiers.
//!
//! Tags are dotted hierarchical keys ("enemy.undead.zombie") interned
//! through `string_cache`, so clones and equality checks are cheap. All
//! valid tags originate from a [`TagRegistry`](super::TagRegistry); the
//! empty sentinel stands in for "no tag".

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use string_cache::DefaultAtom;

/// An interned, hierarchical gameplay tag.
///
/// Equality, ordering, and hashing are all defined over the normalized
/// key, so two tags with the same key are the same tag regardless of how
/// they were obtained.
#[derive(Clone)]
pub struct GameplayTag {
    key: DefaultAtom,
}

impl GameplayTag {
    /// Creates a tag directly from an already-normalized key.
    ///
    /// Registry construction and parent derivation use this; game code
    /// should go through [`TagRegistry::request_tag`](super::TagRegistry::request_tag)
    /// so that typos surface as errors.
    pub(crate) fn from_normalized(key: &str) -> Self {
        Self {
            key: DefaultAtom::from(key),
        }
    }

    /// The empty sentinel tag.
    pub fn none() -> Self {
        Self {
            key: DefaultAtom::from(""),
        }
    }

    /// The normalized dotted key of this tag.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns true unless this is the empty sentinel.
    pub fn is_valid(&self) -> bool {
        !self.key.is_empty()
    }

    /// Hierarchy match: true when `other` is this tag or one of its
    /// ancestors ("enemy.undead" matches "enemy").
    ///
    /// The empty tag never matches anything, on either side.
    pub fn matches(&self, other: &GameplayTag) -> bool {
        if !self.is_valid() || !other.is_valid() {
            return false;
        }
        if self.key == other.key {
            return true;
        }
        self.key.len() > other.key.len()
            && self.key.starts_with(other.key())
            && self.key.as_bytes()[other.key.len()] == b'.'
    }

    /// Exact match: same key, both valid.
    pub fn matches_exact(&self, other: &GameplayTag) -> bool {
        self.is_valid() && other.is_valid() && self.key == other.key
    }

    /// All ancestor tags of this tag, nearest first
    /// ("a.b.c" yields "a.b" then "a").
    pub fn ancestors(&self) -> Vec<GameplayTag> {
        let mut out = Vec::new();
        let key = self.key();
        let mut end = key.len();
        while let Some(dot) = key[..end].rfind('.') {
            out.push(GameplayTag::from_normalized(&key[..dot]));
            end = dot;
        }
        out
    }
}

impl PartialEq for GameplayTag {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for GameplayTag {}

impl Hash for GameplayTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for GameplayTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GameplayTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(other.key())
    }
}

impl fmt::Debug for GameplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GameplayTag({})", self.key())
    }
}

impl fmt::Display for GameplayTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_match() {
        let zombie = GameplayTag::from_normalized("enemy.undead.zombie");
        let undead = GameplayTag::from_normalized("enemy.undead");
        let enemy = GameplayTag::from_normalized("enemy");

        assert!(zombie.matches(&undead));
        assert!(zombie.matches(&enemy));
        assert!(zombie.matches(&zombie));
        assert!(!undead.matches(&zombie));
    }

    #[test]
    fn prefix_without_dot_boundary_does_not_match() {
        let enemies = GameplayTag::from_normalized("enemies");
        let enemy = GameplayTag::from_normalized("enemy");

        assert!(!enemies.matches(&enemy));
    }

    #[test]
    fn empty_tag_never_matches() {
        let none = GameplayTag::none();
        let enemy = GameplayTag::from_normalized("enemy");

        assert!(!none.matches(&enemy));
        assert!(!enemy.matches(&none));
        assert!(!none.matches(&GameplayTag::none()));
        assert!(!none.matches_exact(&GameplayTag::none()));
    }

    #[test]
    fn ancestors_nearest_first() {
        let tag = GameplayTag::from_normalized("a.b.c");
        let ancestors = tag.ancestors();

        assert_eq!(ancestors.len(), 2);
        assert_eq!(ancestors[0].key(), "a.b");
        assert_eq!(ancestors[1].key(), "a");
        assert!(GameplayTag::from_normalized("a").ancestors().is_empty());
    }

    #[test]
    fn equality_is_by_key() {
        let a = GameplayTag::from_normalized("color.red");
        let b = GameplayTag::from_normalized("color.red");

        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }
}
