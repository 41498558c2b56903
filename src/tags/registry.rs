//! Tag registry construction and lookup.
//!
//! The registry is built once from the game's full tag list, admits every
//! implicit ancestor as a node of its own, and assigns each node a dense
//! 16-bit net index in sorted-by-full-key order. The net index is what
//! travels over the wire (see [`super::serialization`]).

use std::collections::HashMap;

use bevy::prelude::*;

use crate::core::TagError;

use super::container::TagContainer;
use super::tag::GameplayTag;

/// Default number of bits available for a serialized container's tag
/// count, allowing up to 63 tags per container.
pub const DEFAULT_CONTAINER_SIZE_BITS: u8 = 6;

/// Result of validating a tag key.
///
/// `fixed` is a best-effort repaired key: invalid characters replaced
/// with `_`, surrounding whitespace and leading/trailing dots removed,
/// lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagKeyValidation {
    pub is_valid: bool,
    pub error: Option<String>,
    pub fixed: String,
}

/// Checks a tag key against the rules: non-empty, no whitespace, no
/// commas or backslashes, no leading or trailing dots, no empty segments.
pub fn validate_tag_key(key: &str) -> TagKeyValidation {
    let fixed = fix_tag_key(key);

    let error = if key.trim().is_empty() {
        Some("tag key is empty".to_string())
    } else if key != key.trim() {
        Some("tag key has surrounding whitespace".to_string())
    } else if key.chars().any(|c| c.is_whitespace()) {
        Some("tag key contains whitespace".to_string())
    } else if key.contains(',') {
        Some("tag key contains a comma".to_string())
    } else if key.contains('\\') {
        Some("tag key contains a backslash".to_string())
    } else if key.starts_with('.') || key.ends_with('.') {
        Some("tag key starts or ends with a dot".to_string())
    } else if key.split('.').any(str::is_empty) {
        Some("tag key contains an empty segment".to_string())
    } else {
        None
    };

    TagKeyValidation {
        is_valid: error.is_none(),
        error,
        fixed,
    }
}

/// Produces the repaired form of a key, as described on
/// [`TagKeyValidation`].
pub fn fix_tag_key(key: &str) -> String {
    let substituted: String = key
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c == ',' || c == '\\' {
                '_'
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect();
    substituted.trim_matches('.').to_string()
}

struct TagNode {
    parent: Option<GameplayTag>,
    /// This node's tag plus all of its ancestors, precomputed.
    single_tag_container: TagContainer,
    net_index: u16,
}

/// Construct-once registry of every tag the game knows about.
///
/// Lookups are case-insensitive and whitespace-trimmed. The registry is
/// safe for concurrent reads once constructed; it is never mutated.
#[derive(Resource)]
pub struct TagRegistry {
    nodes: HashMap<GameplayTag, TagNode>,
    by_net_index: Vec<GameplayTag>,
    container_size_bits: u8,
}

impl TagRegistry {
    /// Builds a registry from the given keys.
    ///
    /// Keys are normalized (trimmed, lowercased) and validated; an
    /// invalid key rejects the whole construction. Every dotted prefix of
    /// a key becomes a registered node of its own.
    pub fn new<I, S>(keys: I) -> Result<Self, TagError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_container_size_bits(keys, DEFAULT_CONTAINER_SIZE_BITS)
    }

    /// Like [`TagRegistry::new`], with an explicit bit budget for the
    /// serialized container count.
    pub fn with_container_size_bits<I, S>(keys: I, bits: u8) -> Result<Self, TagError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut full_keys: Vec<String> = Vec::new();
        for key in keys {
            let normalized = key.as_ref().trim().to_ascii_lowercase();
            let validation = validate_tag_key(&normalized);
            if !validation.is_valid {
                return Err(TagError::InvalidKey {
                    key: key.as_ref().to_string(),
                    reason: validation.error.unwrap_or_default(),
                });
            }
            // Admit every implicit ancestor as a node.
            let mut end = normalized.len();
            full_keys.push(normalized.clone());
            while let Some(dot) = normalized[..end].rfind('.') {
                full_keys.push(normalized[..dot].to_string());
                end = dot;
            }
        }

        full_keys.sort();
        full_keys.dedup();

        if full_keys.len() >= u16::MAX as usize - 1 {
            return Err(TagError::RegistryTooLarge(full_keys.len()));
        }

        let mut nodes = HashMap::with_capacity(full_keys.len());
        let mut by_net_index = Vec::with_capacity(full_keys.len());
        for (index, key) in full_keys.iter().enumerate() {
            let tag = GameplayTag::from_normalized(key);
            let parent = key
                .rfind('.')
                .map(|dot| GameplayTag::from_normalized(&key[..dot]));
            let mut single = TagContainer::new();
            single.add_tag(tag.clone());
            nodes.insert(
                tag.clone(),
                TagNode {
                    parent,
                    single_tag_container: single,
                    net_index: index as u16,
                },
            );
            by_net_index.push(tag);
        }

        debug!("tag registry constructed with {} nodes", by_net_index.len());

        Ok(Self {
            nodes,
            by_net_index,
            container_size_bits: bits,
        })
    }

    /// Looks a tag up by key.
    ///
    /// With `error_if_not_found` the absence is a [`TagError::NotRegistered`];
    /// otherwise the empty sentinel comes back.
    pub fn request_tag(&self, key: &str, error_if_not_found: bool) -> Result<GameplayTag, TagError> {
        let normalized = key.trim().to_ascii_lowercase();
        let probe = GameplayTag::from_normalized(&normalized);
        if self.nodes.contains_key(&probe) {
            Ok(probe)
        } else if error_if_not_found {
            Err(TagError::NotRegistered(key.to_string()))
        } else {
            Ok(GameplayTag::none())
        }
    }

    /// Looks up several keys at once into a container, with the same
    /// error behavior as [`TagRegistry::request_tag`]. Sentinel results
    /// in tolerant mode are dropped from the container.
    pub fn request_tag_container<I, S>(
        &self,
        keys: I,
        error_if_not_found: bool,
    ) -> Result<TagContainer, TagError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut container = TagContainer::new();
        for key in keys {
            let tag = self.request_tag(key.as_ref(), error_if_not_found)?;
            if tag.is_valid() {
                container.add_tag(tag);
            }
        }
        Ok(container)
    }

    /// True when the key names a registered node (explicit or implicit).
    pub fn is_registered(&self, key: &str) -> bool {
        let normalized = key.trim().to_ascii_lowercase();
        self.nodes
            .contains_key(&GameplayTag::from_normalized(&normalized))
    }

    /// The precomputed container holding `tag` and all of its ancestors.
    pub fn single_tag_container(&self, tag: &GameplayTag) -> Option<&TagContainer> {
        self.nodes.get(tag).map(|node| &node.single_tag_container)
    }

    /// The registered parent of `tag`, if it has one.
    pub fn parent_of(&self, tag: &GameplayTag) -> Option<&GameplayTag> {
        self.nodes.get(tag).and_then(|node| node.parent.as_ref())
    }

    /// The deterministic wire index of `tag`.
    pub fn net_index_of(&self, tag: &GameplayTag) -> Option<u16> {
        self.nodes.get(tag).map(|node| node.net_index)
    }

    /// Resolves a wire index back to its tag.
    pub fn tag_from_net_index(&self, index: u16) -> Option<&GameplayTag> {
        self.by_net_index.get(index as usize)
    }

    /// Sentinel index marking "invalid/unknown" on the wire.
    pub fn invalid_net_index(&self) -> u16 {
        self.by_net_index.len() as u16 + 1
    }

    /// Number of registered nodes, implicit ancestors included.
    pub fn tag_count(&self) -> usize {
        self.by_net_index.len()
    }

    /// Bit budget for the serialized container count.
    pub fn container_size_bits(&self) -> u8 {
        self.container_size_bits
    }

    /// Largest tag count a serialized container may carry.
    pub fn max_container_size(&self) -> usize {
        (1usize << self.container_size_bits) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TagRegistry {
        TagRegistry::new(["enemy.undead.zombie", "enemy.beast", "color.red"]).unwrap()
    }

    #[test]
    fn implicit_ancestors_are_registered() {
        let registry = registry();

        assert!(registry.is_registered("enemy"));
        assert!(registry.is_registered("enemy.undead"));
        assert!(registry.is_registered("color"));
        assert_eq!(registry.tag_count(), 7);
    }

    #[test]
    fn net_indices_are_sorted_by_full_key() {
        let registry = registry();
        let keys: Vec<_> = (0..registry.tag_count() as u16)
            .map(|i| registry.tag_from_net_index(i).unwrap().key().to_string())
            .collect();

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(registry.invalid_net_index(), 8);
    }

    #[test]
    fn request_is_case_insensitive_and_trimmed() {
        let registry = registry();

        let tag = registry.request_tag("  Enemy.Undead ", true).unwrap();
        assert_eq!(tag.key(), "enemy.undead");
    }

    #[test]
    fn missing_key_behavior_is_caller_selected() {
        let registry = registry();

        assert_eq!(
            registry.request_tag("no.such.tag", true),
            Err(TagError::NotRegistered("no.such.tag".to_string()))
        );
        let sentinel = registry.request_tag("no.such.tag", false).unwrap();
        assert!(!sentinel.is_valid());
    }

    #[test]
    fn invalid_keys_reject_construction() {
        assert!(TagRegistry::new(["bad key"]).is_err());
        assert!(TagRegistry::new(["trailing."]).is_err());
        assert!(TagRegistry::new([".leading"]).is_err());
        assert!(TagRegistry::new(["a,b"]).is_err());
        assert!(TagRegistry::new(["a\\b"]).is_err());
        assert!(TagRegistry::new(["a..b"]).is_err());
        assert!(TagRegistry::new([""]).is_err());
    }

    #[test]
    fn validation_produces_fixed_string() {
        let validation = validate_tag_key(" Enemy Undead,Zombie. ");

        assert!(!validation.is_valid);
        assert!(validation.error.is_some());
        assert_eq!(validation.fixed, "enemy_undead_zombie");
    }

    #[test]
    fn single_tag_container_carries_ancestors() {
        let registry = registry();
        let zombie = registry.request_tag("enemy.undead.zombie", true).unwrap();
        let enemy = registry.request_tag("enemy", true).unwrap();

        let single = registry.single_tag_container(&zombie).unwrap();
        assert!(single.has_tag_exact(&zombie));
        assert!(single.has_tag(&enemy));
    }
}
