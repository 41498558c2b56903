//! Tag-container wire codec.
//!
//! Layout: one `is_empty` byte, then for non-empty containers a count
//! byte followed by `count` little-endian `u16` net indices. The codec
//! tolerates indices the receiving registry does not know (they are
//! skipped) but rejects indices strictly beyond the registry's sentinel.

use crate::core::TagError;

use super::container::TagContainer;
use super::registry::TagRegistry;

impl TagContainer {
    /// Serializes the explicit tags of this container.
    ///
    /// Fails when the container exceeds the registry's configured count
    /// budget, or when a tag is not registered at all.
    pub fn serialize(&self, registry: &TagRegistry) -> Result<Vec<u8>, TagError> {
        if self.is_empty() {
            return Ok(vec![1]);
        }

        let max = registry.max_container_size();
        if self.len() > max {
            return Err(TagError::ContainerTooLarge {
                count: self.len(),
                max,
            });
        }

        let mut bytes = Vec::with_capacity(2 + self.len() * 2);
        bytes.push(0);
        bytes.push(self.len() as u8);
        for tag in self.iter() {
            let index = registry
                .net_index_of(tag)
                .ok_or_else(|| TagError::NotRegistered(tag.key().to_string()))?;
            bytes.extend_from_slice(&index.to_le_bytes());
        }
        Ok(bytes)
    }

    /// Deserializes a container from its wire form.
    ///
    /// Unknown net indices up to the registry's sentinel are skipped
    /// silently; indices strictly beyond it raise
    /// [`TagError::InvalidNetIndex`].
    pub fn deserialize(bytes: &[u8], registry: &TagRegistry) -> Result<TagContainer, TagError> {
        let mut cursor = bytes.iter().copied();
        let is_empty = cursor.next().ok_or(TagError::StreamTooShort)?;
        if is_empty == 1 {
            return Ok(TagContainer::new());
        }

        let count = cursor.next().ok_or(TagError::StreamTooShort)? as usize;
        let max = registry.max_container_size();
        if count > max {
            return Err(TagError::ContainerTooLarge { count, max });
        }

        let invalid = registry.invalid_net_index();
        let mut container = TagContainer::new();
        container.set_defer_parent_update(true);
        for _ in 0..count {
            let lo = cursor.next().ok_or(TagError::StreamTooShort)?;
            let hi = cursor.next().ok_or(TagError::StreamTooShort)?;
            let index = u16::from_le_bytes([lo, hi]);
            if index > invalid {
                return Err(TagError::InvalidNetIndex(index));
            }
            // Known index: resolve. Unknown-but-in-range: skip silently.
            if let Some(tag) = registry.tag_from_net_index(index) {
                container.add_tag(tag.clone());
            }
        }
        container.set_defer_parent_update(false);
        Ok(container)
    }
}
