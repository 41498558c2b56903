//! Hierarchical gameplay tag system.
//!
//! Tags are interned dotted identifiers ("enemy.undead.zombie") with a
//! construct-once registry, set-algebra containers that cache the
//! ancestor closure, a byte-coded query language, and a compact wire
//! codec keyed on deterministic net indices.

pub mod container;
pub mod query;
pub mod registry;
pub mod serialization;
pub mod tag;

pub use container::TagContainer;
pub use query::{TagQuery, TagQueryExpression};
pub use registry::{
    DEFAULT_CONTAINER_SIZE_BITS, TagKeyValidation, TagRegistry, fix_tag_key, validate_tag_key,
};
pub use tag::GameplayTag;
