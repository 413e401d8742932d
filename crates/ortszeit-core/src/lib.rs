//! ortszeit-core: Shared domain vocabulary for the ortszeit event graph.
//!
//! This crate provides the foundational pieces used across all ortszeit
//! components:
//! - Node labels and relation kinds for the property graph
//! - Entity and link marshaling types
//! - Slug generation with collision-resistant fallback hashing
//! - Hour arithmetic for the timeline index
//! - Domain error types

pub mod error;
pub mod slug;
pub mod time;
pub mod types;

pub use error::DomainError;
pub use types::{Cardinality, Entity, Label, Link, PropMap, Relation};
