//! ortszeit-graph — Neo4j access for the ortszeit event graph.
//!
//! This crate is the single store-access point: the connection-pooled
//! [`GraphClient`], the generic entity [`Repository`], and the hour-chain
//! [`Timeline`] index all live here so every read and write goes through
//! one consistent marshaling and error surface.

pub mod client;
pub mod repository;
pub mod timeline;

pub use client::{GraphClient, GraphConfig, RepoError, Result};
pub use repository::Repository;
pub use timeline::{Timeline, Timespan};
