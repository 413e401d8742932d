//! ortszeit-collections — typed domain collections over the repository.
//!
//! Each collection validates its inputs declaratively before any store
//! round-trip, then drives the generic repository (and, for happenings,
//! the timeline index) to materialize nodes and relationships. Reads
//! come back as denormalized property maps with a reserved `_label` key
//! and one reserved key per joined relation.

pub mod artists;
pub mod happenings;
pub mod locations;
mod validate;
pub mod works;

use ortszeit_graph::{GraphClient, Repository, Result, Timeline};
use serde_json::Value;

use ortszeit_core::types::{Cardinality, Entity, PropMap, Relation};

pub use artists::Artists;
pub use happenings::Happenings;
pub use locations::Locations;
pub use works::Works;

/// All four collections over one store connection.
pub struct Collections {
    pub locations: Locations,
    pub artists: Artists,
    pub works: Works,
    pub happenings: Happenings,
}

impl Collections {
    /// Build the collections, declaring schema constraints and the
    /// timeline singleton if the store has never seen them.
    pub async fn attach(client: GraphClient) -> Result<Self> {
        let repo = Repository::new(client.clone());
        repo.ensure_schema().await?;
        let timeline = Timeline::attach(client).await?;

        Ok(Self {
            locations: Locations::new(repo.clone(), timeline.clone()),
            artists: Artists::new(repo.clone()),
            works: Works::new(repo.clone()),
            happenings: Happenings::new(repo, timeline),
        })
    }
}

/// Embed a list of joined entities as an array of external maps.
pub(crate) fn entity_list(entities: &[Entity]) -> Value {
    Value::Array(
        entities
            .iter()
            .map(|e| Value::Object(e.to_value()))
            .collect(),
    )
}

/// Embed joined children under the relation's reserved key: a single
/// nested map for cardinality-one relations (exactly one child must
/// exist), a list for many relations.
pub(crate) fn embed_children(
    map: &mut PropMap,
    relation: Relation,
    children: Vec<Entity>,
    parent_slug: &str,
) -> Result<()> {
    let key = relation.join_key().to_string();
    match relation.cardinality() {
        Cardinality::Many => {
            map.insert(key, entity_list(&children));
        }
        Cardinality::One => {
            let child = Repository::expect_one(children, relation.target(), parent_slug)?;
            map.insert(key, Value::Object(child.to_value()));
        }
    }
    Ok(())
}
