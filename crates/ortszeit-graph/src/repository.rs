//! Generic entity repository: create/get/list/link for sluggable nodes.
//!
//! Every operation round-trips the store; nothing is cached between
//! calls. Property values are stored as strings, and entity identity is
//! `(label, slug)` with the slug derived from `name` at creation time.

use neo4rs::{query, Query};
use serde_json::Value;
use tracing::{debug, warn};

use ortszeit_core::slug::{slugify, slugify_with_context};
use ortszeit_core::types::{Entity, Label, Link, PropMap, Relation};
use ortszeit_core::DomainError;

use crate::client::{GraphClient, RepoError, Result};

/// Repository over a shared graph client. Clone is cheap.
#[derive(Clone)]
pub struct Repository {
    client: GraphClient,
}

impl Repository {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    /// Declare the uniqueness constraints entity identity relies on:
    /// per-label slugs and globally unique link URLs. Idempotent.
    pub async fn ensure_schema(&self) -> Result<()> {
        for label in [Label::Location, Label::Artist, Label::Work, Label::Happening] {
            self.client.ensure_unique_constraint(label, "slug").await?;
        }
        self.client.ensure_unique_constraint(Label::Uri, "url").await
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Get an entity by its slug.
    pub async fn get(&self, label: Label, slug: &str) -> Result<Entity> {
        let cypher = format!("MATCH (n:{label} {{slug: $slug}}) RETURN n");
        let q = query(&cypher).param("slug", slug.to_string());

        match self.client.query_one(q).await? {
            Some(row) => node_from_row(&row, "n"),
            None => Err(RepoError::NotFound {
                label,
                lookup: slug.to_string(),
            }),
        }
    }

    /// Get the single entity whose `key` property equals `value`.
    pub async fn get_by_property(&self, label: Label, key: &str, value: &str) -> Result<Entity> {
        check_identifier(key)?;
        let cypher = format!("MATCH (n:{label} {{{key}: $value}}) RETURN n");
        let rows = self
            .client
            .query_rows(query(&cypher).param("value", value.to_string()))
            .await?;

        match rows.len() {
            0 => Err(RepoError::NotFound {
                label,
                lookup: format!("{key} = {value}"),
            }),
            1 => node_from_row(&rows[0], "n"),
            count => Err(RepoError::Ambiguous {
                label,
                property: key.to_string(),
                value: value.to_string(),
                count,
            }),
        }
    }

    /// Resolve an entity through the URI node its link points at.
    ///
    /// The `IDENTIFIED_BY` edge always runs entity → URI, so the match
    /// is direction-agnostic here.
    pub async fn get_by_url(&self, url: &str, label: Label) -> Result<Entity> {
        let cypher = format!("MATCH (:URI {{url: $url}})-[:IDENTIFIED_BY]-(n:{label}) RETURN n");
        let rows = self
            .client
            .query_rows(query(&cypher).param("url", url.to_string()))
            .await?;

        match rows.len() {
            0 => Err(RepoError::NotFound {
                label,
                lookup: format!("url = {url}"),
            }),
            1 => node_from_row(&rows[0], "n"),
            count => Err(RepoError::Ambiguous {
                label,
                property: "url".to_string(),
                value: url.to_string(),
                count,
            }),
        }
    }

    /// All entities of a label, in one streamed round-trip.
    pub async fn list_all(&self, label: Label) -> Result<Vec<Entity>> {
        let cypher = format!("MATCH (n:{label}) RETURN n");
        let rows = self.client.query_rows(query(&cypher)).await?;
        rows.iter().map(|row| node_from_row(row, "n")).collect()
    }

    /// Parent entity plus all children over one relation, matched
    /// without regard to edge direction. Always a list; pair with
    /// [`Repository::expect_one`] for cardinality-one relations.
    pub async fn get_joined(
        &self,
        label: Label,
        slug: &str,
        relation: Relation,
    ) -> Result<(Entity, Vec<Entity>)> {
        let parent = self.get(label, slug).await?;
        let child_label = joined_child_label(label, relation)?;

        let cypher = format!(
            "MATCH (n:{label} {{slug: $slug}})-[:{rel}]-(m:{child}) RETURN m",
            rel = relation.as_type(),
            child = child_label,
        );
        let rows = self
            .client
            .query_rows(query(&cypher).param("slug", slug.to_string()))
            .await?;
        let children = rows
            .iter()
            .map(|row| node_from_row(row, "m"))
            .collect::<Result<Vec<_>>>()?;

        Ok((parent, children))
    }

    /// Collapse a joined child list down to exactly one entity.
    pub fn expect_one(children: Vec<Entity>, label: Label, lookup: &str) -> Result<Entity> {
        let count = children.len();
        let mut iter = children.into_iter();
        match (iter.next(), iter.next()) {
            (Some(only), None) => Ok(only),
            (None, _) => Err(RepoError::NotFound {
                label,
                lookup: lookup.to_string(),
            }),
            _ => Err(RepoError::Ambiguous {
                label,
                property: "relation".to_string(),
                value: lookup.to_string(),
                count,
            }),
        }
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Create an entity with links attached, as one transaction.
    ///
    /// The slug is derived from `name`. If another node of the label
    /// already owns it, creation is retried exactly once with the
    /// context-hashed slug; a second collision surfaces as
    /// [`RepoError::ConstraintRace`].
    pub async fn create(&self, label: Label, props: &PropMap, links: &[Link]) -> Result<Entity> {
        if !label.is_sluggable() {
            return Err(RepoError::Malformed(format!(
                "{label} nodes carry no slug and cannot be created here"
            )));
        }
        let name = props
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::missing_key("props", "name"))?;

        let plain = slugify(name);
        match self.try_create(label, &plain, props, links).await {
            Err(e) if e.is_unique_violation() => {
                let fallback = slugify_with_context(name, props);
                warn!(%label, slug = %plain, retry = %fallback, "slug taken, retrying with context hash");
                self.try_create(label, &fallback, props, links)
                    .await
                    .map_err(|retry_err| {
                        if retry_err.is_unique_violation() {
                            RepoError::ConstraintRace {
                                label,
                                property: "slug".to_string(),
                                value: fallback.clone(),
                            }
                        } else {
                            retry_err
                        }
                    })
            }
            other => other,
        }
    }

    async fn try_create(
        &self,
        label: Label,
        slug: &str,
        props: &PropMap,
        links: &[Link],
    ) -> Result<Entity> {
        let mut stored = stringify_props(props)?;
        stored.insert("slug".to_string(), Value::String(slug.to_string()));

        let mut statements = Vec::with_capacity(1 + links.len());
        statements.push(create_node_query(label, &stored));
        for link in links {
            let cypher = format!(
                "MATCH (n:{label} {{slug: $slug}})
                 MERGE (u:URI {{url: $url}})
                 ON CREATE SET u.name = $name
                 CREATE (n)-[:IDENTIFIED_BY]->(u)"
            );
            statements.push(
                query(&cypher)
                    .param("slug", slug.to_string())
                    .param("url", link.url.clone())
                    .param("name", link.name.clone()),
            );
        }

        self.client.run_all(statements).await?;
        debug!(%label, %slug, links = links.len(), "created entity");
        Ok(Entity::new(label, slug, stored))
    }

    /// Create a child node owned by `parent` and wire the relation, as
    /// one statement. Used for sub-entities that are not independently
    /// addressable (no slug), like a location's address.
    pub async fn create_embedded(
        &self,
        parent: &Entity,
        relation: Relation,
        props: &PropMap,
    ) -> Result<Entity> {
        let child_label = relation.target();
        let stored = stringify_props(props)?;
        let assignments = assignments_for("m", &stored);

        let cypher = format!(
            "MATCH (n:{parent} {{slug: $slug}})
             CREATE (m:{child}){set}
             CREATE (n)-[:{rel}]->(m)
             RETURN m",
            parent = parent.label,
            child = child_label,
            set = if assignments.is_empty() {
                String::new()
            } else {
                format!(" SET {assignments}")
            },
            rel = relation.as_type(),
        );
        let mut q = query(&cypher).param("slug", parent.slug.clone());
        for (i, value) in stored.values().enumerate() {
            q = q.param(&format!("p{i}"), prop_string(value));
        }

        match self.client.query_one(q).await? {
            Some(row) => node_from_row(&row, "m"),
            None => Err(RepoError::NotFound {
                label: parent.label,
                lookup: parent.slug.clone(),
            }),
        }
    }

    /// Connect two existing entities. Fails with `NotFound` naming the
    /// missing side if either slug no longer resolves.
    pub async fn create_connection(
        &self,
        from: &Entity,
        relation: Relation,
        to: &Entity,
    ) -> Result<()> {
        if !relation.sources().contains(&from.label) || relation.target() != to.label {
            return Err(RepoError::Malformed(format!(
                "{relation} cannot connect {} to {}",
                from.label, to.label
            )));
        }

        let cypher = format!(
            "MATCH (a:{from_label} {{slug: $from}})
             MATCH (b:{to_label} {{slug: $to}})
             CREATE (a)-[r:{rel}]->(b)
             RETURN count(r) AS created",
            from_label = from.label,
            to_label = to.label,
            rel = relation.as_type(),
        );
        let q = query(&cypher)
            .param("from", from.slug.clone())
            .param("to", to.slug.clone());

        let created = match self.client.query_one(q).await? {
            Some(row) => row.get::<i64>("created").unwrap_or(0),
            None => 0,
        };
        if created == 0 {
            // No edge means one endpoint is gone; look both up to name it.
            self.get(from.label, &from.slug).await?;
            self.get(to.label, &to.slug).await?;
            return Err(RepoError::Malformed(format!(
                "no {relation} edge created between {} and {}",
                from.slug, to.slug
            )));
        }
        debug!(rel = %relation, from = %from.slug, to = %to.slug, "connected entities");
        Ok(())
    }
}

// ── Marshaling ───────────────────────────────────────────────────

/// Read the named node column of a row into an [`Entity`].
pub(crate) fn node_from_row(row: &neo4rs::Row, column: &str) -> Result<Entity> {
    let node: neo4rs::Node = row
        .get(column)
        .map_err(|e| RepoError::Malformed(format!("failed to read node '{column}': {e}")))?;
    node_to_entity(&node)
}

/// Flatten a store node into an [`Entity`].
///
/// Non-sluggable labels (Address, URI, Timespan, Hour) yield an empty
/// slug.
pub(crate) fn node_to_entity(node: &neo4rs::Node) -> Result<Entity> {
    let labels = node.labels();
    let label: Label = labels
        .first()
        .ok_or_else(|| RepoError::Malformed("node without label".to_string()))?
        .parse()
        .map_err(RepoError::Malformed)?;

    let mut props = PropMap::new();
    for key in node.keys() {
        if let Ok(value) = node.get::<String>(key) {
            props.insert(key.to_string(), Value::String(value));
        }
    }
    let slug = props
        .get("slug")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(Entity::new(label, slug, props))
}

/// Store form of a property value. Everything is persisted as a string.
fn prop_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Validate keys and stringify values for storage.
fn stringify_props(props: &PropMap) -> Result<PropMap> {
    let mut stored = PropMap::new();
    for (key, value) in props {
        check_identifier(key)?;
        stored.insert(key.clone(), Value::String(prop_string(value)));
    }
    Ok(stored)
}

/// Property keys are interpolated into cypher, so they must stay plain
/// identifiers.
fn check_identifier(key: &str) -> Result<()> {
    let head_ok = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(RepoError::Malformed(format!("invalid property key: {key:?}")))
    }
}

fn assignments_for(var: &str, stored: &PropMap) -> String {
    stored
        .keys()
        .enumerate()
        .map(|(i, key)| format!("{var}.{key} = $p{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn create_node_query(label: Label, stored: &PropMap) -> Query {
    let cypher = format!(
        "CREATE (n:{label}) SET {}",
        assignments_for("n", stored)
    );
    let mut q = query(&cypher);
    for (i, value) in stored.values().enumerate() {
        q = q.param(&format!("p{i}"), prop_string(value));
    }
    q
}

/// Which label sits on the far end of a join from `label`.
fn joined_child_label(label: Label, relation: Relation) -> Result<Label> {
    if relation.sources().contains(&label) {
        Ok(relation.target())
    } else if relation.target() == label {
        relation
            .sources()
            .first()
            .copied()
            .ok_or_else(|| RepoError::Malformed(format!("{relation} has no source labels")))
    } else {
        Err(RepoError::Malformed(format!(
            "{label} does not participate in {relation}"
        )))
    }
}
