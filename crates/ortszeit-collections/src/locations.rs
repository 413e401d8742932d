//! The Location collection: venues with an embedded address.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde_json::Value;

use ortszeit_core::types::{Label, Link, PropMap, Relation};
use ortszeit_graph::{Repository, Result, Timeline};

use crate::{embed_children, validate};

pub struct Locations {
    repo: Repository,
    timeline: Timeline,
}

impl Locations {
    pub fn new(repo: Repository, timeline: Timeline) -> Self {
        Self { repo, timeline }
    }

    /// Create a location with its address, wired `LOCATED_AT`.
    ///
    /// `props` requires `name`; `address` requires `lat`, `lon`, and
    /// `string`.
    pub async fn create(
        &self,
        props: &PropMap,
        address: &PropMap,
        links: &[Link],
    ) -> Result<PropMap> {
        validate::require_keys("props", props, &["name"])?;
        validate::require_keys("address", address, &["lat", "lon", "string"])?;

        let location = self.repo.create(Label::Location, props, links).await?;
        let addr = self
            .repo
            .create_embedded(&location, Relation::LocatedAt, address)
            .await?;

        let mut map = location.to_value();
        map.insert(
            Relation::LocatedAt.join_key().to_string(),
            Value::Object(addr.to_value()),
        );
        Ok(map)
    }

    /// A location with its default joins: `links` and `address`.
    pub async fn get(&self, slug: &str) -> Result<PropMap> {
        let (location, links) = self
            .repo
            .get_joined(Label::Location, slug, Relation::IdentifiedBy)
            .await?;
        let (_, addresses) = self
            .repo
            .get_joined(Label::Location, slug, Relation::LocatedAt)
            .await?;

        let mut map = location.to_value();
        embed_children(&mut map, Relation::IdentifiedBy, links, slug)?;
        embed_children(&mut map, Relation::LocatedAt, addresses, slug)?;
        Ok(map)
    }

    /// Resolve a location through one of its link URLs.
    pub async fn by_url(&self, url: &str) -> Result<PropMap> {
        let location = self.repo.get_by_url(url, Label::Location).await?;
        self.get(&location.slug).await
    }

    pub async fn list(&self) -> Result<Vec<PropMap>> {
        let locations = self.repo.list_all(Label::Location).await?;
        Ok(locations.iter().map(|l| l.to_value()).collect())
    }

    /// Locations hosting at least one happening that overlaps
    /// `[start, stop]`, distinct by slug.
    pub async fn active_during(
        &self,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Vec<PropMap>> {
        let happenings = self.timeline.happenings_overlapping(start, stop).await?;

        let mut seen = HashSet::new();
        let mut active = Vec::new();
        for happening in happenings {
            let Some(Value::Object(location)) = happening.get(Relation::HappensAt.join_key())
            else {
                continue;
            };
            let Some(slug) = location.get("slug").and_then(Value::as_str) else {
                continue;
            };
            if seen.insert(slug.to_string()) {
                active.push(location.clone());
            }
        }
        Ok(active)
    }
}
