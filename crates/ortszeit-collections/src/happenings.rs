//! The Happening collection: events at a location, hosted by artists,
//! registered on the timeline index.

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::debug;

use ortszeit_core::types::{Label, Link, PropMap, Relation};
use ortszeit_core::DomainError;
use ortszeit_graph::{Repository, Result, Timeline};

use crate::{embed_children, entity_list, validate};

pub struct Happenings {
    repo: Repository,
    timeline: Timeline,
}

impl Happenings {
    pub fn new(repo: Repository, timeline: Timeline) -> Self {
        Self { repo, timeline }
    }

    /// Create a happening: the entity itself, `HAPPENS_AT` its location,
    /// `HOSTS` each artist, and `ACTIVE_DURING` a fresh timespan on the
    /// timeline.
    ///
    /// All validation runs before the first store call. The relationship
    /// fan-out is sequential, not one atomic unit: a mid-sequence
    /// failure surfaces its error and can leave a happening with partial
    /// wiring.
    pub async fn create(
        &self,
        start: NaiveDateTime,
        stop: NaiveDateTime,
        props: &PropMap,
        location_ref: &PropMap,
        artist_refs: &[PropMap],
        links: &[Link],
    ) -> Result<PropMap> {
        if start >= stop {
            return Err(DomainError::InvalidRange { start, stop }.into());
        }
        validate::require_keys("props", props, &["name"])?;
        let location_slug = validate::require_ref("location", location_ref, Label::Location)?;
        let artist_slugs = artist_refs
            .iter()
            .map(|r| validate::require_ref("artists", r, Label::Artist))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let location = self.repo.get(Label::Location, &location_slug).await?;
        let mut artists = Vec::with_capacity(artist_slugs.len());
        for slug in &artist_slugs {
            artists.push(self.repo.get(Label::Artist, slug).await?);
        }

        let happening = self.repo.create(Label::Happening, props, links).await?;
        self.repo
            .create_connection(&happening, Relation::HappensAt, &location)
            .await?;
        for artist in &artists {
            self.repo
                .create_connection(&happening, Relation::Hosts, artist)
                .await?;
        }

        let timespan = self.timeline.create_timespan(start, stop).await?;
        self.timeline
            .link_active_during(&happening.slug, &timespan)
            .await?;
        debug!(slug = %happening.slug, artists = artists.len(), "created happening");

        let mut map = happening.to_value();
        map.insert(
            Relation::HappensAt.join_key().to_string(),
            Value::Object(location.to_value()),
        );
        map.insert(Relation::Hosts.join_key().to_string(), entity_list(&artists));
        map.insert(
            Relation::ActiveDuring.join_key().to_string(),
            Value::Object(timespan.to_value()),
        );
        Ok(map)
    }

    /// A happening with its default joins: `links`, `location`,
    /// `artists`, and `time`.
    pub async fn get(&self, slug: &str) -> Result<PropMap> {
        let (happening, links) = self
            .repo
            .get_joined(Label::Happening, slug, Relation::IdentifiedBy)
            .await?;
        let (_, locations) = self
            .repo
            .get_joined(Label::Happening, slug, Relation::HappensAt)
            .await?;
        let (_, artists) = self
            .repo
            .get_joined(Label::Happening, slug, Relation::Hosts)
            .await?;
        let (_, times) = self
            .repo
            .get_joined(Label::Happening, slug, Relation::ActiveDuring)
            .await?;

        let mut map = happening.to_value();
        embed_children(&mut map, Relation::IdentifiedBy, links, slug)?;
        embed_children(&mut map, Relation::HappensAt, locations, slug)?;
        embed_children(&mut map, Relation::Hosts, artists, slug)?;
        embed_children(&mut map, Relation::ActiveDuring, times, slug)?;
        Ok(map)
    }

    /// Resolve a happening through one of its link URLs.
    pub async fn by_url(&self, url: &str) -> Result<PropMap> {
        let happening = self.repo.get_by_url(url, Label::Happening).await?;
        self.get(&happening.slug).await
    }

    pub async fn list(&self) -> Result<Vec<PropMap>> {
        let happenings = self.repo.list_all(Label::Happening).await?;
        Ok(happenings.iter().map(|h| h.to_value()).collect())
    }

    /// Distinct happenings overlapping `[start, stop]`, each with its
    /// location and timespan embedded.
    pub async fn overlapping(
        &self,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Vec<PropMap>> {
        self.timeline.happenings_overlapping(start, stop).await
    }
}
