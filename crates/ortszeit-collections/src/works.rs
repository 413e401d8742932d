//! The Work collection: pieces made by an artist.

use serde_json::Value;

use ortszeit_core::types::{Label, Link, PropMap, Relation};
use ortszeit_graph::{Repository, Result};

use crate::{embed_children, validate};

pub struct Works {
    repo: Repository,
}

impl Works {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create a work wired `MADE_BY` to an existing artist.
    ///
    /// `props` requires `name`; `artist_ref` must be an Artist
    /// reference map carrying `_label` and `slug`.
    pub async fn create(
        &self,
        props: &PropMap,
        artist_ref: &PropMap,
        links: &[Link],
    ) -> Result<PropMap> {
        validate::require_keys("props", props, &["name"])?;
        let artist_slug = validate::require_ref("artist", artist_ref, Label::Artist)?;

        let artist = self.repo.get(Label::Artist, &artist_slug).await?;
        let work = self.repo.create(Label::Work, props, links).await?;
        self.repo
            .create_connection(&work, Relation::MadeBy, &artist)
            .await?;

        let mut map = work.to_value();
        map.insert(
            Relation::MadeBy.join_key().to_string(),
            Value::Object(artist.to_value()),
        );
        Ok(map)
    }

    /// A work with its default joins: `links` and `artist`.
    pub async fn get(&self, slug: &str) -> Result<PropMap> {
        let (work, links) = self
            .repo
            .get_joined(Label::Work, slug, Relation::IdentifiedBy)
            .await?;
        let (_, artists) = self
            .repo
            .get_joined(Label::Work, slug, Relation::MadeBy)
            .await?;

        let mut map = work.to_value();
        embed_children(&mut map, Relation::IdentifiedBy, links, slug)?;
        embed_children(&mut map, Relation::MadeBy, artists, slug)?;
        Ok(map)
    }

    /// Resolve a work through one of its link URLs.
    pub async fn by_url(&self, url: &str) -> Result<PropMap> {
        let work = self.repo.get_by_url(url, Label::Work).await?;
        self.get(&work.slug).await
    }

    pub async fn list(&self) -> Result<Vec<PropMap>> {
        let works = self.repo.list_all(Label::Work).await?;
        Ok(works.iter().map(|w| w.to_value()).collect())
    }
}
