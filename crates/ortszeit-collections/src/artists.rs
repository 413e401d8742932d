//! The Artist collection.

use ortszeit_core::types::{Label, Link, PropMap, Relation};
use ortszeit_graph::{Repository, Result};

use crate::{embed_children, validate};

pub struct Artists {
    repo: Repository,
}

impl Artists {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Create an artist. `props` requires `name`.
    pub async fn create(&self, props: &PropMap, links: &[Link]) -> Result<PropMap> {
        validate::require_keys("props", props, &["name"])?;
        let artist = self.repo.create(Label::Artist, props, links).await?;
        Ok(artist.to_value())
    }

    /// An artist with its default join: `links`.
    pub async fn get(&self, slug: &str) -> Result<PropMap> {
        let (artist, links) = self
            .repo
            .get_joined(Label::Artist, slug, Relation::IdentifiedBy)
            .await?;

        let mut map = artist.to_value();
        embed_children(&mut map, Relation::IdentifiedBy, links, slug)?;
        Ok(map)
    }

    /// Resolve an artist through one of its link URLs.
    pub async fn by_url(&self, url: &str) -> Result<PropMap> {
        let artist = self.repo.get_by_url(url, Label::Artist).await?;
        self.get(&artist.slug).await
    }

    pub async fn list(&self) -> Result<Vec<PropMap>> {
        let artists = self.repo.list_all(Label::Artist).await?;
        Ok(artists.iter().map(|a| a.to_value()).collect())
    }
}
