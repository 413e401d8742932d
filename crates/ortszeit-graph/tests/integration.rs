//! Integration tests for ortszeit-graph against a live Neo4j instance.
//!
//! These tests clear the whole database between cases, so point them at
//! a dedicated dev store and run them single-threaded:
//! cargo test --package ortszeit-graph --test integration -- --ignored --test-threads=1
//!
//! Skipped automatically if Neo4j is not available.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};

use ortszeit_core::types::{Label, Link, PropMap, Relation};
use ortszeit_graph::{GraphClient, GraphConfig, RepoError, Repository, Timeline};

async fn connect_or_skip() -> Option<GraphClient> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let config = GraphConfig::default();
    match GraphClient::connect(&config).await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test (Neo4j not available): {e}");
            None
        }
    }
}

async fn clean_repo(client: &GraphClient) -> Repository {
    let q = neo4rs::query("MATCH (n) DETACH DELETE n");
    client.run(q).await.unwrap();
    let repo = Repository::new(client.clone());
    repo.ensure_schema().await.unwrap();
    repo
}

fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .unwrap()
        .and_hms_opt(h, mi, 0)
        .unwrap()
}

fn props(pairs: &[(&str, &str)]) -> PropMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

fn sample_links() -> Vec<Link> {
    vec![
        Link::new("SomeRel", "http://someurl.com"),
        Link::new("OtherRel", "http://otherurl.com"),
    ]
}

async fn hour_starts(client: &GraphClient) -> Vec<String> {
    let rows = client
        .query_rows(neo4rs::query(
            "MATCH (h:Hour) RETURN h.start AS start ORDER BY start",
        ))
        .await
        .unwrap();
    rows.iter()
        .map(|r| r.get::<String>("start").unwrap())
        .collect()
}

async fn next_edges(client: &GraphClient) -> Vec<(String, String)> {
    let rows = client
        .query_rows(neo4rs::query(
            "MATCH (a:Hour)-[:NEXT]->(b:Hour)
             RETURN a.start AS a, b.start AS b ORDER BY a",
        ))
        .await
        .unwrap();
    rows.iter()
        .map(|r| (r.get::<String>("a").unwrap(), r.get::<String>("b").unwrap()))
        .collect()
}

async fn overlap_targets(client: &GraphClient, start: &str) -> Vec<String> {
    let rows = client
        .query_rows(
            neo4rs::query(
                "MATCH (t:Timespan {start: $start})-[:OVERLAPS]->(h:Hour)
                 RETURN h.start AS hour ORDER BY hour",
            )
            .param("start", start.to_string()),
        )
        .await
        .unwrap();
    rows.iter().map(|r| r.get::<String>("hour").unwrap()).collect()
}

// ── Repository ───────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn create_and_get_roundtrip() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let repo = clean_repo(&client).await;

    let created = repo
        .create(
            Label::Location,
            &props(&[("name", "Kater Holzig")]),
            &sample_links(),
        )
        .await
        .unwrap();
    assert_eq!(created.slug, "kater-holzig");
    assert_eq!(created.name(), Some("Kater Holzig"));

    let fetched = repo.get(Label::Location, "kater-holzig").await.unwrap();
    assert_eq!(fetched.slug, created.slug);
    assert_eq!(fetched.prop("name"), created.prop("name"));
    assert_eq!(fetched.label, Label::Location);
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn get_miss_is_not_found() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let repo = clean_repo(&client).await;

    let err = repo.get(Label::Artist, "nobody").await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound { label: Label::Artist, .. }));
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn colliding_create_appends_context_hash() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let repo = clean_repo(&client).await;

    let first = repo
        .create(
            Label::Location,
            &props(&[("name", "Kater Holzig"), ("city", "Berlin")]),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(first.slug, "kater-holzig");

    let second = repo
        .create(
            Label::Location,
            &props(&[("name", "Kater Holzig"), ("city", "Hamburg")]),
            &[],
        )
        .await
        .unwrap();
    assert!(second.slug.starts_with("kater-holzig-"));
    let suffix = second.slug.rsplit('-').next().unwrap();
    assert_eq!(suffix.len(), 10);
    assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));

    // Identical name and context collides again and surfaces as a race.
    let third = repo
        .create(
            Label::Location,
            &props(&[("name", "Kater Holzig"), ("city", "Hamburg")]),
            &[],
        )
        .await;
    assert!(matches!(third, Err(RepoError::ConstraintRace { .. })));
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn get_by_property_distinguishes_miss_and_ambiguity() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let repo = clean_repo(&client).await;

    repo.create(
        Label::Artist,
        &props(&[("name", "DJ1"), ("genre", "techno")]),
        &[],
    )
    .await
    .unwrap();
    repo.create(
        Label::Artist,
        &props(&[("name", "DJ2"), ("genre", "techno")]),
        &[],
    )
    .await
    .unwrap();

    let one = repo
        .get_by_property(Label::Artist, "name", "DJ1")
        .await
        .unwrap();
    assert_eq!(one.slug, "dj1");

    let none = repo.get_by_property(Label::Artist, "name", "DJ9").await;
    assert!(matches!(none, Err(RepoError::NotFound { .. })));

    let many = repo.get_by_property(Label::Artist, "genre", "techno").await;
    assert!(matches!(many, Err(RepoError::Ambiguous { count: 2, .. })));
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn url_lookup_resolves_link_owner() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let repo = clean_repo(&client).await;

    repo.create(Label::Artist, &props(&[("name", "DJ1")]), &sample_links())
        .await
        .unwrap();

    let artist = repo
        .get_by_url("http://otherurl.com", Label::Artist)
        .await
        .unwrap();
    assert_eq!(artist.slug, "dj1");

    let miss = repo.get_by_url("http://nowhere.example", Label::Artist).await;
    assert!(matches!(miss, Err(RepoError::NotFound { .. })));
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn list_all_streams_every_entity() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let repo = clean_repo(&client).await;

    for name in ["DJ1", "DJ2", "DJ3"] {
        repo.create(Label::Artist, &props(&[("name", name)]), &[])
            .await
            .unwrap();
    }

    let mut slugs: Vec<String> = repo
        .list_all(Label::Artist)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.slug)
        .collect();
    slugs.sort();
    assert_eq!(slugs, vec!["dj1", "dj2", "dj3"]);
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn connection_requires_both_endpoints() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let repo = clean_repo(&client).await;

    let work = repo
        .create(Label::Work, &props(&[("name", "Some Track")]), &[])
        .await
        .unwrap();
    let mut ghost = work.clone();
    ghost.label = Label::Artist;
    ghost.slug = "ghost".to_string();

    let err = repo
        .create_connection(&work, Relation::MadeBy, &ghost)
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound { label: Label::Artist, .. }));
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn joined_children_come_back_as_list() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    let repo = clean_repo(&client).await;

    repo.create(Label::Artist, &props(&[("name", "DJ1")]), &sample_links())
        .await
        .unwrap();

    let (artist, links) = repo
        .get_joined(Label::Artist, "dj1", Relation::IdentifiedBy)
        .await
        .unwrap();
    assert_eq!(artist.slug, "dj1");
    assert_eq!(links.len(), 2);
    let mut urls: Vec<&str> = links.iter().filter_map(|l| l.prop("url")).collect();
    urls.sort();
    assert_eq!(urls, vec!["http://otherurl.com", "http://someurl.com"]);
}

// ── Timeline ─────────────────────────────────────────────────────

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn cold_attach_has_no_pointers() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    clean_repo(&client).await;

    let timeline = Timeline::attach(client.clone()).await.unwrap();
    assert_eq!(timeline.earliest().await.unwrap(), None);
    assert_eq!(timeline.latest().await.unwrap(), None);

    // Re-attaching reuses the singleton index node.
    Timeline::attach(client.clone()).await.unwrap();
    let row = client
        .query_one(neo4rs::query("MATCH (i:HourIndex) RETURN count(i) AS cnt"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.get::<i64>("cnt").unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn first_timespan_seeds_and_covers_its_hours() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    clean_repo(&client).await;
    let timeline = Timeline::attach(client.clone()).await.unwrap();

    let ts = timeline
        .create_timespan(dt(2014, 1, 1, 18, 30), dt(2014, 1, 1, 20, 10))
        .await
        .unwrap();
    assert_eq!(ts.start, dt(2014, 1, 1, 18, 30));
    assert_eq!(ts.stop, dt(2014, 1, 1, 20, 10));

    assert_eq!(timeline.earliest().await.unwrap(), Some(dt(2014, 1, 1, 18, 0)));
    assert_eq!(timeline.latest().await.unwrap(), Some(dt(2014, 1, 1, 20, 0)));

    assert_eq!(
        hour_starts(&client).await,
        vec![
            "2014-01-01T18:00:00",
            "2014-01-01T19:00:00",
            "2014-01-01T20:00:00"
        ]
    );
    assert_eq!(
        next_edges(&client).await,
        vec![
            ("2014-01-01T18:00:00".into(), "2014-01-01T19:00:00".into()),
            ("2014-01-01T19:00:00".into(), "2014-01-01T20:00:00".into()),
        ]
    );
    assert_eq!(
        overlap_targets(&client, "2014-01-01T18:30:00").await,
        vec![
            "2014-01-01T18:00:00",
            "2014-01-01T19:00:00",
            "2014-01-01T20:00:00"
        ]
    );
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn earlier_timespan_extends_the_chain_backward() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    clean_repo(&client).await;
    let timeline = Timeline::attach(client.clone()).await.unwrap();

    // Chain starts as a single 18:00 hour.
    timeline
        .create_timespan(dt(2014, 1, 1, 18, 0), dt(2014, 1, 1, 18, 59))
        .await
        .unwrap();
    assert_eq!(
        hour_starts(&client).await,
        vec!["2014-01-01T18:00:00"]
    );

    timeline
        .create_timespan(dt(2014, 1, 1, 15, 30), dt(2014, 1, 1, 16, 10))
        .await
        .unwrap();

    assert_eq!(timeline.earliest().await.unwrap(), Some(dt(2014, 1, 1, 15, 0)));
    assert_eq!(timeline.latest().await.unwrap(), Some(dt(2014, 1, 1, 18, 0)));
    assert_eq!(
        next_edges(&client).await,
        vec![
            ("2014-01-01T15:00:00".into(), "2014-01-01T16:00:00".into()),
            ("2014-01-01T16:00:00".into(), "2014-01-01T17:00:00".into()),
            ("2014-01-01T17:00:00".into(), "2014-01-01T18:00:00".into()),
        ]
    );
    assert_eq!(
        overlap_targets(&client, "2014-01-01T15:30:00").await,
        vec!["2014-01-01T15:00:00", "2014-01-01T16:00:00"]
    );
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn timespan_inside_bounds_creates_no_hours() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    clean_repo(&client).await;
    let timeline = Timeline::attach(client.clone()).await.unwrap();

    timeline
        .create_timespan(dt(2014, 1, 1, 12, 0), dt(2014, 1, 1, 20, 0))
        .await
        .unwrap();
    let before = hour_starts(&client).await;

    timeline
        .create_timespan(dt(2014, 1, 1, 14, 30), dt(2014, 1, 1, 15, 45))
        .await
        .unwrap();
    assert_eq!(hour_starts(&client).await, before);
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn timespan_straddling_both_ends_extends_both() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    clean_repo(&client).await;
    let timeline = Timeline::attach(client.clone()).await.unwrap();

    timeline
        .create_timespan(dt(2014, 1, 1, 12, 0), dt(2014, 1, 1, 13, 0))
        .await
        .unwrap();
    timeline
        .create_timespan(dt(2014, 1, 1, 10, 15), dt(2014, 1, 1, 15, 45))
        .await
        .unwrap();

    assert_eq!(timeline.earliest().await.unwrap(), Some(dt(2014, 1, 1, 10, 0)));
    assert_eq!(timeline.latest().await.unwrap(), Some(dt(2014, 1, 1, 15, 0)));
    let edges = next_edges(&client).await;
    assert_eq!(edges.len(), 5);
    assert_eq!(
        overlap_targets(&client, "2014-01-01T10:15:00").await.len(),
        6
    );
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn degenerate_timespan_is_rejected() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    clean_repo(&client).await;
    let timeline = Timeline::attach(client.clone()).await.unwrap();

    let err = timeline
        .create_timespan(dt(2014, 1, 1, 18, 0), dt(2014, 1, 1, 18, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Domain(_)));
    assert_eq!(hour_starts(&client).await.len(), 0);
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn overlap_query_on_empty_timeline_is_empty() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    clean_repo(&client).await;
    let timeline = Timeline::attach(client.clone()).await.unwrap();

    let hits = timeline
        .happenings_overlapping(dt(2014, 1, 1, 0, 0), dt(2014, 12, 31, 0, 0))
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn overlap_query_clamps_to_chain_bounds() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    clean_repo(&client).await;
    let timeline = Timeline::attach(client.clone()).await.unwrap();

    timeline
        .create_timespan(dt(2014, 1, 1, 12, 0), dt(2014, 1, 1, 14, 0))
        .await
        .unwrap();

    // Window entirely after the chain: clamped empty.
    let hits = timeline
        .happenings_overlapping(dt(2014, 6, 1, 0, 0), dt(2014, 6, 2, 0, 0))
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn timespan_value_shape() {
    let Some(client) = connect_or_skip().await else {
        return;
    };
    clean_repo(&client).await;
    let timeline = Timeline::attach(client.clone()).await.unwrap();

    let ts = timeline
        .create_timespan(dt(2014, 1, 1, 18, 30), dt(2014, 1, 1, 20, 10))
        .await
        .unwrap();
    let map = ts.to_value();
    assert_eq!(map.get("_label"), Some(&json!("Timespan")));
    assert_eq!(map.get("start"), Some(&json!("2014-01-01T18:30:00")));
    assert_eq!(map.get("stop"), Some(&json!("2014-01-01T20:10:00")));
}
