//! The hour-linked-list timeline index.
//!
//! Every calendar hour that any timespan has ever touched is one
//! canonical `Hour` node, keyed by its floored timestamp string. Hours
//! form a gap-free chain of `NEXT` edges; a singleton `HourIndex` node
//! holds `EARLIEST`/`LATEST` pointers to the chain's ends. Timespans
//! attach to every hour they overlap, which turns interval queries into
//! bounded path matches instead of full scans.

use chrono::{Duration, NaiveDateTime};
use neo4rs::{query, Query};
use serde_json::Value;
use tracing::{debug, warn};

use ortszeit_core::time::{floor_hour, fmt_dt, hour_range, parse_dt};
use ortszeit_core::types::{Label, PropMap, Relation, LABEL_KEY};
use ortszeit_core::DomainError;

use crate::client::{GraphClient, RepoError, Result};
use crate::repository::node_from_row;

/// Key property pinning the HourIndex singleton.
const INDEX_KEY: &str = "timeline";

/// A bound timespan node, handed back from [`Timeline::create_timespan`]
/// so the owner can be wired to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Timespan {
    /// Store-internal node id; timespans carry no slug.
    pub node_id: i64,
    pub start: NaiveDateTime,
    pub stop: NaiveDateTime,
}

impl Timespan {
    /// External map form, embedded under `time` in joined reads.
    pub fn to_value(&self) -> PropMap {
        let mut map = PropMap::new();
        map.insert(
            LABEL_KEY.to_string(),
            Value::String(Label::Timespan.as_str().to_string()),
        );
        map.insert("start".to_string(), Value::String(fmt_dt(self.start)));
        map.insert("stop".to_string(), Value::String(fmt_dt(self.stop)));
        map
    }
}

/// Handle on the timeline index. Clone is cheap.
///
/// Holds no pointer state: earliest/latest are re-read from the store on
/// every operation so concurrent extensions stay visible.
#[derive(Clone)]
pub struct Timeline {
    client: GraphClient,
}

impl Timeline {
    /// Attach to the timeline, creating the singleton index node and the
    /// `Hour.start` uniqueness constraint if this store has never seen
    /// one. Safe to call any number of times.
    pub async fn attach(client: GraphClient) -> Result<Self> {
        client.ensure_unique_constraint(Label::Hour, "start").await?;
        client
            .ensure_unique_constraint(Label::HourIndex, "key")
            .await?;
        client
            .run(
                query("MERGE (i:HourIndex {key: $key})")
                    .param("key", INDEX_KEY.to_string()),
            )
            .await?;
        Ok(Self { client })
    }

    // ── Pointer reads ────────────────────────────────────────────

    /// The earliest hour on the chain, if any.
    pub async fn earliest(&self) -> Result<Option<NaiveDateTime>> {
        self.pointer(Relation::Earliest).await
    }

    /// The latest hour on the chain, if any.
    pub async fn latest(&self) -> Result<Option<NaiveDateTime>> {
        self.pointer(Relation::Latest).await
    }

    async fn pointer(&self, relation: Relation) -> Result<Option<NaiveDateTime>> {
        let cypher = format!(
            "MATCH (:HourIndex {{key: $key}})-[:{rel}]->(h:Hour) RETURN h.start AS start",
            rel = relation.as_type(),
        );
        match self
            .client
            .query_one(query(&cypher).param("key", INDEX_KEY.to_string()))
            .await?
        {
            Some(row) => {
                let raw: String = row
                    .get("start")
                    .map_err(|e| RepoError::Malformed(format!("unreadable {relation} hour: {e}")))?;
                let dt = parse_dt(&raw)
                    .map_err(|e| RepoError::Malformed(format!("bad hour timestamp {raw:?}: {e}")))?;
                Ok(Some(dt))
            }
            None => Ok(None),
        }
    }

    // ── Timespan creation ────────────────────────────────────────

    /// Create a timespan node, extending the hour chain to cover it and
    /// wiring `OVERLAPS` edges to every hour it touches.
    ///
    /// A concurrent extension of the same chain end shows up as a
    /// `Hour.start` uniqueness violation; the extension is then retried
    /// once against the freshly read bounds before giving up.
    pub async fn create_timespan(
        &self,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Timespan> {
        if start >= stop {
            return Err(DomainError::InvalidRange { start, stop }.into());
        }

        match self.extend_chain(start, stop).await {
            Err(first_err) if first_err.is_unique_violation() => {
                warn!(
                    start = %fmt_dt(start),
                    stop = %fmt_dt(stop),
                    error = %first_err,
                    "hour chain extension raced, retrying against fresh bounds"
                );
                self.extend_chain(start, stop).await.map_err(|retry_err| {
                    if retry_err.is_unique_violation() {
                        RepoError::ConstraintRace {
                            label: Label::Hour,
                            property: "start".to_string(),
                            value: fmt_dt(floor_hour(start)),
                        }
                    } else {
                        retry_err
                    }
                })?;
            }
            other => other?,
        }

        self.insert_timespan(start, stop).await
    }

    /// Bring the chain to cover `[floor(start), floor(stop)]`: seed it
    /// when empty, then splice forward, then backward. A span fully
    /// inside the current bounds creates nothing.
    async fn extend_chain(&self, start: NaiveDateTime, stop: NaiveDateTime) -> Result<()> {
        let first = floor_hour(start);
        let last = floor_hour(stop);

        if self.latest().await?.is_none() {
            self.seed(first).await?;
        }
        self.append_hours(last).await?;
        self.prepend_hours(first).await?;
        Ok(())
    }

    /// First hour of an empty chain: both pointers land on it.
    async fn seed(&self, hour: NaiveDateTime) -> Result<()> {
        debug!(hour = %fmt_dt(hour), "seeding empty hour chain");
        let q = query(
            "MATCH (i:HourIndex {key: $key})
             CREATE (h:Hour {start: $start})
             CREATE (i)-[:EARLIEST]->(h)
             CREATE (i)-[:LATEST]->(h)",
        )
        .param("key", INDEX_KEY.to_string())
        .param("start", fmt_dt(hour));
        self.client.run(q).await
    }

    /// Splice new hours onto the late end up to `new_last` inclusive.
    async fn append_hours(&self, new_last: NaiveDateTime) -> Result<()> {
        let current = self.latest().await?.ok_or_else(empty_chain)?;
        if new_last <= current {
            return Ok(());
        }

        let fresh = hour_range(current + Duration::hours(1), new_last);
        debug!(from = %fmt_dt(current), to = %fmt_dt(new_last), count = fresh.len(), "appending hours");

        let mut statements: Vec<Query> = Vec::with_capacity(fresh.len() + 1);
        let mut prev = current;
        for hour in &fresh {
            statements.push(
                query(
                    "MATCH (p:Hour {start: $prev})
                     CREATE (h:Hour {start: $start})
                     CREATE (p)-[:NEXT]->(h)",
                )
                .param("prev", fmt_dt(prev))
                .param("start", fmt_dt(*hour)),
            );
            prev = *hour;
        }
        statements.push(retarget_query(Relation::Latest, new_last));
        self.client.run_all(statements).await
    }

    /// Splice new hours onto the early end down to `new_first` inclusive.
    async fn prepend_hours(&self, new_first: NaiveDateTime) -> Result<()> {
        let current = self.earliest().await?.ok_or_else(empty_chain)?;
        if new_first >= current {
            return Ok(());
        }

        let fresh = hour_range(new_first, current - Duration::hours(1));
        debug!(from = %fmt_dt(new_first), to = %fmt_dt(current), count = fresh.len(), "prepending hours");

        let mut statements: Vec<Query> = Vec::with_capacity(fresh.len() + 1);
        let mut next = current;
        for hour in fresh.iter().rev() {
            statements.push(
                query(
                    "MATCH (n:Hour {start: $next})
                     CREATE (h:Hour {start: $start})
                     CREATE (h)-[:NEXT]->(n)",
                )
                .param("next", fmt_dt(next))
                .param("start", fmt_dt(*hour)),
            );
            next = *hour;
        }
        statements.push(retarget_query(Relation::Earliest, new_first));
        self.client.run_all(statements).await
    }

    /// Create the timespan node and its `OVERLAPS` fan-out. The chain
    /// already covers the span, so every matched hour exists.
    async fn insert_timespan(
        &self,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Timespan> {
        let hours: Vec<String> = hour_range(start, stop).into_iter().map(fmt_dt).collect();
        let q = query(
            "CREATE (t:Timespan {start: $start, stop: $stop})
             WITH t
             UNWIND $hours AS hs
             MATCH (h:Hour {start: hs})
             CREATE (t)-[:OVERLAPS]->(h)
             RETURN id(t) AS tid, count(h) AS wired",
        )
        .param("start", fmt_dt(start))
        .param("stop", fmt_dt(stop))
        .param("hours", hours.clone());

        let row = self
            .client
            .query_one(q)
            .await?
            .ok_or_else(|| RepoError::Malformed("timespan creation returned no row".to_string()))?;
        let node_id: i64 = row
            .get("tid")
            .map_err(|e| RepoError::Malformed(format!("unreadable timespan id: {e}")))?;
        let wired: i64 = row.get("wired").unwrap_or(0);
        if wired != hours.len() as i64 {
            return Err(RepoError::Malformed(format!(
                "timespan overlaps {wired} hours, expected {}",
                hours.len()
            )));
        }

        debug!(start = %fmt_dt(start), stop = %fmt_dt(stop), hours = hours.len(), "created timespan");
        Ok(Timespan {
            node_id,
            start,
            stop,
        })
    }

    /// Wire a happening to its timespan. Called once per happening, at
    /// creation time.
    pub async fn link_active_during(&self, owner_slug: &str, timespan: &Timespan) -> Result<()> {
        let q = query(
            "MATCH (h:Happening {slug: $slug})
             MATCH (t:Timespan) WHERE id(t) = $tid
             CREATE (h)-[r:ACTIVE_DURING]->(t)
             RETURN count(r) AS created",
        )
        .param("slug", owner_slug.to_string())
        .param("tid", timespan.node_id);

        let created = match self.client.query_one(q).await? {
            Some(row) => row.get::<i64>("created").unwrap_or(0),
            None => 0,
        };
        if created == 0 {
            return Err(RepoError::NotFound {
                label: Label::Happening,
                lookup: owner_slug.to_string(),
            });
        }
        Ok(())
    }

    // ── Interval queries ─────────────────────────────────────────

    /// All distinct happenings whose timespan overlaps `[start, stop]`,
    /// each with its location and timespan embedded. An empty timeline
    /// or a window beyond the chain yields an empty list.
    pub async fn happenings_overlapping(
        &self,
        start: NaiveDateTime,
        stop: NaiveDateTime,
    ) -> Result<Vec<PropMap>> {
        if start >= stop {
            return Err(DomainError::InvalidRange { start, stop }.into());
        }

        let (Some(earliest), Some(latest)) = (self.earliest().await?, self.latest().await?)
        else {
            return Ok(Vec::new());
        };
        let lo = floor_hour(start).max(earliest);
        let hi = floor_hour(stop).min(latest);
        if lo > hi {
            return Ok(Vec::new());
        }

        let q = query(
            "MATCH p = (a:Hour {start: $lo})-[:NEXT*0..]->(b:Hour {start: $hi})
             UNWIND nodes(p) AS hour
             MATCH (t:Timespan)-[:OVERLAPS]->(hour)
             MATCH (h:Happening)-[:ACTIVE_DURING]->(t)
             OPTIONAL MATCH (h)-[:HAPPENS_AT]->(loc:Location)
             RETURN DISTINCT h, t, loc",
        )
        .param("lo", fmt_dt(lo))
        .param("hi", fmt_dt(hi));

        let rows = self.client.query_rows(q).await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let happening = node_from_row(row, "h")?;
            let time = node_from_row(row, "t")?;

            let mut map = happening.to_value();
            map.insert(
                Relation::ActiveDuring.join_key().to_string(),
                Value::Object(time.to_value()),
            );
            if let Ok(loc_node) = row.get::<neo4rs::Node>("loc") {
                let location = crate::repository::node_to_entity(&loc_node)?;
                map.insert(
                    Relation::HappensAt.join_key().to_string(),
                    Value::Object(location.to_value()),
                );
            }
            results.push(map);
        }
        Ok(results)
    }
}

/// Single-statement pointer retarget: the old edge dies and the new one
/// is born in the same write, so no reader sees both.
fn retarget_query(pointer: Relation, hour: NaiveDateTime) -> Query {
    let cypher = format!(
        "MATCH (i:HourIndex {{key: $key}})-[r:{rel}]->(:Hour)
         MATCH (h:Hour {{start: $start}})
         DELETE r
         CREATE (i)-[:{rel}]->(h)",
        rel = pointer.as_type(),
    );
    query(&cypher)
        .param("key", INDEX_KEY.to_string())
        .param("start", fmt_dt(hour))
}

fn empty_chain() -> RepoError {
    RepoError::Malformed("hour chain has no pointer where one was expected".to_string())
}
