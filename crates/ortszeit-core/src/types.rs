//! Core domain types for the ortszeit event graph.
//!
//! Entities are nodes in a labeled property graph, identified by
//! `(label, slug)`. Relations are typed, directed edges; each kind knows
//! its endpoints and its cardinality, so wiring code dispatches on the
//! enum instead of on string tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// String-keyed property map, the external representation of every node.
pub type PropMap = serde_json::Map<String, Value>;

/// Reserved key naming the entity's label in external maps.
pub const LABEL_KEY: &str = "_label";

// ── Labels ────────────────────────────────────────────────────────

/// The type tag of a graph node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Label {
    Location,
    Artist,
    Work,
    Happening,
    Address,
    Uri,
    Timespan,
    Hour,
    HourIndex,
}

impl Label {
    /// The store-side label string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Location => "Location",
            Label::Artist => "Artist",
            Label::Work => "Work",
            Label::Happening => "Happening",
            Label::Address => "Address",
            Label::Uri => "URI",
            Label::Timespan => "Timespan",
            Label::Hour => "Hour",
            Label::HourIndex => "HourIndex",
        }
    }

    /// Whether nodes of this label carry a per-label-unique slug.
    pub fn is_sluggable(&self) -> bool {
        matches!(
            self,
            Label::Location | Label::Artist | Label::Work | Label::Happening
        )
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Location" => Ok(Label::Location),
            "Artist" => Ok(Label::Artist),
            "Work" => Ok(Label::Work),
            "Happening" => Ok(Label::Happening),
            "Address" => Ok(Label::Address),
            "URI" => Ok(Label::Uri),
            "Timespan" => Ok(Label::Timespan),
            "Hour" => Ok(Label::Hour),
            "HourIndex" => Ok(Label::HourIndex),
            other => Err(format!("unknown label: {other}")),
        }
    }
}

// ── Relations ─────────────────────────────────────────────────────

/// How many children a relation admits, read from the parent side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// The typed, directed relationship kinds of the graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relation {
    HappensAt,
    Hosts,
    MadeBy,
    LocatedAt,
    ActiveDuring,
    IdentifiedBy,
    Overlaps,
    Next,
    Earliest,
    Latest,
}

/// Labels that may appear as the source of an `IDENTIFIED_BY` edge.
const LINKABLE: &[Label] = &[Label::Location, Label::Artist, Label::Work, Label::Happening];

impl Relation {
    /// The store-side relationship type string.
    pub fn as_type(&self) -> &'static str {
        match self {
            Relation::HappensAt => "HAPPENS_AT",
            Relation::Hosts => "HOSTS",
            Relation::MadeBy => "MADE_BY",
            Relation::LocatedAt => "LOCATED_AT",
            Relation::ActiveDuring => "ACTIVE_DURING",
            Relation::IdentifiedBy => "IDENTIFIED_BY",
            Relation::Overlaps => "OVERLAPS",
            Relation::Next => "NEXT",
            Relation::Earliest => "EARLIEST",
            Relation::Latest => "LATEST",
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        match self {
            Relation::Hosts | Relation::IdentifiedBy | Relation::Overlaps => Cardinality::Many,
            Relation::HappensAt
            | Relation::MadeBy
            | Relation::LocatedAt
            | Relation::ActiveDuring
            | Relation::Next
            | Relation::Earliest
            | Relation::Latest => Cardinality::One,
        }
    }

    /// Labels allowed on the source end of the edge.
    pub fn sources(&self) -> &'static [Label] {
        match self {
            Relation::HappensAt => &[Label::Happening],
            Relation::Hosts => &[Label::Happening],
            Relation::MadeBy => &[Label::Work],
            Relation::LocatedAt => &[Label::Location],
            Relation::ActiveDuring => &[Label::Happening],
            Relation::IdentifiedBy => LINKABLE,
            Relation::Overlaps => &[Label::Timespan],
            Relation::Next => &[Label::Hour],
            Relation::Earliest | Relation::Latest => &[Label::HourIndex],
        }
    }

    /// The label on the target end of the edge.
    pub fn target(&self) -> Label {
        match self {
            Relation::HappensAt => Label::Location,
            Relation::Hosts => Label::Artist,
            Relation::MadeBy => Label::Artist,
            Relation::LocatedAt => Label::Address,
            Relation::ActiveDuring => Label::Timespan,
            Relation::IdentifiedBy => Label::Uri,
            Relation::Overlaps => Label::Hour,
            Relation::Next => Label::Hour,
            Relation::Earliest | Relation::Latest => Label::Hour,
        }
    }

    /// The reserved key a joined child embeds under in an external map.
    pub fn join_key(&self) -> &'static str {
        match self {
            Relation::HappensAt => "location",
            Relation::Hosts => "artists",
            Relation::MadeBy => "artist",
            Relation::LocatedAt => "address",
            Relation::ActiveDuring => "time",
            Relation::IdentifiedBy => "links",
            Relation::Overlaps => "hours",
            Relation::Next => "next",
            Relation::Earliest => "earliest",
            Relation::Latest => "latest",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_type())
    }
}

// ── Entities ──────────────────────────────────────────────────────

/// A node read from or written to the graph.
///
/// `props` holds every store property as a string value, including `name`
/// and, for sluggable labels, `slug`. Entities are plain data; the
/// repository never caches them across calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub label: Label,
    pub slug: String,
    pub props: PropMap,
}

impl Entity {
    pub fn new(label: Label, slug: impl Into<String>, props: PropMap) -> Self {
        Self {
            label,
            slug: slug.into(),
            props,
        }
    }

    /// A string property, if present.
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.prop("name")
    }

    /// The external map form: all properties plus the reserved `_label` key.
    pub fn to_value(&self) -> PropMap {
        let mut map = self.props.clone();
        map.insert(
            LABEL_KEY.to_string(),
            Value::String(self.label.as_str().to_string()),
        );
        map
    }
}

/// A name → URL pair attached to an entity through a `URI` node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub url: String,
}

impl Link {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}
