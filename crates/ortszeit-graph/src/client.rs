//! Neo4j connection management and the shared graph client.

use neo4rs::{ConfigBuilder, Graph, Query};
use serde::Deserialize;

use ortszeit_core::{DomainError, Label};

/// Errors from repository and timeline operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] neo4rs::Error),

    #[error("{label} not found: {lookup}")]
    NotFound { label: Label, lookup: String },

    #[error("ambiguous match: {count} {label} nodes share {property} = {value}")]
    Ambiguous {
        label: Label,
        property: String,
        value: String,
        count: usize,
    },

    #[error("lost uniqueness race on {label}.{property} = {value}")]
    ConstraintRace {
        label: Label,
        property: String,
        value: String,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("malformed record: {0}")]
    Malformed(String),
}

impl RepoError {
    /// Whether the underlying store rejected a write because a
    /// uniqueness constraint already holds the value.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            RepoError::Store(e) => {
                let msg = e.to_string().to_lowercase();
                msg.contains("already exists") || msg.contains("constraintvalidation")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RepoError>;

/// Configuration for connecting to Neo4j.
///
/// Loaded from `ORTSZEIT_`-prefixed environment variables or constructed
/// directly; every field has a working local default.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "ortszeit-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl GraphConfig {
    /// Load from `ORTSZEIT_URI`, `ORTSZEIT_USER`, etc., falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("ORTSZEIT"))
            .build()
            .map_err(|e| RepoError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| RepoError::Config(e.to_string()))
    }
}

/// Thread-safe Neo4j client with connection pooling.
///
/// Single point of access for all graph round-trips. Clone is cheap
/// (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| RepoError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| RepoError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Execute a write-only query (CREATE, MERGE, DELETE, SET).
    pub async fn run(&self, query: Query) -> Result<()> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a read query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a read query and return the first row, if any.
    pub async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }

    /// Begin a transaction.
    pub async fn start_txn(&self) -> Result<neo4rs::Txn> {
        Ok(self.graph.start_txn().await?)
    }

    /// Run every statement inside one transaction; roll back on the
    /// first failure.
    pub async fn run_all(&self, statements: Vec<Query>) -> Result<()> {
        let mut txn = self.start_txn().await?;
        for query in statements {
            if let Err(e) = txn.run(query).await {
                let _ = txn.rollback().await;
                return Err(e.into());
            }
        }
        txn.commit().await?;
        Ok(())
    }

    /// Declare a uniqueness constraint; re-declaring is a no-op.
    pub async fn ensure_unique_constraint(&self, label: Label, property: &str) -> Result<()> {
        let cypher = format!(
            "CREATE CONSTRAINT {name}_{property}_unique IF NOT EXISTS \
             FOR (n:{label}) REQUIRE n.{property} IS UNIQUE",
            name = label.as_str().to_lowercase(),
            label = label.as_str(),
        );

        match self.graph.run(neo4rs::query(&cypher)).await {
            Ok(_) => Ok(()),
            Err(e) => {
                // Stores without IF NOT EXISTS report the existing
                // constraint as an error instead.
                let msg = e.to_string().to_lowercase();
                if msg.contains("already exists") || msg.contains("equivalent") {
                    Ok(())
                } else {
                    Err(e.into())
                }
            }
        }
    }
}
