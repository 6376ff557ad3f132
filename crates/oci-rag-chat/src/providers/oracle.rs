//! Oracle Database 23ai vector store
//!
//! Reads passages from a table laid out as `(id, text, metadata, embedding)`
//! and ranks them with `VECTOR_DISTANCE`. The driver is blocking, so every
//! call runs on the blocking thread pool.

use async_trait::async_trait;
use oracle::{Connection, Connector, InitParams};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::{validate_table_name, ConnectionConfig};
use crate::error::{Error, Result};
use crate::providers::vector_store::{DistanceStrategy, VectorSearchResult, VectorStoreProvider};

/// Vector store backed by one Oracle table
pub struct OracleVectorStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
    distance: DistanceStrategy,
}

impl OracleVectorStore {
    /// Connect with the descriptor's credentials
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        validate_table_name(&config.table_name)?;
        let config = config.clone();

        let table = config.table_name.clone();
        let conn = tokio::task::spawn_blocking(move || open_connection(&config))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))??;

        tracing::info!("Connected to Oracle Database, table {}", table);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table,
            distance: DistanceStrategy::Cosine,
        })
    }

    /// Rank with a different metric
    pub fn with_distance(mut self, distance: DistanceStrategy) -> Self {
        self.distance = distance;
        self
    }
}

fn open_connection(config: &ConnectionConfig) -> Result<Connection> {
    if let Some(dir) = &config.config_dir {
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "CONFIG_DIR {} is not a directory",
                dir.display()
            )));
        }
        let mut params = InitParams::new();
        params.oracle_client_config_dir(dir.clone())?;
        if !params.init()? {
            tracing::debug!("Oracle client already initialized, CONFIG_DIR not reapplied");
        }
    }

    if let Some(dir) = &config.wallet_dir {
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "WALLET_DIR {} is not a directory",
                dir.display()
            )));
        }
    }

    if wallet_ignored(config) {
        tracing::warn!(
            "WALLET_DIR {} is ignored for TNS alias {}; the wallet is taken from sqlnet.ora in CONFIG_DIR",
            config.wallet_dir.as_deref().map(|d| d.display().to_string()).unwrap_or_default(),
            config.dsn
        );
    }

    let dsn = connect_string(&config.dsn, config.wallet_dir.as_deref().and_then(|d| d.to_str()));
    let conn = Connector::new(config.username.as_str(), config.password.as_str(), dsn.as_str())
        .connect()
        .map_err(|e| Error::Database(format!("Failed to connect to {}: {}", config.dsn, e)))?;
    Ok(conn)
}

fn is_easy_connect(dsn: &str) -> bool {
    dsn.starts_with("tcps://") || dsn.starts_with("tcp://") || dsn.contains('/')
}

/// True when WALLET_DIR names a wallet the connection will not use
pub(crate) fn wallet_ignored(config: &ConnectionConfig) -> bool {
    match &config.wallet_dir {
        Some(wallet) => {
            !is_easy_connect(&config.dsn) && config.config_dir.as_ref() != Some(wallet)
        }
        None => false,
    }
}

/// Attach the wallet to Easy Connect strings
///
/// TNS aliases resolve their wallet through sqlnet.ora in CONFIG_DIR and are
/// returned unchanged.
pub(crate) fn connect_string(dsn: &str, wallet_dir: Option<&str>) -> String {
    match wallet_dir {
        Some(dir) if is_easy_connect(dsn) && !dsn.contains("wallet_location") => {
            let sep = if dsn.contains('?') { '&' } else { '?' };
            format!("{}{}wallet_location={}", dsn, sep, dir)
        }
        _ => dsn.to_string(),
    }
}

/// Top-k query; `:1` is the query vector literal, `:2` the row limit
pub(crate) fn search_sql(table: &str, distance: DistanceStrategy) -> String {
    format!(
        "SELECT text, VECTOR_DISTANCE(embedding, TO_VECTOR(:1), {}) AS distance \
         FROM {} ORDER BY distance FETCH FIRST :2 ROWS ONLY",
        distance.sql_keyword(),
        table
    )
}

/// `[0.1,0.2,...]` text form accepted by `TO_VECTOR`
pub(crate) fn vector_literal(embedding: &[f32]) -> Result<String> {
    Ok(serde_json::to_string(embedding)?)
}

#[async_trait]
impl VectorStoreProvider for OracleVectorStore {
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let conn = Arc::clone(&self.conn);
        let sql = search_sql(&self.table, self.distance);
        let vector = vector_literal(query_embedding)?;
        let limit = top_k as i64;

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            let rows = conn
                .query_as::<(String, f64)>(&sql, &[&vector, &limit])
                .map_err(|e| Error::vector_db(format!("Vector search failed: {}", e)))?;

            let mut results = Vec::with_capacity(top_k);
            for row in rows {
                let (content, distance) =
                    row.map_err(|e| Error::vector_db(format!("Failed to read row: {}", e)))?;
                results.push(VectorSearchResult {
                    content,
                    distance: Some(distance),
                });
            }
            Ok(results)
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    fn distance_strategy(&self) -> DistanceStrategy {
        self.distance
    }

    async fn health_check(&self) -> Result<bool> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || Ok(conn.lock().ping().is_ok()))
            .await
            .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    fn name(&self) -> &str {
        "oracle-23ai"
    }
}
