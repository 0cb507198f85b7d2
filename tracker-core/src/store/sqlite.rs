//! Store lifecycle: opens the SQLite database, brings the ontology
//! registry and schema into existence on first run, and rebuilds the
//! in-memory registry against it on every subsequent run.
//!
//! The original daemon tracks a `is_first_time_index` flag derived from
//! whether its database files already exist on disk
//! (`tracker-data-manager.c`) and, either way, always re-parses its
//! (static, shipped) ontology files from scratch; first-time and reload
//! differ only in whether the SQL tables still need creating, not in how
//! the registry is built. We follow the same shape: `root_table_exists`
//! plays the role of `is_first_time_index`, and the registry is rebuilt by
//! reparsing the ontology directory on every open rather than by
//! introspecting the SQLite schema, since the ontology directory, not the
//! database, is the source of truth for what classes and properties exist.

use crate::error::Result;
use crate::ontology::registry::Registry;
use crate::ontology::{load_dir, LoadReport};
use crate::store::resource::ResourceAllocator;
use crate::store::schema;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

pub struct Store {
    pool: SqlitePool,
    registry: Arc<Registry>,
    allocator: Arc<ResourceAllocator>,
}

pub struct OpenReport {
    pub first_time: bool,
    pub ontology: LoadReport,
}

impl Store {
    /// Opens (creating if absent) the SQLite file at `path`, loads the
    /// ontology from `ontology_dir`, and materializes any tables missing
    /// from the schema.
    pub async fn open(path: &Path, ontology_dir: &Path) -> Result<(Self, OpenReport)> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| crate::error::TrackerError::Ontology(e.to_string()))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let mut registry = Registry::new();
        let ontology = load_dir(&mut registry, ontology_dir)
            .map_err(|e| crate::error::TrackerError::Ontology(e.to_string()))?;
        let registry = Arc::new(registry);

        let mut conn = pool.acquire().await?;
        let first_time = !schema::root_table_exists(&mut conn).await?;
        schema::materialize(&mut conn, &registry).await?;
        schema::truncate_transient(&mut conn, &registry).await?;
        drop(conn);

        schema::log_materialized(&registry);
        info!(first_time, "store opened");

        let allocator = Arc::new(ResourceAllocator::load(&pool).await?);

        Ok((
            Self {
                pool,
                registry,
                allocator,
            },
            OpenReport {
                first_time,
                ontology,
            },
        ))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn allocator(&self) -> Arc<ResourceAllocator> {
        self.allocator.clone()
    }

    /// `move_file`/`FsIntent::Move` support: renames `old_prefix` and every
    /// stored URI nested under it to the equivalent path under `new_prefix`.
    /// Returns the number of `Resource` rows touched.
    pub async fn rename_subtree(&self, old_prefix: &str, new_prefix: &str) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        self.allocator.rename_subtree(&mut conn, old_prefix, new_prefix).await
    }

    /// `reindex_by_mime_type` support: every stored `file://` URI whose
    /// `nie:mimeType` is one of `mimes`.
    pub async fn uris_by_mime_type(&self, mimes: &[String]) -> Result<Vec<String>> {
        if mimes.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = mimes.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT Resource.uri FROM \"nfo:FileDataObject\" \
             JOIN Resource ON Resource.id = \"nfo:FileDataObject\".id \
             WHERE \"nfo:FileDataObject\".\"nie:mimeType\" IN ({placeholders}) AND Resource.available = 1"
        );
        let mut query = sqlx::query_scalar::<_, String>(&sql);
        for mime in mimes {
            query = query.bind(mime);
        }
        Ok(query.fetch_all(&self.pool).await?)
    }
}
