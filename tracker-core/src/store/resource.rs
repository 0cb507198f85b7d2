//! Resource-id allocator: URI ↔ integer id mapping backed by the `Resource`
//! table, with a per-batch cache to avoid repeated lookups within one
//! transaction.

use crate::error::Result;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;

#[derive(Debug)]
pub struct ResourceAllocator {
    cache: Mutex<HashMap<String, i64>>,
    next_id: AtomicI64,
    next_modseq: AtomicI64,
}

impl ResourceAllocator {
    /// `modseq` starts at `max(existing)+1` and `id` allocation resumes one
    /// above the running max, both scoped to this process's lifetime.
    pub async fn load(pool: &SqlitePool) -> Result<Self> {
        let max_id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM Resource")
            .fetch_one(pool)
            .await?;
        let max_mod: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(modified), 0) FROM Resource")
            .fetch_one(pool)
            .await?;
        Ok(Self {
            cache: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(max_id + 1),
            next_modseq: AtomicI64::new(max_mod + 1),
        })
    }

    /// Clears the per-batch URI cache; called by the update buffer's
    /// `begin()`.
    pub fn clear_batch_cache(&self) {
        self.cache.lock().clear();
    }

    /// Next value in the process-wide monotonic `modified` sequence.
    pub fn next_modseq(&self) -> i64 {
        self.next_modseq.fetch_add(1, Ordering::SeqCst)
    }

    /// Non-allocating lookup: `0` (via `None`) if the URI is unknown.
    pub async fn query_id(&self, conn: &mut SqliteConnection, uri: &str) -> Result<Option<i64>> {
        if let Some(id) = self.cache.lock().get(uri).copied() {
            return Ok(Some(id));
        }
        let row: Option<i64> = sqlx::query_scalar("SELECT id FROM Resource WHERE uri = ?")
            .bind(uri)
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(id) = row {
            self.cache.lock().insert(uri.to_string(), id);
        }
        Ok(row)
    }

    /// Returns the existing id for `uri`, or allocates a new one: inserts
    /// into `Resource` with `available = 1` and reserves a matching `fts`
    /// row, then caches the mapping for this batch.
    pub async fn ensure_id(&self, conn: &mut SqliteConnection, uri: &str) -> Result<i64> {
        if let Some(id) = self.query_id(conn, uri).await? {
            return Ok(id);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let modseq = self.next_modseq();
        sqlx::query(
            "INSERT INTO Resource (id, uri, modified, added, available) VALUES (?, ?, ?, ?, 1)",
        )
        .bind(id)
        .bind(uri)
        .bind(modseq)
        .bind(modseq)
        .execute(&mut *conn)
        .await?;
        sqlx::query("INSERT INTO fts (rowid) VALUES (?)")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        self.cache.lock().insert(uri.to_string(), id);
        Ok(id)
    }

    /// Bumps `Resource.modified` for `id` to a fresh sequence number and
    /// returns it.
    pub async fn bump_modified(&self, conn: &mut SqliteConnection, id: i64) -> Result<i64> {
        let modseq = self.next_modseq();
        sqlx::query("UPDATE Resource SET modified = ? WHERE id = ?")
            .bind(modseq)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(modseq)
    }

    /// `update-uri(old, new)`: fails if `old` is absent or `new` is already
    /// taken.
    pub async fn rename(
        &self,
        conn: &mut SqliteConnection,
        old: &str,
        new: &str,
    ) -> Result<RenameOutcome> {
        let Some(id) = self.query_id(conn, old).await? else {
            return Ok(RenameOutcome::OldNotFound);
        };
        if self.query_id(conn, new).await?.is_some() {
            return Ok(RenameOutcome::NewTaken);
        }
        sqlx::query("UPDATE Resource SET uri = ? WHERE id = ?")
            .bind(new)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        self.bump_modified(conn, id).await?;

        let mut cache = self.cache.lock();
        cache.remove(old);
        cache.insert(new.to_string(), id);
        Ok(RenameOutcome::Renamed(id))
    }

    /// Recursive move: renames `old_prefix` itself (if stored) and every
    /// stored URI nested under it (`old_prefix/...`), substituting
    /// `new_prefix` for the shared prefix. A single `rename` only ever
    /// handles the exact-match case; a moved directory's descendants need
    /// this to keep their URIs consistent with the new location.
    pub async fn rename_subtree(
        &self,
        conn: &mut SqliteConnection,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<u64> {
        let like_pattern = format!("{old_prefix}/%");
        // 1-indexed position right after "old_prefix/".
        let skip = old_prefix.len() as i64 + 2;

        let exact = sqlx::query("UPDATE Resource SET uri = ? WHERE uri = ?")
            .bind(new_prefix)
            .bind(old_prefix)
            .execute(&mut *conn)
            .await?;
        let nested = sqlx::query("UPDATE Resource SET uri = ? || '/' || substr(uri, ?) WHERE uri LIKE ?")
            .bind(new_prefix)
            .bind(skip)
            .bind(&like_pattern)
            .execute(&mut *conn)
            .await?;

        self.cache.lock().clear();
        Ok(exact.rows_affected() + nested.rows_affected())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed(i64),
    OldNotFound,
    NewTaken,
}
