//! The transactional update buffer: batches `insert`/`delete`/`update-uri`
//! statements from one `STATEMENTS` submission into a single SQLite
//! transaction, resolving blank nodes and bumping `Resource.modified` and
//! the fulltext index exactly once per affected subject regardless of how
//! many individual statements touched it.

use crate::error::{Result, TrackerError};
use crate::ontology::registry::{ClassId, PropertyId, Registry};
use crate::store::blank::BlankNodeBuffer;
use crate::store::resource::{RenameOutcome, ResourceAllocator};
use crate::value::Value;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct UpdateBuffer<'a> {
    registry: Arc<Registry>,
    allocator: Arc<ResourceAllocator>,
    blanks: BlankNodeBuffer,
    tx: Transaction<'a, Sqlite>,
    dirty_fulltext: HashSet<i64>,
}

impl<'a> UpdateBuffer<'a> {
    pub async fn begin(
        pool: &'a SqlitePool,
        registry: Arc<Registry>,
        allocator: Arc<ResourceAllocator>,
    ) -> Result<Self> {
        allocator.clear_batch_cache();
        let tx = pool.begin().await?;
        Ok(Self {
            registry,
            allocator,
            blanks: BlankNodeBuffer::new(),
            tx,
            dirty_fulltext: HashSet::new(),
        })
    }

    /// Resolves `label` to a resource id, allocating one if new. Blank
    /// labels (`_:bN`) are first rewritten to their coalesced `urn:uuid:`
    /// IRI via the batch's [`BlankNodeBuffer`].
    pub async fn resolve_subject(&mut self, label: &str) -> Result<i64> {
        let uri = if BlankNodeBuffer::is_blank(label) {
            self.blanks.resolve(label)
        } else {
            label.to_string()
        };
        self.allocator.ensure_id(&mut self.tx, &uri).await
    }

    /// Records a predicate/object pair against a blank subject without
    /// resolving it yet; used while a statement block for `_:bN` is still
    /// being read, before the subject's id is needed.
    pub fn record_blank_pair(&mut self, label: &str, predicate: &str, object: &str) {
        self.blanks.record(label, predicate, object);
    }

    /// Besides recording `rdf:type` membership, gives `subject_id` a row in
    /// every materialized table in `class`'s closure (not just `class`
    /// itself): a single-valued property declared on an ancestor is stored
    /// on the ancestor's own table, so that table needs a row for this
    /// subject too or the later `UPDATE ... WHERE id = ?` in `set_value`
    /// would match nothing.
    pub async fn add_type(&mut self, subject_id: i64, class: ClassId) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO Resource_rdf_type (id, class_id) VALUES (?, ?)",
        )
        .bind(subject_id)
        .bind(class as i64)
        .execute(&mut *self.tx)
        .await?;

        for &ancestor in &self.registry.class(class).closure {
            let ancestor_class = self.registry.class(ancestor);
            if !ancestor_class.materialize_table {
                continue;
            }
            let sql = format!(
                "INSERT OR IGNORE INTO \"{}\" (id) VALUES (?)",
                ancestor_class.table_name
            );
            sqlx::query(&sql).bind(subject_id).execute(&mut *self.tx).await?;
        }

        self.bump(subject_id).await
    }

    /// Applies `set_value` for one property. Single-valued properties
    /// overwrite the class table's column (the only state kept is the
    /// latest one); multi-valued properties insert into the side table and
    /// rely on the `UNIQUE` constraint to silently drop an already-present
    /// duplicate value.
    pub async fn set_value(
        &mut self,
        subject_id: i64,
        class: ClassId,
        property: PropertyId,
        value: &Value,
    ) -> Result<()> {
        let prop = self.registry.property(property);
        let table_name = &self.registry.class(class).table_name;

        if prop.single_valued {
            let sql = format!(
                "UPDATE \"{table}\" SET \"{col}\" = ? WHERE id = ?",
                table = table_name,
                col = prop.uri
            );
            bind_value(sqlx::query(&sql), value)
                .bind(subject_id)
                .execute(&mut *self.tx)
                .await?;
        } else {
            let side_table = format!("{table_name}_{}", prop.uri);
            let sql = format!(
                "INSERT OR IGNORE INTO \"{side}\" (id, \"{col}\") VALUES (?, ?)",
                side = side_table,
                col = prop.uri
            );
            bind_value(sqlx::query(&sql).bind(subject_id), value)
                .execute(&mut *self.tx)
                .await?;
        }

        if prop.fulltext_indexed {
            self.dirty_fulltext.insert(subject_id);
        }
        self.bump(subject_id).await
    }

    pub async fn delete_value(
        &mut self,
        subject_id: i64,
        class: ClassId,
        property: PropertyId,
        value: Option<&Value>,
    ) -> Result<()> {
        let prop = self.registry.property(property);
        let table_name = &self.registry.class(class).table_name;

        if prop.single_valued {
            let sql = format!(
                "UPDATE \"{table}\" SET \"{col}\" = NULL WHERE id = ?",
                table = table_name,
                col = prop.uri
            );
            sqlx::query(&sql).bind(subject_id).execute(&mut *self.tx).await?;
        } else {
            let side_table = format!("{table_name}_{}", prop.uri);
            match value {
                Some(v) => {
                    let sql = format!(
                        "DELETE FROM \"{side}\" WHERE id = ? AND \"{col}\" = ?",
                        side = side_table,
                        col = prop.uri
                    );
                    bind_value(sqlx::query(&sql).bind(subject_id), v)
                        .execute(&mut *self.tx)
                        .await?;
                }
                None => {
                    let sql = format!("DELETE FROM \"{side}\" WHERE id = ?", side = side_table);
                    sqlx::query(&sql).bind(subject_id).execute(&mut *self.tx).await?;
                }
            }
        }

        if prop.fulltext_indexed {
            self.dirty_fulltext.insert(subject_id);
        }
        self.bump(subject_id).await
    }

    /// Marks a resource unavailable (soft delete: the row and its history
    /// survive for id stability, but it drops out of query results and its
    /// fulltext entry is cleared). Matches the `available` column's role in
    /// used for volume-unmount bookkeeping.
    pub async fn delete_subject(&mut self, subject_id: i64) -> Result<()> {
        sqlx::query("UPDATE Resource SET available = 0 WHERE id = ?")
            .bind(subject_id)
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("DELETE FROM fts WHERE rowid = ?")
            .bind(subject_id)
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("INSERT INTO fts (rowid) VALUES (?)")
            .bind(subject_id)
            .execute(&mut *self.tx)
            .await?;
        self.bump(subject_id).await
    }

    /// Every class `subject_id` has been asserted as this batch, plus
    /// whatever it was already typed as in prior, already-committed
    /// batches: the domain check in [`crate::store::interpreter`] needs
    /// both, since a statement can assert a value in the same batch as the
    /// type that licenses it.
    pub async fn subject_classes(&mut self, subject_id: i64) -> Result<Vec<ClassId>> {
        let rows: Vec<i64> = sqlx::query_scalar("SELECT class_id FROM Resource_rdf_type WHERE id = ?")
            .bind(subject_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(|id| id as ClassId).collect())
    }

    pub async fn update_uri(&mut self, old: &str, new: &str) -> Result<i64> {
        match self.allocator.rename(&mut self.tx, old, new).await? {
            RenameOutcome::Renamed(id) => Ok(id),
            RenameOutcome::OldNotFound => Err(TrackerError::UnknownResource(old.to_string())),
            RenameOutcome::NewTaken => Err(TrackerError::UriTaken(new.to_string())),
        }
    }

    async fn bump(&mut self, subject_id: i64) -> Result<()> {
        self.allocator.bump_modified(&mut self.tx, subject_id).await?;
        Ok(())
    }

    /// Recomputes the fulltext row for every subject touched by a
    /// fulltext-indexed property this batch, then commits the transaction.
    pub async fn commit(mut self) -> Result<()> {
        for subject_id in self.dirty_fulltext.clone() {
            self.reindex_fulltext(subject_id).await?;
        }
        self.tx.commit().await?;
        debug!("update buffer committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    /// Re-reads every fulltext-indexed property value currently stored for
    /// `subject_id` across all its classes and replaces the `fts` row with
    /// their concatenation, heaviest-weighted property first.
    async fn reindex_fulltext(&mut self, subject_id: i64) -> Result<()> {
        let types: Vec<i64> =
            sqlx::query_scalar("SELECT class_id FROM Resource_rdf_type WHERE id = ?")
                .bind(subject_id)
                .fetch_all(&mut *self.tx)
                .await?;

        let mut fulltext_props: Vec<_> = self
            .registry
            .properties
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.fulltext_indexed
                    && p.domain
                        .map(|d| types.iter().any(|t| *t as usize == d))
                        .unwrap_or(false)
            })
            .collect();
        fulltext_props.sort_by(|(_, a), (_, b)| b.weight.cmp(&a.weight));

        let mut text_by_column: Vec<(String, String)> = Vec::new();
        for (_, prop) in &fulltext_props {
            let Some(domain) = prop.domain else { continue };
            let table = &self.registry.class(domain).table_name;
            let text = if prop.single_valued {
                let sql = format!(
                    "SELECT \"{col}\" FROM \"{table}\" WHERE id = ?",
                    col = prop.uri
                );
                sqlx::query_scalar::<_, Option<String>>(&sql)
                    .bind(subject_id)
                    .fetch_optional(&mut *self.tx)
                    .await?
                    .flatten()
            } else {
                let side = format!("{table}_{}", prop.uri);
                let sql = format!(
                    "SELECT \"{col}\" FROM \"{side}\" WHERE id = ?",
                    col = prop.uri
                );
                let values: Vec<String> = sqlx::query_scalar(&sql)
                    .bind(subject_id)
                    .fetch_all(&mut *self.tx)
                    .await?;
                if values.is_empty() {
                    None
                } else {
                    Some(values.join(" "))
                }
            };
            if let Some(text) = text {
                text_by_column.push((prop.uri.clone(), text));
            }
        }

        sqlx::query("DELETE FROM fts WHERE rowid = ?")
            .bind(subject_id)
            .execute(&mut *self.tx)
            .await?;

        if text_by_column.is_empty() {
            sqlx::query("INSERT INTO fts (rowid) VALUES (?)")
                .bind(subject_id)
                .execute(&mut *self.tx)
                .await?;
        } else {
            let columns = text_by_column
                .iter()
                .map(|(c, _)| format!("\"{c}\""))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = text_by_column.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
            let sql = format!(
                "INSERT INTO fts (rowid, {columns}) VALUES (?, {placeholders})"
            );
            let mut query = sqlx::query(&sql).bind(subject_id);
            for (_, text) in &text_by_column {
                query = query.bind(text.clone());
            }
            query.execute(&mut *self.tx).await?;
        }

        Ok(())
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    value: &'q Value,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match value {
        Value::String(s) => query.bind(s),
        Value::Double(d) => query.bind(*d),
        other => match other.as_sql_int() {
            Some(i) => query.bind(i),
            None => {
                warn!("value had neither text nor int encoding");
                query.bind(Option::<i64>::None)
            }
        },
    }
}
