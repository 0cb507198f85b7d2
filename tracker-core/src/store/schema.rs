//! Schema materialisation: turns a finalized [`Registry`] into the SQLite
//! table layout: one root `Resource` table, one
//! table per materialized class, one side table per multi-valued property,
//! and the fulltext virtual table.

use crate::error::Result;
use crate::ontology::registry::{Class, DataType, Registry};
use sqlx::SqliteConnection;
use tracing::{debug, info};

/// Creates every table the registry requires if it doesn't already exist.
/// Idempotent: safe to call on both first bootstrap and a reopen, since the
/// registry is rebuilt from the same ontology files each time (see
/// `reconstruct`).
pub async fn materialize(conn: &mut SqliteConnection, registry: &Registry) -> Result<()> {
    create_root_table(conn).await?;
    create_type_table(conn).await?;
    create_fts_table(conn, registry).await?;

    for class in &registry.classes {
        if !class.materialize_table {
            continue;
        }
        create_class_table(conn, registry, class).await?;
        create_side_tables(conn, registry, class).await?;
    }

    for class in &registry.classes {
        if class.materialize_table {
            reserve_class_resource(conn, class).await?;
        }
    }
    Ok(())
}

async fn create_root_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS Resource (
            id INTEGER PRIMARY KEY,
            uri TEXT UNIQUE NOT NULL,
            modified INTEGER NOT NULL,
            added INTEGER NOT NULL,
            available INTEGER NOT NULL DEFAULT 1
        )",
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// `rdf:type` membership is multi-valued by nature (a resource's types
/// include every ancestor), so it gets its own side table rather than a
/// column on `Resource`.
async fn create_type_table(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS Resource_rdf_type (
            id INTEGER NOT NULL REFERENCES Resource(id),
            class_id INTEGER NOT NULL,
            UNIQUE(class_id, id)
        )",
    )
    .execute(&mut *conn)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_rdf_type_id ON Resource_rdf_type(id)")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn create_fts_table(conn: &mut SqliteConnection, registry: &Registry) -> Result<()> {
    let mut cols: Vec<&str> = registry
        .properties
        .iter()
        .filter(|p| p.fulltext_indexed)
        .map(|p| p.uri.as_str())
        .collect();
    if cols.is_empty() {
        cols.push("text");
    }
    let column_list = cols
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS fts USING fts5({column_list}, tokenize='unicode61')"
    );
    sqlx::query(&sql).execute(&mut *conn).await?;
    Ok(())
}

fn sql_type(dt: DataType) -> &'static str {
    match dt {
        DataType::String => "TEXT",
        DataType::Double => "REAL",
        DataType::Int64
        | DataType::Bool
        | DataType::Date
        | DataType::DateTime
        | DataType::Resource => "INTEGER",
    }
}

/// One column per single-valued property whose domain is exactly this
/// class (inherited properties live in the ancestor's own table and are
/// reached by joining on `id`).
async fn create_class_table(
    conn: &mut SqliteConnection,
    registry: &Registry,
    class: &Class,
) -> Result<()> {
    let columns: Vec<_> = registry
        .properties
        .iter()
        .filter(|p| p.single_valued && p.domain == registry.class_id(&class.uri))
        .collect();

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (id INTEGER PRIMARY KEY REFERENCES Resource(id)",
        class.table_name
    );
    for prop in &columns {
        let ty = sql_type(prop.data_type().unwrap_or(DataType::String));
        sql.push_str(&format!(", \"{}\" {}", prop.uri, ty));
    }
    sql.push(')');
    sqlx::query(&sql).execute(&mut *conn).await?;

    for prop in &columns {
        if prop.indexed {
            let idx = format!(
                "CREATE INDEX IF NOT EXISTS \"idx_{}_{}\" ON \"{}\"(\"{}\")",
                class.table_name, prop.uri, class.table_name, prop.uri
            );
            sqlx::query(&idx).execute(&mut *conn).await?;
        }
    }

    debug!(class = %class.uri, columns = columns.len(), "materialized class table");
    Ok(())
}

/// Multi-valued properties get a `"Class_Property"` side table: `(id,
/// value)` with a `UNIQUE(P, id)` constraint when the property is indexed
/// (favouring point lookups on the value), or `UNIQUE(id, P)` otherwise
/// (favouring "all values for this resource" lookups).
async fn create_side_tables(
    conn: &mut SqliteConnection,
    registry: &Registry,
    class: &Class,
) -> Result<()> {
    let multi: Vec<_> = registry
        .properties
        .iter()
        .filter(|p| !p.single_valued && p.domain == registry.class_id(&class.uri))
        .collect();

    for prop in multi {
        let table = format!("{}_{}", class.table_name, prop.uri);
        let ty = sql_type(prop.data_type().unwrap_or(DataType::String));
        let unique = if prop.indexed {
            format!("UNIQUE(\"{}\", id)", prop.uri)
        } else {
            format!("UNIQUE(id, \"{}\")", prop.uri)
        };
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (
                id INTEGER NOT NULL REFERENCES Resource(id),
                \"{col}\" {ty} NOT NULL,
                {unique}
            )",
            table = table,
            col = prop.uri,
            ty = ty,
            unique = unique,
        );
        sqlx::query(&sql).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Classes are themselves resources: a `rdf:type Class` statement's object
/// must resolve to a valid id. Reserves one at schema-materialisation time
/// so the type side table can always be populated without a chicken-and-egg
/// ordering dependency on the interpreter.
async fn reserve_class_resource(conn: &mut SqliteConnection, class: &Class) -> Result<()> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM Resource WHERE uri = ?")
        .bind(&class.uri)
        .fetch_optional(&mut *conn)
        .await?;
    if existing.is_some() {
        return Ok(());
    }
    let next_id: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) + 1 FROM Resource")
        .fetch_one(&mut *conn)
        .await?;
    sqlx::query(
        "INSERT INTO Resource (id, uri, modified, added, available) VALUES (?, ?, 0, 0, 1)",
    )
    .bind(next_id)
    .bind(&class.uri)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Drops and recreates every transient multi-valued property's side table
/// contents; called once at every store open, not only the first.
pub async fn truncate_transient(conn: &mut SqliteConnection, registry: &Registry) -> Result<()> {
    for class in &registry.classes {
        if !class.materialize_table {
            continue;
        }
        for prop in &registry.properties {
            if prop.transient
                && !prop.single_valued
                && prop.domain == registry.class_id(&class.uri)
            {
                let table = format!("{}_{}", class.table_name, prop.uri);
                let sql = format!("DELETE FROM \"{table}\"");
                sqlx::query(&sql).execute(&mut *conn).await?;
            }
        }
    }
    Ok(())
}

/// Whether `Resource` already exists; the signal used to decide between a
/// first-time bootstrap and a reload. Mirrors the `is_first_time_index`
/// flag the original daemon derives from whether its database files are
/// present on disk (`tracker-data-manager.c`), adapted to a single-file
/// SQLite store where the same question is "does the root table exist".
pub async fn root_table_exists(conn: &mut SqliteConnection) -> Result<bool> {
    let name: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'Resource'",
    )
    .fetch_optional(&mut *conn)
    .await?;
    Ok(name.is_some())
}

pub fn log_materialized(registry: &Registry) {
    let classes = registry.classes.iter().filter(|c| c.materialize_table).count();
    info!(classes, properties = registry.properties.len(), "ontology materialized");
}
