//! Per-file processing state machine: mtime gate, attribute
//! query, base triples, extractor call, stitch, fulltext, notify.
//!
//! The extractor's `(preupdate, update, where)` reply is raw SPARQL text, and
//! parsing and executing arbitrary SPARQL is out of scope, so
//! "stitch" hands those three fragments to a [`SparqlFragmentSink`] trait
//! object rather than feeding them through the typed [`Interpreter`]. Base
//! triples, which this crate *does* know the shape of, are asserted
//! directly via the interpreter's [`Statement`] entry points.

use crate::error::{Result, TrackerError};
use crate::extract::{ExtractionResult, ExtractorClient, PooledExtractorClient};
use crate::ontology::Registry;
use crate::store::{Interpreter, Object, Statement, Store};
use crate::writeback::WritebackDispatcher;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a file's `dataSource` points when no removable-media volume
/// claims it.
pub const NON_REMOVABLE_DATASOURCE: &str = "urn:nepomuk:datasource:non-removable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Processed and written; `indexed` distinguishes a real write from a
    /// mtime-gated skip that still counts as "processed".
    Processed { indexed: bool },
    Failed(String),
    Cancelled,
}

/// Narrow boundary for the out-of-scope SPARQL executor: receives the raw
/// fragments the extractor returned, in the order it produced them
/// (preupdate, then the update body under the resource URN, then where).
#[async_trait]
pub trait SparqlFragmentSink: Send + Sync {
    async fn apply(&self, resource_uri: &str, preupdate: &str, update: &str, where_clause: &str) -> Result<()>;
}

/// Default sink: a no-op, logging the fragment sizes. Production wiring
/// supplies a real SPARQL-executing sink; this exists so the pipeline is
/// exercisable without one.
pub struct NullSparqlSink;

#[async_trait]
impl SparqlFragmentSink for NullSparqlSink {
    async fn apply(&self, resource_uri: &str, preupdate: &str, update: &str, where_clause: &str) -> Result<()> {
        debug!(
            resource_uri,
            preupdate_len = preupdate.len(),
            update_len = update.len(),
            where_len = where_clause.len(),
            "sparql fragments received (executor out of scope)"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FileAttributes {
    pub is_directory: bool,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
    pub mime_type: String,
    pub display_name: String,
}

fn query_attributes(path: &Path) -> Result<FileAttributes> {
    let metadata = std::fs::metadata(path).map_err(|e| TrackerError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let modified = metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());
    let accessed = metadata
        .accessed()
        .map(DateTime::<Utc>::from)
        .unwrap_or(modified);
    let display_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime_type = guess_mime_type(path);

    Ok(FileAttributes {
        is_directory: metadata.is_dir(),
        size: metadata.len(),
        modified,
        accessed,
        mime_type,
        display_name,
    })
}

fn guess_mime_type(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase) {
        Some(ext) => match ext.as_str() {
            "txt" | "md" => "text/plain",
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "pdf" => "application/pdf",
            "mp3" => "audio/mpeg",
            "mp4" => "video/mp4",
            _ => "application/octet-stream",
        },
        None => "application/octet-stream",
    }
    .to_string()
}

/// Builds the file's own type assertions and the properties derivable
/// purely from filesystem attributes.
fn base_triples(url: &str, attrs: &FileAttributes, datasource: &str) -> Vec<Statement> {
    let mut statements = vec![
        Statement::InsertType {
            subject: url.to_string(),
            class: "nfo:FileDataObject".to_string(),
        },
        Statement::InsertType {
            subject: url.to_string(),
            class: "nie:InformationElement".to_string(),
        },
    ];
    if attrs.is_directory {
        statements.push(Statement::InsertType {
            subject: url.to_string(),
            class: "nfo:Folder".to_string(),
        });
    }

    let mut prop = |property: &str, literal: String| {
        statements.push(Statement::InsertValue {
            subject: url.to_string(),
            property: property.to_string(),
            object: Object::Literal(literal),
        })
    };
    prop("nfo:fileName", attrs.display_name.clone());
    prop("nfo:fileSize", attrs.size.to_string());
    prop(
        "nfo:fileLastModified",
        attrs.modified.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    );
    prop(
        "nfo:fileLastAccessed",
        attrs.accessed.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    );
    prop("nie:mimeType", attrs.mime_type.clone());
    prop("nie:url", url.to_string());

    statements.push(Statement::InsertValue {
        subject: url.to_string(),
        property: "nie:isStoredAs".to_string(),
        object: Object::Uri(url.to_string()),
    });
    statements.push(Statement::InsertValue {
        subject: url.to_string(),
        property: "nie:dataSource".to_string(),
        object: Object::Uri(datasource.to_string()),
    });

    statements
}

pub struct PipelineContext<C: ExtractorClient> {
    pub store: Arc<Store>,
    pub registry: Arc<Registry>,
    pub extractor: Arc<PooledExtractorClient<C>>,
    pub sparql_sink: Arc<dyn SparqlFragmentSink>,
    pub writeback: Arc<WritebackDispatcher>,
    pub notify: Arc<Notify>,
}

/// Runs the full state machine for one file. `datasource` is the URN of
/// the volume this path belongs to (see [`crate::volume`]). `force` skips
/// the mtime gate, for control-surface requests (`check_files`, `index_file`,
/// `reindex_by_mime_type`) that must re-index regardless of whether the
/// file looks unchanged.
pub async fn process_file<C: ExtractorClient>(
    ctx: &PipelineContext<C>,
    path: &Path,
    datasource: &str,
    force: bool,
    cancel: CancellationToken,
) -> PipelineOutcome {
    let url = format!("file://{}", path.display());

    if cancel.is_cancelled() {
        return PipelineOutcome::Cancelled;
    }

    // Step 1: mtime gate.
    let attrs = match query_attributes(path) {
        Ok(a) => a,
        Err(err) => {
            warn!(?path, %err, "attribute query failed");
            return PipelineOutcome::Failed(err.to_string());
        }
    };
    let stored_mtime = stored_last_modified(&ctx.store, &url).await;
    // `stored_mtime` comes back from `nfo:fileLastModified`, which is stored
    // (and re-read) at whole-second precision; `attrs.modified` still carries
    // the filesystem's sub-second nanoseconds, so the comparison has to drop
    // them too or this gate never trips.
    let modified_secs = DateTime::<Utc>::from_timestamp(attrs.modified.timestamp(), 0).unwrap_or(attrs.modified);
    if !force && stored_mtime == Some(modified_secs) {
        debug!(?path, "unchanged mtime, skipping");
        return PipelineOutcome::Processed { indexed: false };
    }

    if cancel.is_cancelled() {
        return PipelineOutcome::Cancelled;
    }

    // Step 3: base triples.
    let base = base_triples(&url, &attrs, datasource);

    // Step 4: extractor call.
    let extraction = tokio::select! {
        result = ctx.extractor.extract(&path.to_path_buf(), &attrs.mime_type) => result,
        _ = cancel.cancelled() => return PipelineOutcome::Cancelled,
    };
    let extraction = extraction.unwrap_or_else(|err| {
        warn!(?path, %err, "extractor failed, indexing base triples only");
        ExtractionResult::default()
    });

    if cancel.is_cancelled() {
        return PipelineOutcome::Cancelled;
    }

    // Steps 5-6: stitch base triples via the interpreter, hand extractor
    // fragments to the SPARQL sink, fold in fulltext content if present.
    let mut all_statements = base;
    if let Some(text) = ancillary_text_content(path, &attrs.mime_type) {
        all_statements.push(Statement::InsertValue {
            subject: url.clone(),
            property: "nie:plainTextContent".to_string(),
            object: Object::Literal(text),
        });
    }

    let result = run_batch(ctx, &url, &all_statements, &extraction).await;

    if cancel.is_cancelled() {
        return PipelineOutcome::Cancelled;
    }

    match result {
        Ok(()) => {
            ctx.notify.notify_one();
            info!(?path, "indexed");
            PipelineOutcome::Processed { indexed: true }
        }
        Err(err) => {
            warn!(?path, %err, "pipeline failed to flush");
            PipelineOutcome::Failed(err.to_string())
        }
    }
}

/// For plain-text files, reads the content directly so it contributes to
/// the fulltext index even when the extractor's reply carried no usable
/// body. Capped to avoid pulling an unbounded file into memory.
const MAX_ANCILLARY_TEXT_BYTES: u64 = 1 << 20;

fn ancillary_text_content(path: &Path, mime_type: &str) -> Option<String> {
    if mime_type != "text/plain" {
        return None;
    }
    let metadata = std::fs::metadata(path).ok()?;
    if metadata.len() > MAX_ANCILLARY_TEXT_BYTES {
        return None;
    }
    std::fs::read_to_string(path).ok()
}

async fn stored_last_modified(store: &Store, url: &str) -> Option<DateTime<Utc>> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT \"nfo:fileLastModified\" FROM \"nfo:FileDataObject\" \
         JOIN Resource ON Resource.id = \"nfo:FileDataObject\".id WHERE Resource.uri = ?",
    )
    .bind(url)
    .fetch_optional(store.pool())
    .await
    .ok()
    .flatten();
    row.and_then(|(secs,)| DateTime::<Utc>::from_timestamp(secs, 0))
}

async fn run_batch<C: ExtractorClient>(
    ctx: &PipelineContext<C>,
    url: &str,
    statements: &[Statement],
    extraction: &ExtractionResult,
) -> Result<()> {
    let interpreter = Interpreter::begin(ctx.store.pool(), ctx.registry.clone(), ctx.store.allocator())
        .await?
        .with_writeback(ctx.writeback.clone());
    let report = interpreter.run(statements).await?;
    for (stmt, err) in &report.rejected {
        warn!(?stmt, %err, "statement rejected in file batch");
    }

    if !extraction.preupdate.is_empty() || !extraction.update.is_empty() || !extraction.where_clause.is_empty() {
        ctx.sparql_sink
            .apply(url, &extraction.preupdate, &extraction.update, &extraction.where_clause)
            .await?;
    }
    Ok(())
}

/// Recovers a filesystem path from a stored `file://` URI; returns `None`
/// for anything else (e.g. a `urn:` resource), since there's no path to
/// re-check.
pub fn path_from_file_uri(uri: &str) -> Option<PathBuf> {
    uri.strip_prefix("file://").map(PathBuf::from)
}

pub fn datasource_for(path: &Path, volume_uris: &[(PathBuf, String)]) -> String {
    volume_uris
        .iter()
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.as_os_str().len())
        .map(|(_, uri)| uri.clone())
        .unwrap_or_else(|| NON_REMOVABLE_DATASOURCE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datasource_picks_longest_matching_mount() {
        let mounts = vec![
            (PathBuf::from("/media"), "urn:a".to_string()),
            (PathBuf::from("/media/usb"), "urn:b".to_string()),
        ];
        assert_eq!(
            datasource_for(Path::new("/media/usb/photo.jpg"), &mounts),
            "urn:b"
        );
    }

    #[test]
    fn datasource_falls_back_to_non_removable() {
        let mounts = vec![(PathBuf::from("/media/usb"), "urn:b".to_string())];
        assert_eq!(
            datasource_for(Path::new("/home/user/doc.txt"), &mounts),
            NON_REMOVABLE_DATASOURCE
        );
    }

    #[test]
    fn mime_guess_falls_back_to_octet_stream() {
        assert_eq!(guess_mime_type(Path::new("a.txt")), "text/plain");
        assert_eq!(guess_mime_type(Path::new("a.unknownext")), "application/octet-stream");
    }
}
