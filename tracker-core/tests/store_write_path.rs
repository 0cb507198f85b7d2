use std::path::PathBuf;

use tempfile::tempdir;
use tracker_core::ontology::load_dir;
use tracker_core::ontology::registry::Registry;
use tracker_core::store::{BatchReport, Interpreter, Object, Statement, Store};

fn ontology_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tracker-miner-fs/data/ontology")
}

async fn open_store() -> (Store, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tracker-test.db");
    let (store, _report) = Store::open(&db_path, &ontology_dir()).await.unwrap();
    (store, dir)
}

async fn run(store: &Store, statements: Vec<Statement>) -> BatchReport {
    let interpreter = Interpreter::begin(store.pool(), store.registry(), store.allocator())
        .await
        .unwrap();
    interpreter.run(&statements).await.unwrap()
}

#[tokio::test]
async fn fresh_file_insert_persists_base_attributes() {
    let (store, _dir) = open_store().await;
    let url = "file:///home/user/notes.txt";

    let report = run(
        &store,
        vec![
            Statement::InsertType {
                subject: url.to_string(),
                class: "nfo:FileDataObject".to_string(),
            },
            Statement::InsertValue {
                subject: url.to_string(),
                property: "nfo:fileName".to_string(),
                object: Object::Literal("notes.txt".to_string()),
            },
            Statement::InsertValue {
                subject: url.to_string(),
                property: "nfo:fileSize".to_string(),
                object: Object::Literal("42".to_string()),
            },
        ],
    )
    .await;
    assert_eq!(report.applied, 3);
    assert!(report.rejected.is_empty());

    let row: (String, i64) = sqlx::query_as(
        "SELECT \"nfo:fileName\", \"nfo:fileSize\" FROM \"nfo:FileDataObject\" \
         JOIN Resource ON Resource.id = \"nfo:FileDataObject\".id WHERE Resource.uri = ?",
    )
    .bind(url)
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(row.0, "notes.txt");
    assert_eq!(row.1, 42);
}

/// Regression test for the ancestor-table row: a `nfo:SoftwareApplication`
/// instance writes `nie:url`/`nfo:fileName` through `nfo:FileDataObject`'s
/// table (the properties' declared domain), not its own. `add_type` has to
/// seed a row in every ancestor table in the asserted class's closure or
/// these writes would silently touch zero rows.
#[tokio::test]
async fn subclass_instance_writes_through_ancestor_table() {
    let (store, _dir) = open_store().await;
    let url = "file:///usr/share/applications/editor.desktop";

    let report = run(
        &store,
        vec![
            Statement::InsertType {
                subject: url.to_string(),
                class: "nfo:SoftwareApplication".to_string(),
            },
            Statement::InsertValue {
                subject: url.to_string(),
                property: "nie:url".to_string(),
                object: Object::Literal(url.to_string()),
            },
            Statement::InsertValue {
                subject: url.to_string(),
                property: "nfo:fileName".to_string(),
                object: Object::Literal("editor.desktop".to_string()),
            },
        ],
    )
    .await;
    assert_eq!(report.applied, 3);

    let stored_name: String = sqlx::query_scalar(
        "SELECT \"nfo:fileName\" FROM \"nfo:FileDataObject\" \
         JOIN Resource ON Resource.id = \"nfo:FileDataObject\".id WHERE Resource.uri = ?",
    )
    .bind(url)
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(stored_name, "editor.desktop");
}

#[tokio::test]
async fn conflicting_single_valued_writes_are_rejected_without_aborting_batch() {
    let (store, _dir) = open_store().await;
    let url = "file:///home/user/report.pdf";

    let report = run(
        &store,
        vec![
            Statement::InsertType {
                subject: url.to_string(),
                class: "nfo:FileDataObject".to_string(),
            },
            Statement::InsertValue {
                subject: url.to_string(),
                property: "nfo:fileName".to_string(),
                object: Object::Literal("report.pdf".to_string()),
            },
            Statement::InsertValue {
                subject: url.to_string(),
                property: "nfo:fileName".to_string(),
                object: Object::Literal("different-name.pdf".to_string()),
            },
            Statement::InsertValue {
                subject: url.to_string(),
                property: "nfo:fileSize".to_string(),
                object: Object::Literal("1024".to_string()),
            },
        ],
    )
    .await;

    assert_eq!(report.applied, 3);
    assert_eq!(report.rejected.len(), 1);

    let stored_name: String = sqlx::query_scalar(
        "SELECT \"nfo:fileName\" FROM \"nfo:FileDataObject\" \
         JOIN Resource ON Resource.id = \"nfo:FileDataObject\".id WHERE Resource.uri = ?",
    )
    .bind(url)
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(stored_name, "report.pdf");

    let stored_size: i64 = sqlx::query_scalar(
        "SELECT \"nfo:fileSize\" FROM \"nfo:FileDataObject\" \
         JOIN Resource ON Resource.id = \"nfo:FileDataObject\".id WHERE Resource.uri = ?",
    )
    .bind(url)
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(stored_size, 1024);
}

#[tokio::test]
async fn rename_preserves_resource_id_and_history() {
    let (store, _dir) = open_store().await;
    let old_url = "file:///home/user/drafts/todo.txt";
    let new_url = "file:///home/user/todo.txt";

    run(
        &store,
        vec![
            Statement::InsertType {
                subject: old_url.to_string(),
                class: "nfo:FileDataObject".to_string(),
            },
            Statement::InsertValue {
                subject: old_url.to_string(),
                property: "nfo:fileName".to_string(),
                object: Object::Literal("todo.txt".to_string()),
            },
        ],
    )
    .await;

    let id_before: i64 = sqlx::query_scalar("SELECT id FROM Resource WHERE uri = ?")
        .bind(old_url)
        .fetch_one(store.pool())
        .await
        .unwrap();

    let report = run(
        &store,
        vec![Statement::UpdateUri {
            old: old_url.to_string(),
            new: new_url.to_string(),
        }],
    )
    .await;
    assert_eq!(report.applied, 1);

    let id_after: i64 = sqlx::query_scalar("SELECT id FROM Resource WHERE uri = ?")
        .bind(new_url)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(id_before, id_after);

    let old_gone: Option<i64> = sqlx::query_scalar("SELECT id FROM Resource WHERE uri = ?")
        .bind(old_url)
        .fetch_optional(store.pool())
        .await
        .unwrap();
    assert!(old_gone.is_none());
}

#[tokio::test]
async fn deleting_subject_clears_it_from_fulltext_but_keeps_the_row() {
    let (store, _dir) = open_store().await;
    let url = "file:///home/user/journal.txt";

    run(
        &store,
        vec![
            Statement::InsertType {
                subject: url.to_string(),
                class: "nfo:FileDataObject".to_string(),
            },
            Statement::InsertType {
                subject: url.to_string(),
                class: "nie:InformationElement".to_string(),
            },
            Statement::InsertValue {
                subject: url.to_string(),
                property: "nie:plainTextContent".to_string(),
                object: Object::Literal("dear diary".to_string()),
            },
        ],
    )
    .await;

    run(
        &store,
        vec![Statement::DeleteSubject {
            subject: url.to_string(),
        }],
    )
    .await;

    let available: i64 = sqlx::query_scalar("SELECT available FROM Resource WHERE uri = ?")
        .bind(url)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(available, 0);
}

#[tokio::test]
async fn ontology_directory_loads_without_diagnostics() {
    let mut registry = Registry::new();
    let report = load_dir(&mut registry, &ontology_dir()).unwrap();
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    assert!(registry.class_id("nfo:SoftwareApplication").is_some());
}
