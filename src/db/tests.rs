use super::*;
use tempfile::tempdir;

fn names(db: &Database, kind: &str) -> Vec<String> {
    db.connection()
        .prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
        .unwrap()
        .query_map([kind], |row| row.get(0))
        .unwrap()
        .filter_map(|r| r.ok())
        .collect()
}

fn insert_group(db: &Database, id: i64, parent: Option<i64>) {
    db.connection()
        .execute(
            "INSERT INTO note_groups (id, user_id, name, parent_group_id, created_at, updated_at)
             VALUES (?1, 1, 'g' || ?1, ?2, 0, 0)",
            rusqlite::params![id, parent],
        )
        .unwrap();
}

fn insert_note(db: &Database, id: i64, group: i64) {
    db.connection()
        .execute(
            "INSERT INTO notes (id, user_id, title, group_id, created_at, updated_at)
             VALUES (?1, 1, 'n' || ?1, ?2, 0, 0)",
            [id, group],
        )
        .unwrap();
}

#[test]
fn in_memory_opens_successfully() {
    assert!(Database::in_memory().is_ok());
}

#[test]
fn schema_tables_exist() {
    let db = Database::in_memory().unwrap();
    let tables = names(&db, "table");

    for table in [
        "note_groups",
        "notes",
        "tags",
        "note_tags",
        "note_links",
        "note_attachments",
        "schema_migrations",
    ] {
        assert!(tables.contains(&table.to_string()), "missing table {table}");
    }
}

#[test]
fn schema_indexes_exist() {
    let db = Database::in_memory().unwrap();
    let indexes = names(&db, "index");

    for index in [
        "idx_tags_scope_name",
        "idx_note_links_source",
        "idx_note_links_target",
        "idx_note_links_type",
        "idx_note_attachments_note",
    ] {
        assert!(indexes.contains(&index.to_string()), "missing index {index}");
    }
}

#[test]
fn foreign_keys_enabled() {
    let db = Database::in_memory().unwrap();

    let fk_enabled: i32 = db
        .connection()
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .unwrap();

    assert_eq!(fk_enabled, 1);
}

#[test]
fn all_migrations_recorded() {
    let db = Database::in_memory().unwrap();
    let applied = applied_migrations(db.connection()).unwrap();

    let versions: Vec<u32> = applied.iter().map(|(v, _, _)| *v).collect();
    let expected: Vec<u32> = MIGRATIONS.iter().map(|m| m.version).collect();
    assert_eq!(versions, expected);
}

#[test]
fn open_creates_database_file() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");

    assert!(Database::open(&db_path).is_ok());
    assert!(db_path.exists());
}

#[test]
fn reopen_is_idempotent() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test.db");

    {
        let db = Database::open(&db_path).unwrap();
        insert_group(&db, 1, None);
        insert_note(&db, 1, 1);
    }

    let db2 = Database::open(&db_path).unwrap();
    let count: i32 = db2
        .connection()
        .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(applied_migrations(db2.connection()).unwrap().len(), MIGRATIONS.len());
}

#[test]
fn deleting_note_cascades_to_links_tags_and_attachments() {
    let db = Database::in_memory().unwrap();
    let conn = db.connection();
    insert_group(&db, 1, None);
    insert_note(&db, 1, 1);
    insert_note(&db, 2, 1);
    conn.execute(
        "INSERT INTO tags (id, user_id, name, created_at, updated_at) VALUES (1, 1, 't', 0, 0)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO note_tags (note_id, tag_id, created_at) VALUES (1, 1, 0)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO note_links (source_note_id, target_note_id, link_type, created_at, updated_at)
         VALUES (2, 1, 'EXTENDS', 0, 0)",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO note_attachments (note_id, file_name, storage_path, created_at)
         VALUES (1, 'a.pdf', '/files/a.pdf', 0)",
        [],
    )
    .unwrap();

    conn.execute("DELETE FROM notes WHERE id = 1", []).unwrap();

    for table in ["note_tags", "note_links", "note_attachments"] {
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0, "{table} should be empty after cascade");
    }
}

#[test]
fn group_with_notes_cannot_be_deleted_at_storage_level() {
    let db = Database::in_memory().unwrap();
    insert_group(&db, 1, None);
    insert_note(&db, 1, 1);

    let result = db
        .connection()
        .execute("DELETE FROM note_groups WHERE id = 1", []);
    assert!(result.is_err());
}

#[test]
fn self_links_rejected_by_check_constraint() {
    let db = Database::in_memory().unwrap();
    insert_group(&db, 1, None);
    insert_note(&db, 1, 1);

    let result = db.connection().execute(
        "INSERT INTO note_links (source_note_id, target_note_id, link_type, created_at, updated_at)
         VALUES (1, 1, 'EXTENDS', 0, 0)",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn tag_names_unique_per_scope_case_insensitively() {
    let db = Database::in_memory().unwrap();
    let conn = db.connection();
    insert_group(&db, 1, None);

    let insert = |name: &str, group: Option<i64>| {
        conn.execute(
            "INSERT INTO tags (user_id, name, group_id, created_at, updated_at)
             VALUES (1, ?1, ?2, 0, 0)",
            rusqlite::params![name, group],
        )
    };

    insert("urgent", None).unwrap();
    assert!(insert("URGENT", None).is_err(), "global duplicate");
    insert("urgent", Some(1)).unwrap();
    assert!(insert("Urgent", Some(1)).is_err(), "group duplicate");
}

#[test]
fn transaction_rolls_back_on_error() {
    let db = Database::in_memory().unwrap();
    insert_group(&db, 1, None);

    let result: crate::Result<()> = db.transaction(|conn| {
        conn.execute(
            "INSERT INTO notes (user_id, title, group_id, created_at, updated_at)
             VALUES (1, 'kept?', 1, 0, 0)",
            [],
        )?;
        Err(crate::NoteGraphError::InvalidState("abort".into()))
    });
    assert!(result.is_err());

    let count: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}
