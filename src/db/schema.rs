/// Base schema for the notes application.
///
/// Uses CREATE TABLE/INDEX IF NOT EXISTS for idempotent execution.
/// Cascades are declared here so that deleting a note or tag cleans up its
/// associations without application code.
pub const INITIAL_SCHEMA: &str = r#"
-- note_groups: a per-user forest linked through parent_group_id
CREATE TABLE IF NOT EXISTS note_groups (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    color TEXT,
    icon TEXT,
    parent_group_id INTEGER REFERENCES note_groups(id) ON DELETE RESTRICT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (user_id, name)
);

-- Notes: every note belongs to exactly one group
CREATE TABLE IF NOT EXISTS notes (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    group_id INTEGER NOT NULL REFERENCES note_groups(id) ON DELETE RESTRICT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Tags: group_id NULL means global
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    color TEXT,
    is_key INTEGER NOT NULL DEFAULT 0,
    group_id INTEGER REFERENCES note_groups(id) ON DELETE CASCADE,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Junction table: links notes to tags (many-to-many)
CREATE TABLE IF NOT EXISTS note_tags (
    note_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (note_id, tag_id),
    FOREIGN KEY (note_id) REFERENCES notes(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

-- Directed typed edges between notes
CREATE TABLE IF NOT EXISTS note_links (
    id INTEGER PRIMARY KEY,
    source_note_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
    target_note_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
    link_type TEXT NOT NULL,
    weight INTEGER NOT NULL DEFAULT 1,
    is_bidirectional INTEGER NOT NULL DEFAULT 0,
    metadata TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (source_note_id, target_note_id, link_type),
    CHECK (source_note_id <> target_note_id)
);

-- Tag names are unique per (user, scope), case-insensitively
CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_scope_name
    ON tags(user_id, COALESCE(group_id, 0), name COLLATE NOCASE);

CREATE INDEX IF NOT EXISTS idx_groups_parent ON note_groups(parent_group_id);
CREATE INDEX IF NOT EXISTS idx_notes_user ON notes(user_id);
CREATE INDEX IF NOT EXISTS idx_notes_group ON notes(group_id);
CREATE INDEX IF NOT EXISTS idx_notes_created ON notes(created_at);
CREATE INDEX IF NOT EXISTS idx_tags_group ON tags(group_id);
CREATE INDEX IF NOT EXISTS idx_note_tags_note ON note_tags(note_id);
CREATE INDEX IF NOT EXISTS idx_note_tags_tag ON note_tags(tag_id);
CREATE INDEX IF NOT EXISTS idx_note_links_source ON note_links(source_note_id);
CREATE INDEX IF NOT EXISTS idx_note_links_target ON note_links(target_note_id);
"#;

/// Attachment metadata table, added after the base schema.
pub const ATTACHMENTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS note_attachments (
    id INTEGER PRIMARY KEY,
    note_id INTEGER NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
    file_name TEXT NOT NULL,
    content_type TEXT,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    storage_path TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_note_attachments_note ON note_attachments(note_id);
"#;

/// Index for link-type statistics and type-filtered queries.
pub const LINK_TYPE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_note_links_type ON note_links(link_type);
"#;
