use std::collections::{BTreeSet, HashSet};

use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::db::{Database, column_time, now_timestamp, placeholders};
use crate::error::{NoteGraphError, Result};
use crate::graph_query::GraphQuery;
use crate::groups::{GroupHierarchy, ensure_default_group, load_forest, require_group};
use crate::links::NoteLinkGraph;
use crate::models::{
    Attachment, AttachmentId, GroupId, NewAttachment, NewNote, Note, NoteBuilder, NoteId, NoteTag,
    Tag, TagId, UserId,
};
use crate::tags::{TagScopeResolver, find_or_create_tag, require_tag};

/// Service layer providing note management operations.
///
/// NoteService owns a Database instance and the traversal limits, and hands
/// out the group, tag, link and graph-query components that borrow them.
/// Every operation takes the acting user explicitly.
///
/// # Examples
///
/// ```
/// use notegraph::{Database, NewNote, NoteService, UserId};
///
/// # fn main() -> notegraph::Result<()> {
/// let service = NoteService::new(Database::in_memory()?);
/// let user = UserId::new(1);
///
/// let note = service.create_note(user, NewNote::new("Intro", "first note"))?;
/// let group = service.groups().get_group(user, note.group_id())?.expect("default group");
/// assert_eq!(group.name, "Default");
/// # Ok(())
/// # }
/// ```
pub struct NoteService {
    db: Database,
    config: GraphConfig,
}

impl NoteService {
    /// Creates a service with default traversal limits.
    pub fn new(db: Database) -> Self {
        Self::with_config(db, GraphConfig::default())
    }

    pub fn with_config(db: Database, config: GraphConfig) -> Self {
        Self { db, config }
    }

    /// Returns a reference to the underlying database.
    ///
    /// Useful for testing or advanced operations that need direct database access.
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn groups(&self) -> GroupHierarchy<'_> {
        GroupHierarchy::new(&self.db, &self.config)
    }

    pub fn tags(&self) -> TagScopeResolver<'_> {
        TagScopeResolver::new(&self.db, &self.config)
    }

    pub fn links(&self) -> NoteLinkGraph<'_> {
        NoteLinkGraph::new(&self.db, &self.config)
    }

    pub fn graph_query(&self) -> GraphQuery<'_> {
        GraphQuery::new(&self.db, &self.config)
    }

    /// Creates a note.
    ///
    /// A note without a group lands in the user's "Default" group, which is
    /// created on first use. Tag names are resolved in the note's group scope
    /// and created there when no visible tag matches.
    pub fn create_note(&self, user: UserId, spec: NewNote) -> Result<Note> {
        let title = spec.title.trim();
        if title.is_empty() {
            return Err(NoteGraphError::InvalidArgument(
                "note title cannot be empty".into(),
            ));
        }

        self.db.transaction(|conn| {
            let group = match spec.group_id {
                Some(id) => require_group(conn, user, id)?,
                None => ensure_default_group(conn, user)?,
            };

            let now = now_timestamp();
            conn.execute(
                "INSERT INTO notes (user_id, title, content, group_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![user.get(), title, spec.content, group.id.get(), now],
            )?;
            let note_id = NoteId::new(conn.last_insert_rowid());

            let mut seen = HashSet::new();
            for name in &spec.tags {
                let name = name.trim();
                if name.is_empty() || !seen.insert(name.to_ascii_lowercase()) {
                    continue;
                }
                let tag = find_or_create_tag(conn, &self.config, user, name, None, Some(group.id))?;
                attach_tag(conn, note_id, tag.id())?;
            }

            info!(user = %user, note = %note_id, group = %group.id, "created note");
            load_note(conn, user, note_id)
        })
    }

    pub fn get_note(&self, user: UserId, id: NoteId) -> Result<Option<Note>> {
        fetch_note(self.db.connection(), user, id)
    }

    /// Replaces title and/or content. `None` leaves a field unchanged.
    pub fn update_note(
        &self,
        user: UserId,
        id: NoteId,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<Note> {
        self.db.transaction(|conn| {
            let current = load_note(conn, user, id)?;
            let title = match title.map(str::trim) {
                Some("") => {
                    return Err(NoteGraphError::InvalidArgument(
                        "note title cannot be empty".into(),
                    ));
                }
                Some(title) => title,
                None => current.title(),
            };
            let content = content.unwrap_or(current.content());

            conn.execute(
                "UPDATE notes SET title = ?1, content = ?2, updated_at = ?3 WHERE id = ?4",
                rusqlite::params![title, content, now_timestamp(), id.get()],
            )?;
            info!(user = %user, note = %id, "updated note");
            load_note(conn, user, id)
        })
    }

    /// Deletes a note together with its tag associations, links in both
    /// directions and attachment records.
    pub fn delete_note(&self, user: UserId, id: NoteId) -> Result<()> {
        self.db.transaction(|conn| {
            require_note(conn, user, id)?;
            conn.execute("DELETE FROM notes WHERE id = ?1", [id.get()])?;
            info!(user = %user, note = %id, "deleted note");
            Ok(())
        })
    }

    pub fn list_notes(&self, user: UserId, options: ListNotesOptions) -> Result<Vec<Note>> {
        let conn = self.db.connection();

        let order_clause = match options.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let limit_clause = options
            .limit
            .map(|limit| format!(" LIMIT {limit}"))
            .unwrap_or_default();

        let mut params = vec![user.get()];
        let group_clause = match options.group {
            Some(group) => {
                params.push(group.get());
                " AND group_id = ?"
            }
            None => "",
        };

        let query = format!(
            "SELECT id FROM notes WHERE user_id = ?{group_clause}
             ORDER BY created_at {order_clause}, id {order_clause}{limit_clause}"
        );
        let ids = query_ids(conn, &query, params)?;
        load_notes(conn, user, &ids)
    }

    /// Attaches an existing tag to a note. Attaching twice is a no-op.
    pub fn add_tag_to_note(&self, user: UserId, note: NoteId, tag: TagId) -> Result<()> {
        self.db.transaction(|conn| {
            require_note(conn, user, note)?;
            require_tag(conn, user, tag)?;
            attach_tag(conn, note, tag)?;
            info!(user = %user, %note, %tag, "tagged note");
            Ok(())
        })
    }

    /// Resolves `name` in the note's group scope, creating the tag if needed,
    /// and attaches it.
    pub fn tag_note(&self, user: UserId, note: NoteId, name: &str) -> Result<Tag> {
        self.db.transaction(|conn| {
            let current = load_note(conn, user, note)?;
            let tag = find_or_create_tag(
                conn,
                &self.config,
                user,
                name,
                None,
                Some(current.group_id()),
            )?;
            attach_tag(conn, note, tag.id())?;
            info!(user = %user, %note, tag = %tag.id(), "tagged note");
            Ok(tag)
        })
    }

    /// Detaches a tag; `NotFound` if the note does not carry it.
    pub fn remove_tag_from_note(&self, user: UserId, note: NoteId, tag: TagId) -> Result<()> {
        self.db.transaction(|conn| {
            require_note(conn, user, note)?;
            let removed = conn.execute(
                "DELETE FROM note_tags WHERE note_id = ?1 AND tag_id = ?2",
                [note.get(), tag.get()],
            )?;
            if removed == 0 {
                return Err(NoteGraphError::not_found("NoteTag", tag.get()));
            }
            info!(user = %user, %note, %tag, "untagged note");
            Ok(())
        })
    }

    /// Tags on a note, ordered by name.
    pub fn tags_of_note(&self, user: UserId, note: NoteId) -> Result<Vec<Tag>> {
        let conn = self.db.connection();
        let current = load_note(conn, user, note)?;

        let mut tags = Vec::with_capacity(current.tags().len());
        for note_tag in current.tags() {
            tags.push(require_tag(conn, user, note_tag.tag_id())?);
        }
        tags.sort_by_key(|t| t.name().to_ascii_lowercase());
        Ok(tags)
    }

    /// Moves a note into another group.
    pub fn assign_note_to_group(&self, user: UserId, note: NoteId, group: GroupId) -> Result<Note> {
        self.db.transaction(|conn| {
            require_note(conn, user, note)?;
            require_group(conn, user, group)?;
            conn.execute(
                "UPDATE notes SET group_id = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![group.get(), now_timestamp(), note.get()],
            )?;
            info!(user = %user, %note, %group, "moved note");
            load_note(conn, user, note)
        })
    }

    /// Notes in `group`, or in `group` and every group below it.
    pub fn notes_in_group(
        &self,
        user: UserId,
        group: GroupId,
        include_sub_groups: bool,
    ) -> Result<Vec<Note>> {
        let conn = self.db.connection();
        let groups = group_scope(conn, user, group, include_sub_groups)?;
        let ids = note_ids_in_groups(conn, user, Some(&groups))?;
        load_notes(conn, user, &ids)
    }

    /// Notes carrying every one of `names` (case-insensitive).
    pub fn notes_with_all_tags(&self, user: UserId, names: &[&str]) -> Result<Vec<Note>> {
        self.notes_with_tags(user, names, TagMatch::All)
    }

    /// Notes carrying at least one of `names` (case-insensitive).
    pub fn notes_with_any_tags(&self, user: UserId, names: &[&str]) -> Result<Vec<Note>> {
        self.notes_with_tags(user, names, TagMatch::Any)
    }

    fn notes_with_tags(&self, user: UserId, names: &[&str], mode: TagMatch) -> Result<Vec<Note>> {
        let conn = self.db.connection();
        let ids: Vec<NoteId> = note_ids_with_tags(conn, user, names, mode)?
            .into_iter()
            .collect();
        load_notes(conn, user, &ids)
    }

    /// Records attachment metadata for a note.
    pub fn add_attachment(
        &self,
        user: UserId,
        note: NoteId,
        spec: NewAttachment,
    ) -> Result<Attachment> {
        if spec.file_name.trim().is_empty() {
            return Err(NoteGraphError::InvalidArgument(
                "attachment file name cannot be empty".into(),
            ));
        }
        self.db.transaction(|conn| {
            require_note(conn, user, note)?;
            conn.execute(
                "INSERT INTO note_attachments
                 (note_id, file_name, content_type, size_bytes, storage_path, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    note.get(),
                    spec.file_name.trim(),
                    spec.content_type,
                    spec.size_bytes,
                    spec.storage_path,
                    now_timestamp()
                ],
            )?;
            let id = AttachmentId::new(conn.last_insert_rowid());
            info!(user = %user, %note, attachment = %id, "added attachment");
            fetch_attachment(conn, user, id)?
                .ok_or_else(|| NoteGraphError::not_found("Attachment", id.get()))
        })
    }

    pub fn attachments_of(&self, user: UserId, note: NoteId) -> Result<Vec<Attachment>> {
        let conn = self.db.connection();
        require_note(conn, user, note)?;
        let mut stmt = conn.prepare(
            "SELECT id, note_id, file_name, content_type, size_bytes, storage_path, created_at
             FROM note_attachments WHERE note_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([note.get()], attachment_from_row)?;

        let mut attachments = Vec::new();
        for row in rows {
            attachments.push(row?);
        }
        Ok(attachments)
    }

    pub fn delete_attachment(&self, user: UserId, id: AttachmentId) -> Result<()> {
        self.db.transaction(|conn| {
            fetch_attachment(conn, user, id)?
                .ok_or_else(|| NoteGraphError::not_found("Attachment", id.get()))?;
            conn.execute("DELETE FROM note_attachments WHERE id = ?1", [id.get()])?;
            info!(user = %user, attachment = %id, "deleted attachment");
            Ok(())
        })
    }
}

/// How a set of tag names filters notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagMatch {
    /// At least one of the names.
    #[default]
    Any,
    /// Every one of the names.
    All,
}

/// Sort order for listing notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest notes first (ascending by creation time)
    Ascending,
    /// Newest notes first (descending by creation time)
    #[default]
    Descending,
}

/// Options for listing notes.
///
/// # Examples
///
/// ```
/// use notegraph::{GroupId, ListNotesOptions};
///
/// // Newest first, no limit, every group
/// let options = ListNotesOptions::default();
///
/// // The ten most recent notes in one group
/// let options = ListNotesOptions {
///     limit: Some(10),
///     group: Some(GroupId::new(3)),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListNotesOptions {
    /// Maximum number of notes to return. None means no limit.
    pub limit: Option<usize>,

    /// Restrict to notes directly in this group.
    pub group: Option<GroupId>,

    /// Sort order for notes. Defaults to Descending (newest first).
    pub order: SortOrder,
}

fn query_ids(conn: &Connection, query: &str, params: Vec<i64>) -> Result<Vec<NoteId>> {
    let mut stmt = conn.prepare(query)?;
    let rows = stmt.query_map(params_from_iter(params), |row| row.get::<_, i64>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(NoteId::new(row?));
    }
    Ok(ids)
}

fn attach_tag(conn: &Connection, note: NoteId, tag: TagId) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO note_tags (note_id, tag_id, created_at) VALUES (?1, ?2, ?3)",
        [note.get(), tag.get(), now_timestamp()],
    )?;
    Ok(())
}

pub(crate) fn fetch_note(conn: &Connection, user: UserId, id: NoteId) -> Result<Option<Note>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, title, content, group_id, created_at, updated_at
             FROM notes WHERE id = ?1 AND user_id = ?2",
            [id.get(), user.get()],
            |row| {
                Ok(NoteBuilder::new()
                    .id(NoteId::new(row.get(0)?))
                    .user_id(UserId::new(row.get(1)?))
                    .title(row.get::<_, String>(2)?)
                    .content(row.get::<_, String>(3)?)
                    .group_id(GroupId::new(row.get(4)?))
                    .created_at(column_time(row, 5)?)
                    .updated_at(column_time(row, 6)?))
            },
        )
        .optional()?;

    let Some(builder) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT tag_id, created_at FROM note_tags WHERE note_id = ?1 ORDER BY created_at, tag_id",
    )?;
    let rows = stmt.query_map([id.get()], |row| {
        Ok(NoteTag::new(TagId::new(row.get(0)?), column_time(row, 1)?))
    })?;
    let mut tags = Vec::new();
    for row in rows {
        tags.push(row?);
    }

    Ok(Some(builder.tags(tags).build()))
}

fn load_note(conn: &Connection, user: UserId, id: NoteId) -> Result<Note> {
    fetch_note(conn, user, id)?.ok_or_else(|| NoteGraphError::not_found("Note", id.get()))
}

/// Fails with `NotFound` unless the note exists and belongs to `user`.
pub(crate) fn require_note(conn: &Connection, user: UserId, id: NoteId) -> Result<()> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM notes WHERE id = ?1 AND user_id = ?2",
            [id.get(), user.get()],
            |_| Ok(()),
        )
        .optional()?;
    exists.ok_or_else(|| NoteGraphError::not_found("Note", id.get()))
}

/// Loads notes in the order given, skipping ids that no longer resolve.
pub(crate) fn load_notes(conn: &Connection, user: UserId, ids: &[NoteId]) -> Result<Vec<Note>> {
    let mut notes = Vec::with_capacity(ids.len());
    for &id in ids {
        if let Some(note) = fetch_note(conn, user, id)? {
            notes.push(note);
        }
    }
    debug!(user = %user, count = notes.len(), "loaded notes");
    Ok(notes)
}

/// `group` alone, or `group` followed by all of its descendants.
pub(crate) fn group_scope(
    conn: &Connection,
    user: UserId,
    group: GroupId,
    include_sub_groups: bool,
) -> Result<Vec<GroupId>> {
    require_group(conn, user, group)?;
    let mut groups = vec![group];
    if include_sub_groups {
        groups.extend(load_forest(conn, user)?.descendants(group));
    }
    Ok(groups)
}

/// Ids of the user's notes, oldest first. `Some(groups)` restricts to those groups.
pub(crate) fn note_ids_in_groups(
    conn: &Connection,
    user: UserId,
    groups: Option<&[GroupId]>,
) -> Result<Vec<NoteId>> {
    let mut params = vec![user.get()];
    let group_clause = match groups {
        Some([]) => return Ok(Vec::new()),
        Some(groups) => {
            params.extend(groups.iter().map(|g| g.get()));
            format!(" AND group_id IN ({})", placeholders(groups.len()))
        }
        None => String::new(),
    };
    query_ids(
        conn,
        &format!("SELECT id FROM notes WHERE user_id = ?{group_clause} ORDER BY created_at, id"),
        params,
    )
}

/// Ids of notes matching `names` under `mode`. Empty `names` matches nothing.
pub(crate) fn note_ids_with_tags(
    conn: &Connection,
    user: UserId,
    names: &[&str],
    mode: TagMatch,
) -> Result<BTreeSet<NoteId>> {
    // Folded the way COLLATE NOCASE folds (ASCII only) so dedup and matching agree.
    let mut seen = HashSet::new();
    let wanted: Vec<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty() && seen.insert(n.to_ascii_lowercase()))
        .collect();
    if wanted.is_empty() {
        return Ok(BTreeSet::new());
    }

    let having = match mode {
        TagMatch::Any => String::new(),
        TagMatch::All => format!(
            " HAVING COUNT(DISTINCT t.name COLLATE NOCASE) = {}",
            wanted.len()
        ),
    };
    let query = format!(
        "SELECT n.id
         FROM notes n
         JOIN note_tags nt ON nt.note_id = n.id
         JOIN tags t ON t.id = nt.tag_id
         WHERE n.user_id = ? AND t.name COLLATE NOCASE IN ({})
         GROUP BY n.id{having}",
        placeholders(wanted.len())
    );

    let user_id = user.get();
    let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(wanted.len() + 1);
    params.push(&user_id);
    for name in &wanted {
        params.push(name);
    }
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params_from_iter(params), |row| row.get::<_, i64>(0))?;

    let mut ids = BTreeSet::new();
    for row in rows {
        ids.insert(NoteId::new(row?));
    }
    Ok(ids)
}

fn attachment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: AttachmentId::new(row.get(0)?),
        note_id: NoteId::new(row.get(1)?),
        file_name: row.get(2)?,
        content_type: row.get(3)?,
        size_bytes: row.get(4)?,
        storage_path: row.get(5)?,
        created_at: column_time(row, 6)?,
    })
}

fn fetch_attachment(conn: &Connection, user: UserId, id: AttachmentId) -> Result<Option<Attachment>> {
    let attachment = conn
        .query_row(
            "SELECT a.id, a.note_id, a.file_name, a.content_type, a.size_bytes, a.storage_path, a.created_at
             FROM note_attachments a
             JOIN notes n ON n.id = a.note_id
             WHERE a.id = ?1 AND n.user_id = ?2",
            [id.get(), user.get()],
            attachment_from_row,
        )
        .optional()?;
    Ok(attachment)
}
