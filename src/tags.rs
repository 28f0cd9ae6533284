//! Tag scoping: which tags are visible and creatable from a group.
//!
//! A tag with no group is global and visible everywhere. A group-scoped tag
//! is visible from its group and from every group below it.
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use tracing::{debug, info, warn};

use crate::config::GraphConfig;
use crate::db::{Database, column_time, now_timestamp, placeholders};
use crate::error::{NoteGraphError, Result, is_unique_violation};
use crate::groups::{fetch_group, load_forest, require_group};
use crate::models::{GroupId, NewTag, Tag, TagId, TagUpdate, UserId};

const TAG_COLUMNS: &str =
    "t.id, t.user_id, t.name, t.color, t.is_key, t.group_id, t.created_at, t.updated_at";

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag::from_parts(
        TagId::new(row.get(0)?),
        UserId::new(row.get(1)?),
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get::<_, Option<i64>>(5)?.map(GroupId::new),
        column_time(row, 6)?,
        column_time(row, 7)?,
    ))
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// SQL filter over `tags t` plus its bound parameters.
struct ScopeFilter {
    clause: String,
    params: Vec<i64>,
}

/// Builds the visibility filter for `scope`.
///
/// `None` means every tag the user owns. A group that does not exist degrades
/// to the global set.
fn visible_filter(
    conn: &Connection,
    config: &GraphConfig,
    user: UserId,
    scope: Option<GroupId>,
) -> Result<ScopeFilter> {
    let Some(group) = scope else {
        return Ok(ScopeFilter {
            clause: "t.user_id = ?".into(),
            params: vec![user.get()],
        });
    };

    if fetch_group(conn, user, group)?.is_none() {
        warn!(user = %user, group = %group, "group not found, falling back to global tags");
        return Ok(ScopeFilter {
            clause: "t.user_id = ? AND t.group_id IS NULL".into(),
            params: vec![user.get()],
        });
    }

    let forest = load_forest(conn, user)?;
    let lineage: Vec<i64> = forest
        .path_to(group, config.max_parent_chain)?
        .iter()
        .map(|g| g.id.get())
        .collect();

    let mut params = vec![user.get()];
    params.extend(&lineage);
    Ok(ScopeFilter {
        clause: format!(
            "t.user_id = ? AND (t.group_id IS NULL OR t.group_id IN ({}))",
            placeholders(lineage.len())
        ),
        params,
    })
}

pub(crate) fn fetch_tag(conn: &Connection, user: UserId, id: TagId) -> Result<Option<Tag>> {
    let tag = conn
        .query_row(
            &format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.id = ?1 AND t.user_id = ?2"),
            [id.get(), user.get()],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

pub(crate) fn require_tag(conn: &Connection, user: UserId, id: TagId) -> Result<Tag> {
    fetch_tag(conn, user, id)?.ok_or_else(|| NoteGraphError::not_found("Tag", id.get()))
}

/// Tag with `name` (case-insensitive) in exactly `scope`.
fn find_in_exact_scope(
    conn: &Connection,
    user: UserId,
    name: &str,
    scope: Option<GroupId>,
) -> Result<Option<Tag>> {
    let tag = conn
        .query_row(
            &format!(
                "SELECT {TAG_COLUMNS} FROM tags t
                 WHERE t.user_id = ?1 AND t.group_id IS ?2 AND t.name = ?3 COLLATE NOCASE"
            ),
            rusqlite::params![user.get(), scope.map(GroupId::get), name],
            tag_from_row,
        )
        .optional()?;
    Ok(tag)
}

fn normalize_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NoteGraphError::InvalidArgument(
            "tag name cannot be empty".into(),
        ));
    }
    Ok(name)
}

/// A group-scoped name clashes with the same name in the group or globally;
/// a global name only clashes with another global tag.
fn check_name_free(
    conn: &Connection,
    user: UserId,
    name: &str,
    scope: Option<GroupId>,
    ignore: Option<TagId>,
) -> Result<()> {
    let mut clashes = vec![find_in_exact_scope(conn, user, name, scope)?];
    if scope.is_some() {
        clashes.push(find_in_exact_scope(conn, user, name, None)?);
    }
    if clashes
        .into_iter()
        .flatten()
        .any(|tag| Some(tag.id()) != ignore)
    {
        return Err(NoteGraphError::duplicate_name("Tag", name));
    }
    Ok(())
}

pub(crate) fn insert_tag(
    conn: &Connection,
    user: UserId,
    spec: &NewTag,
    scope: Option<GroupId>,
) -> Result<Tag> {
    let name = normalize_name(&spec.name)?;
    if let Some(group) = scope {
        require_group(conn, user, group)?;
    }
    check_name_free(conn, user, name, scope, None)?;

    let now = now_timestamp();
    conn.execute(
        "INSERT INTO tags (user_id, name, color, is_key, group_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        rusqlite::params![
            user.get(),
            name,
            spec.color,
            spec.is_key,
            scope.map(GroupId::get),
            now
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            NoteGraphError::duplicate_name("Tag", name)
        } else {
            e.into()
        }
    })?;

    let id = TagId::new(conn.last_insert_rowid());
    info!(user = %user, tag = %id, name, scope = ?scope, "created tag");
    require_tag(conn, user, id)
}

/// Finds a tag usable from `scope` by name, or creates it in `scope`.
///
/// Lookup order is the exact scope, then the nearest ancestor group, then
/// the global set.
pub(crate) fn find_or_create_tag(
    conn: &Connection,
    config: &GraphConfig,
    user: UserId,
    name: &str,
    color: Option<&str>,
    scope: Option<GroupId>,
) -> Result<Tag> {
    let name = normalize_name(name)?;
    if let Some(tag) = find_in_exact_scope(conn, user, name, scope)? {
        return Ok(tag);
    }

    if let Some(group) = scope
        && fetch_group(conn, user, group)?.is_some()
    {
        let forest = load_forest(conn, user)?;
        let lineage = forest.path_to(group, config.max_parent_chain)?;
        for ancestor in lineage.iter().rev().skip(1) {
            if let Some(tag) = find_in_exact_scope(conn, user, name, Some(ancestor.id))? {
                return Ok(tag);
            }
        }
        if let Some(tag) = find_in_exact_scope(conn, user, name, None)? {
            return Ok(tag);
        }
    }

    let mut spec = NewTag::new(name);
    spec.color = color.map(str::to_string);
    insert_tag(conn, user, &spec, scope)
}

/// Tag visibility and lifecycle across group scopes.
pub struct TagScopeResolver<'a> {
    db: &'a Database,
    config: &'a GraphConfig,
}

impl<'a> TagScopeResolver<'a> {
    pub fn new(db: &'a Database, config: &'a GraphConfig) -> Self {
        Self { db, config }
    }

    pub fn get_tag(&self, user: UserId, id: TagId) -> Result<Option<Tag>> {
        fetch_tag(self.db.connection(), user, id)
    }

    /// Tags usable from `scope`, ordered by name.
    ///
    /// `None` returns every tag of the user. `Some(g)` returns global tags
    /// plus tags scoped to `g` or any of its ancestors.
    pub fn tags_visible_in(&self, user: UserId, scope: Option<GroupId>) -> Result<Vec<Tag>> {
        let conn = self.db.connection();
        let filter = visible_filter(conn, self.config, user, scope)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TAG_COLUMNS} FROM tags t WHERE {} ORDER BY t.name COLLATE NOCASE",
            filter.clause
        ))?;
        let tags = collect(stmt.query_map(params_from_iter(filter.params), tag_from_row)?)?;
        debug!(user = %user, scope = ?scope, count = tags.len(), "resolved visible tags");
        Ok(tags)
    }

    /// Tags scoped to exactly `group`.
    pub fn group_specific_tags(&self, user: UserId, group: GroupId) -> Result<Vec<Tag>> {
        self.exact_scope(user, Some(group))
    }

    pub fn global_tags(&self, user: UserId) -> Result<Vec<Tag>> {
        self.exact_scope(user, None)
    }

    fn exact_scope(&self, user: UserId, scope: Option<GroupId>) -> Result<Vec<Tag>> {
        let mut stmt = self.db.connection().prepare(&format!(
            "SELECT {TAG_COLUMNS} FROM tags t
             WHERE t.user_id = ?1 AND t.group_id IS ?2
             ORDER BY t.name COLLATE NOCASE"
        ))?;
        collect(stmt.query_map(
            rusqlite::params![user.get(), scope.map(GroupId::get)],
            tag_from_row,
        )?)
    }

    /// Creates a tag in `scope`.
    ///
    /// Fails with `DuplicateName` if the name is taken in that scope, or for a
    /// group scope, taken globally.
    pub fn create_in_scope(
        &self,
        user: UserId,
        spec: NewTag,
        scope: Option<GroupId>,
    ) -> Result<Tag> {
        self.db
            .transaction(|conn| insert_tag(conn, user, &spec, scope))
    }

    /// Returns the tag named `name` usable from `scope`, creating it if needed.
    pub fn find_or_create(
        &self,
        user: UserId,
        name: &str,
        color: Option<&str>,
        scope: Option<GroupId>,
    ) -> Result<Tag> {
        self.db
            .transaction(|conn| find_or_create_tag(conn, self.config, user, name, color, scope))
    }

    /// Re-scopes a tag. Note associations are left as they are.
    pub fn move_to_group(
        &self,
        user: UserId,
        tag: TagId,
        scope: Option<GroupId>,
    ) -> Result<Tag> {
        self.db.transaction(|conn| {
            let current = require_tag(conn, user, tag)?;
            if let Some(group) = scope {
                require_group(conn, user, group)?;
            }
            check_name_free(conn, user, current.name(), scope, Some(tag))?;

            conn.execute(
                "UPDATE tags SET group_id = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![scope.map(GroupId::get), now_timestamp(), tag.get()],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    NoteGraphError::duplicate_name("Tag", current.name())
                } else {
                    e.into()
                }
            })?;
            info!(user = %user, tag = %tag, scope = ?scope, "moved tag");
            require_tag(conn, user, tag)
        })
    }

    /// Moves a tag to the global scope.
    pub fn make_tag_global(&self, user: UserId, tag: TagId) -> Result<Tag> {
        self.move_to_group(user, tag, None)
    }

    /// True if a tag named `name` exists in `group` or globally.
    pub fn tag_exists_in_group(&self, user: UserId, name: &str, group: GroupId) -> Result<bool> {
        let conn = self.db.connection();
        Ok(find_in_exact_scope(conn, user, name, Some(group))?.is_some()
            || find_in_exact_scope(conn, user, name, None)?.is_some())
    }

    /// Tag named `name` in exactly `scope`.
    pub fn find_tag_in_group(
        &self,
        user: UserId,
        name: &str,
        scope: Option<GroupId>,
    ) -> Result<Option<Tag>> {
        find_in_exact_scope(self.db.connection(), user, name.trim(), scope)
    }

    pub fn update_tag(&self, user: UserId, id: TagId, update: TagUpdate) -> Result<Tag> {
        self.db.transaction(|conn| {
            let current = require_tag(conn, user, id)?;

            let name = match &update.name {
                Some(name) => {
                    let name = normalize_name(name)?;
                    check_name_free(conn, user, name, current.group_id(), Some(id))?;
                    name.to_string()
                }
                None => current.name().to_string(),
            };
            let color = update.color.or_else(|| current.color().map(str::to_string));
            let is_key = update.is_key.unwrap_or(current.is_key());

            conn.execute(
                "UPDATE tags SET name = ?1, color = ?2, is_key = ?3, updated_at = ?4 WHERE id = ?5",
                rusqlite::params![name, color, is_key, now_timestamp(), id.get()],
            )?;
            info!(user = %user, tag = %id, "updated tag");
            require_tag(conn, user, id)
        })
    }

    /// Deletes a tag and its note associations.
    pub fn delete_tag(&self, user: UserId, id: TagId) -> Result<()> {
        self.db.transaction(|conn| {
            require_tag(conn, user, id)?;
            conn.execute("DELETE FROM tags WHERE id = ?1", [id.get()])?;
            info!(user = %user, tag = %id, "deleted tag");
            Ok(())
        })
    }

    /// Visible tags with their usage counts, most used first, ties by name.
    pub fn popular_in(&self, user: UserId, scope: Option<GroupId>) -> Result<Vec<(Tag, i64)>> {
        let mut counted = self.usage_in(user, scope)?;
        counted.retain(|(_, uses)| *uses > 0);
        counted.sort_by(|(a, a_uses), (b, b_uses)| {
            b_uses
                .cmp(a_uses)
                .then_with(|| a.name().to_ascii_lowercase().cmp(&b.name().to_ascii_lowercase()))
        });
        Ok(counted)
    }

    /// Visible tags not attached to any note.
    pub fn unused_in(&self, user: UserId, scope: Option<GroupId>) -> Result<Vec<Tag>> {
        Ok(self
            .usage_in(user, scope)?
            .into_iter()
            .filter(|(_, uses)| *uses == 0)
            .map(|(tag, _)| tag)
            .collect())
    }

    fn usage_in(&self, user: UserId, scope: Option<GroupId>) -> Result<Vec<(Tag, i64)>> {
        let conn = self.db.connection();
        let filter = visible_filter(conn, self.config, user, scope)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TAG_COLUMNS}, COUNT(nt.note_id)
             FROM tags t
             LEFT JOIN note_tags nt ON nt.tag_id = t.id
             WHERE {}
             GROUP BY t.id
             ORDER BY t.name COLLATE NOCASE",
            filter.clause
        ))?;
        collect(stmt.query_map(params_from_iter(filter.params), |row| {
            Ok((tag_from_row(row)?, row.get(8)?))
        })?)
    }

    /// Removes global tags that no note uses. Returns the number deleted.
    pub fn delete_unused_global(&self, user: UserId) -> Result<usize> {
        self.db.transaction(|conn| {
            let deleted = conn.execute(
                "DELETE FROM tags
                 WHERE user_id = ?1 AND group_id IS NULL
                   AND NOT EXISTS (SELECT 1 FROM note_tags nt WHERE nt.tag_id = tags.id)",
                [user.get()],
            )?;
            info!(user = %user, deleted, "deleted unused global tags");
            Ok(deleted)
        })
    }
}
