//! Group hierarchy: the per-user forest of groups.
//!
//! Groups reference their parent by id only. Every walk over the tree loads
//! the user's groups into a [`GroupForest`] and works on that index, so cycle
//! checks and ancestor paths are plain lookups bounded by
//! [`GraphConfig::max_parent_chain`].
use std::collections::{HashMap, HashSet, VecDeque};

use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::db::{Database, column_time, now_timestamp};
use crate::error::{NoteGraphError, Result, is_unique_violation};
use crate::models::{
    DEFAULT_GROUP_COLOR, DEFAULT_GROUP_ICON, DEFAULT_GROUP_NAME, DEFAULT_GROUP_OWN_ICON, Group,
    GroupId, GroupUpdate, NewGroup, UserId,
};

/// Separator used by [`GroupHierarchy::full_name`].
pub const FULL_NAME_SEPARATOR: &str = " > ";

const GROUP_COLUMNS: &str = "id, user_id, name, description, color, icon, parent_group_id, \
                             sort_order, created_at, updated_at";

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: GroupId::new(row.get(0)?),
        user_id: UserId::new(row.get(1)?),
        name: row.get(2)?,
        description: row.get(3)?,
        color: row.get(4)?,
        icon: row.get(5)?,
        parent_id: row.get::<_, Option<i64>>(6)?.map(GroupId::new),
        sort_order: row.get(7)?,
        created_at: column_time(row, 8)?,
        updated_at: column_time(row, 9)?,
    })
}

/// In-memory index over one user's groups.
///
/// Built per call from the store; holds no state between calls.
#[derive(Debug, Default)]
pub struct GroupForest {
    groups: HashMap<GroupId, Group>,
    children: HashMap<GroupId, Vec<GroupId>>,
}

impl GroupForest {
    pub fn from_groups(groups: impl IntoIterator<Item = Group>) -> Self {
        let mut forest = Self::default();
        for group in groups {
            if let Some(parent) = group.parent_id {
                forest.children.entry(parent).or_default().push(group.id);
            }
            forest.groups.insert(group.id, group);
        }
        for kids in forest.children.values_mut() {
            kids.sort();
        }
        forest
    }

    pub fn get(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.groups.contains_key(&id)
    }

    /// Path from the root down to `id`, root first.
    ///
    /// Fails with `InvalidState` if the chain exceeds `max_chain` links or
    /// revisits a group, which can only happen with corrupted data.
    pub fn path_to(&self, id: GroupId, max_chain: usize) -> Result<Vec<&Group>> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.groups.get(&id);

        while let Some(group) = current {
            if !seen.insert(group.id) || path.len() >= max_chain {
                return Err(NoteGraphError::InvalidState(format!(
                    "corrupt parent chain at group {}",
                    group.id
                )));
            }
            path.push(group);
            current = group.parent_id.and_then(|p| self.groups.get(&p));
        }

        path.reverse();
        Ok(path)
    }

    /// True if `candidate` is `ancestor` itself or lies below it.
    pub fn is_in_subtree(
        &self,
        candidate: GroupId,
        ancestor: GroupId,
        max_chain: usize,
    ) -> Result<bool> {
        Ok(self
            .path_to(candidate, max_chain)?
            .iter()
            .any(|g| g.id == ancestor))
    }

    /// All groups below `id` (not including `id`), breadth first.
    pub fn descendants(&self, id: GroupId) -> Vec<GroupId> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for &child in self.children.get(&current).into_iter().flatten() {
                if seen.insert(child) {
                    out.push(child);
                    queue.push_back(child);
                }
            }
        }
        out
    }

    /// Direct children of `id`, by id.
    pub fn children_of(&self, id: GroupId) -> &[GroupId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub(crate) fn fetch_group(conn: &Connection, user: UserId, id: GroupId) -> Result<Option<Group>> {
    let group = conn
        .query_row(
            &format!("SELECT {GROUP_COLUMNS} FROM note_groups WHERE id = ?1 AND user_id = ?2"),
            [id.get(), user.get()],
            group_from_row,
        )
        .optional()?;
    Ok(group)
}

pub(crate) fn require_group(conn: &Connection, user: UserId, id: GroupId) -> Result<Group> {
    fetch_group(conn, user, id)?.ok_or_else(|| NoteGraphError::not_found("Group", id.get()))
}

fn query_groups(
    conn: &Connection,
    where_clause: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GROUP_COLUMNS} FROM note_groups WHERE {where_clause} ORDER BY sort_order ASC, name ASC"
    ))?;
    let rows = stmt.query_map(params, group_from_row)?;

    let mut groups = Vec::new();
    for row in rows {
        groups.push(row?);
    }
    Ok(groups)
}

pub(crate) fn load_forest(conn: &Connection, user: UserId) -> Result<GroupForest> {
    let groups = query_groups(conn, "user_id = ?1", [user.get()])?;
    Ok(GroupForest::from_groups(groups))
}

fn find_by_name(conn: &Connection, user: UserId, name: &str) -> Result<Option<Group>> {
    let group = conn
        .query_row(
            &format!("SELECT {GROUP_COLUMNS} FROM note_groups WHERE user_id = ?1 AND name = ?2"),
            rusqlite::params![user.get(), name],
            group_from_row,
        )
        .optional()?;
    Ok(group)
}

pub(crate) fn insert_group(conn: &Connection, user: UserId, spec: &NewGroup) -> Result<Group> {
    let name = spec.name.trim();
    if name.is_empty() {
        return Err(NoteGraphError::InvalidArgument(
            "group name cannot be empty".into(),
        ));
    }
    if find_by_name(conn, user, name)?.is_some() {
        return Err(NoteGraphError::duplicate_name("Group", name));
    }
    if let Some(parent) = spec.parent_id {
        require_group(conn, user, parent)?;
    }

    let now = now_timestamp();
    conn.execute(
        "INSERT INTO note_groups
         (user_id, name, description, color, icon, parent_group_id, sort_order, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        rusqlite::params![
            user.get(),
            name,
            spec.description,
            spec.color,
            spec.icon,
            spec.parent_id.map(GroupId::get),
            spec.sort_order,
            now,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            NoteGraphError::duplicate_name("Group", name)
        } else {
            e.into()
        }
    })?;

    let id = GroupId::new(conn.last_insert_rowid());
    info!(user = %user, group = %id, name, "created group");
    require_group(conn, user, id)
}

/// Returns the user's "Default" group, creating it as a root on first use.
///
/// Looked up by name wherever it sits in the tree, since group names are
/// unique per user.
pub(crate) fn ensure_default_group(conn: &Connection, user: UserId) -> Result<Group> {
    if let Some(group) = find_by_name(conn, user, DEFAULT_GROUP_NAME)? {
        return Ok(group);
    }

    let spec = NewGroup::new(DEFAULT_GROUP_NAME)
        .description("Default group for your notes")
        .icon(DEFAULT_GROUP_OWN_ICON);
    insert_group(conn, user, &spec)
}

/// Group-tree operations for one database.
///
/// # Examples
///
/// ```
/// use notegraph::{Database, GraphConfig, GroupHierarchy, NewGroup, UserId};
///
/// # fn main() -> notegraph::Result<()> {
/// let db = Database::in_memory()?;
/// let config = GraphConfig::default();
/// let groups = GroupHierarchy::new(&db, &config);
/// let user = UserId::new(1);
///
/// let work = groups.create_group(user, NewGroup::new("Work"))?;
/// let rust = groups.create_group(user, NewGroup::new("Rust").parent(work.id))?;
///
/// assert_eq!(groups.full_name(user, rust.id)?, "Work > Rust");
/// # Ok(())
/// # }
/// ```
pub struct GroupHierarchy<'a> {
    db: &'a Database,
    config: &'a GraphConfig,
}

impl<'a> GroupHierarchy<'a> {
    pub fn new(db: &'a Database, config: &'a GraphConfig) -> Self {
        Self { db, config }
    }

    /// Creates a group; fails with `DuplicateName` if the user already has one
    /// with that name, `NotFound` if the parent is missing.
    pub fn create_group(&self, user: UserId, spec: NewGroup) -> Result<Group> {
        self.db.transaction(|conn| insert_group(conn, user, &spec))
    }

    /// Creates `spec` directly under `parent`.
    pub fn create_sub_group(&self, user: UserId, parent: GroupId, spec: NewGroup) -> Result<Group> {
        self.create_group(user, spec.parent(parent))
    }

    pub fn get_group(&self, user: UserId, id: GroupId) -> Result<Option<Group>> {
        debug!(user = %user, group = %id, "fetching group");
        fetch_group(self.db.connection(), user, id)
    }

    pub fn find_group_by_name(&self, user: UserId, name: &str) -> Result<Option<Group>> {
        find_by_name(self.db.connection(), user, name)
    }

    /// Returns the user's default group, creating it if needed.
    pub fn default_group(&self, user: UserId) -> Result<Group> {
        self.db.transaction(|conn| ensure_default_group(conn, user))
    }

    /// Updates descriptive fields; renames keep per-user uniqueness.
    pub fn update_group(&self, user: UserId, id: GroupId, update: GroupUpdate) -> Result<Group> {
        self.db.transaction(|conn| {
            let mut group = require_group(conn, user, id)?;

            if let Some(name) = update.name {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(NoteGraphError::InvalidArgument(
                        "group name cannot be empty".into(),
                    ));
                }
                if let Some(other) = find_by_name(conn, user, &name)?
                    && other.id != id
                {
                    return Err(NoteGraphError::duplicate_name("Group", name));
                }
                group.name = name;
            }
            if update.description.is_some() {
                group.description = update.description;
            }
            if update.color.is_some() {
                group.color = update.color;
            }
            if update.icon.is_some() {
                group.icon = update.icon;
            }
            if let Some(order) = update.sort_order {
                group.sort_order = order;
            }

            conn.execute(
                "UPDATE note_groups
                 SET name = ?1, description = ?2, color = ?3, icon = ?4, sort_order = ?5, updated_at = ?6
                 WHERE id = ?7",
                rusqlite::params![
                    group.name,
                    group.description,
                    group.color,
                    group.icon,
                    group.sort_order,
                    now_timestamp(),
                    id.get(),
                ],
            )?;
            info!(user = %user, group = %id, "updated group");
            require_group(conn, user, id)
        })
    }

    /// Re-parents a group. `None` makes it a root.
    ///
    /// Fails with `CircularReference` when `new_parent` is the group itself or
    /// one of its descendants; the stored parent is left untouched.
    pub fn move_group(
        &self,
        user: UserId,
        id: GroupId,
        new_parent: Option<GroupId>,
    ) -> Result<Group> {
        self.db.transaction(|conn| {
            require_group(conn, user, id)?;

            if let Some(parent) = new_parent {
                require_group(conn, user, parent)?;
                let forest = load_forest(conn, user)?;
                if forest.is_in_subtree(parent, id, self.config.max_parent_chain)? {
                    return Err(NoteGraphError::CircularReference {
                        group: id.get(),
                        new_parent: parent.get(),
                    });
                }
            }

            conn.execute(
                "UPDATE note_groups SET parent_group_id = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![new_parent.map(GroupId::get), now_timestamp(), id.get()],
            )?;
            info!(user = %user, group = %id, parent = ?new_parent, "moved group");
            require_group(conn, user, id)
        })
    }

    /// True iff the group exists and has no direct notes and no subgroups.
    pub fn can_delete(&self, user: UserId, id: GroupId) -> Result<bool> {
        can_delete(self.db.connection(), user, id)
    }

    /// Deletes an empty group; `InvalidState` if it still owns notes or subgroups.
    pub fn delete_group(&self, user: UserId, id: GroupId) -> Result<()> {
        self.db.transaction(|conn| {
            require_group(conn, user, id)?;
            if !can_delete(conn, user, id)? {
                return Err(NoteGraphError::InvalidState(format!(
                    "cannot delete group {id}: it contains notes or subgroups"
                )));
            }
            conn.execute("DELETE FROM note_groups WHERE id = ?1", [id.get()])?;
            info!(user = %user, group = %id, "deleted group");
            Ok(())
        })
    }

    pub fn root_groups(&self, user: UserId) -> Result<Vec<Group>> {
        query_groups(
            self.db.connection(),
            "user_id = ?1 AND parent_group_id IS NULL",
            [user.get()],
        )
    }

    /// Direct subgroups ordered by sort order then name.
    pub fn sub_groups_of(&self, user: UserId, parent: GroupId) -> Result<Vec<Group>> {
        query_groups(
            self.db.connection(),
            "user_id = ?1 AND parent_group_id = ?2",
            [user.get(), parent.get()],
        )
    }

    pub fn all_groups(&self, user: UserId) -> Result<Vec<Group>> {
        query_groups(self.db.connection(), "user_id = ?1", [user.get()])
    }

    /// Every group below `id` at any depth, breadth first.
    pub fn descendants_of(&self, user: UserId, id: GroupId) -> Result<Vec<GroupId>> {
        let conn = self.db.connection();
        require_group(conn, user, id)?;
        Ok(load_forest(conn, user)?.descendants(id))
    }

    /// Ordered path from the root to `id`, root first.
    pub fn hierarchy_of(&self, user: UserId, id: GroupId) -> Result<Vec<Group>> {
        let conn = self.db.connection();
        require_group(conn, user, id)?;
        let forest = load_forest(conn, user)?;
        let path = forest.path_to(id, self.config.max_parent_chain)?;
        Ok(path.into_iter().cloned().collect())
    }

    /// Ancestor names joined with `" > "`, e.g. `Work > Rust > Async`.
    pub fn full_name(&self, user: UserId, id: GroupId) -> Result<String> {
        let names: Vec<String> = self
            .hierarchy_of(user, id)?
            .into_iter()
            .map(|g| g.name)
            .collect();
        Ok(names.join(FULL_NAME_SEPARATOR))
    }

    /// Color of the nearest group on the path (self first) that defines one.
    pub fn display_color(&self, user: UserId, id: GroupId) -> Result<String> {
        let path = self.hierarchy_of(user, id)?;
        Ok(nearest_defined(&path, |g| g.color.as_deref())
            .unwrap_or(DEFAULT_GROUP_COLOR)
            .to_string())
    }

    /// Icon of the nearest group on the path (self first) that defines one.
    pub fn display_icon(&self, user: UserId, id: GroupId) -> Result<String> {
        let path = self.hierarchy_of(user, id)?;
        Ok(nearest_defined(&path, |g| g.icon.as_deref())
            .unwrap_or(DEFAULT_GROUP_ICON)
            .to_string())
    }

    /// Number of notes directly in the group.
    pub fn count_notes_in_group(&self, user: UserId, id: GroupId) -> Result<i64> {
        let count = self.db.connection().query_row(
            "SELECT COUNT(*) FROM notes WHERE user_id = ?1 AND group_id = ?2",
            [user.get(), id.get()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Every group with its direct note count.
    pub fn groups_with_note_counts(&self, user: UserId) -> Result<Vec<(Group, i64)>> {
        let conn = self.db.connection();
        let groups = self.all_groups(user)?;
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM notes WHERE group_id = ?1")?;

        let mut out = Vec::with_capacity(groups.len());
        for group in groups {
            let count: i64 = stmt.query_row([group.id.get()], |row| row.get(0))?;
            out.push((group, count));
        }
        Ok(out)
    }
}

fn can_delete(conn: &Connection, user: UserId, id: GroupId) -> Result<bool> {
    if fetch_group(conn, user, id)?.is_none() {
        return Ok(false);
    }
    let (notes, children): (i64, i64) = conn.query_row(
        "SELECT
             (SELECT COUNT(*) FROM notes WHERE group_id = ?1),
             (SELECT COUNT(*) FROM note_groups WHERE parent_group_id = ?1)",
        [id.get()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(notes == 0 && children == 0)
}

fn nearest_defined<'g>(path: &'g [Group], field: impl Fn(&'g Group) -> Option<&'g str>) -> Option<&'g str> {
    path.iter()
        .rev()
        .filter_map(field)
        .find(|value| !value.is_empty())
}
