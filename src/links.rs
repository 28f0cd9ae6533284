//! Link storage and the graph algorithms that run over it.
use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{Connection, OptionalExtension, Row};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::db::{Database, column_time, now_timestamp};
use crate::error::{NoteGraphError, Result, is_unique_violation};
use crate::graph::LinkGraph;
use crate::models::{LinkId, LinkType, NoteId, NoteLink, UserId, clamp_weight};
use crate::service::require_note;

const LINK_COLUMNS: &str = "l.id, l.source_note_id, l.target_note_id, l.link_type, l.weight, \
                            l.is_bidirectional, l.metadata, l.created_at, l.updated_at";

/// Restricts `note_links l` to links whose source note belongs to the user.
const OWNED: &str = "JOIN notes owner ON owner.id = l.source_note_id AND owner.user_id = ?1";

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<NoteLink> {
    let metadata = match row.get::<_, Option<String>>(6)? {
        Some(text) if !text.is_empty() => serde_json::from_str(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?,
        _ => BTreeMap::new(),
    };

    Ok(NoteLink {
        id: LinkId::new(row.get(0)?),
        source: NoteId::new(row.get(1)?),
        target: NoteId::new(row.get(2)?),
        link_type: row.get(3)?,
        weight: row.get(4)?,
        is_bidirectional: row.get(5)?,
        metadata,
        created_at: column_time(row, 7)?,
        updated_at: column_time(row, 8)?,
    })
}

fn query_links(conn: &Connection, filter: &str, params: impl rusqlite::Params) -> Result<Vec<NoteLink>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LINK_COLUMNS} FROM note_links l {OWNED} WHERE {filter} ORDER BY l.id"
    ))?;
    let rows = stmt.query_map(params, link_from_row)?;

    let mut links = Vec::new();
    for row in rows {
        links.push(row?);
    }
    Ok(links)
}

pub(crate) fn fetch_link(conn: &Connection, user: UserId, id: LinkId) -> Result<Option<NoteLink>> {
    let link = conn
        .query_row(
            &format!("SELECT {LINK_COLUMNS} FROM note_links l {OWNED} WHERE l.id = ?2"),
            [user.get(), id.get()],
            link_from_row,
        )
        .optional()?;
    Ok(link)
}

fn require_link(conn: &Connection, user: UserId, id: LinkId) -> Result<NoteLink> {
    fetch_link(conn, user, id)?.ok_or_else(|| NoteGraphError::not_found("NoteLink", id.get()))
}

fn find_link(
    conn: &Connection,
    user: UserId,
    source: NoteId,
    target: NoteId,
    link_type: LinkType,
) -> Result<Option<NoteLink>> {
    let link = conn
        .query_row(
            &format!(
                "SELECT {LINK_COLUMNS} FROM note_links l {OWNED}
                 WHERE l.source_note_id = ?2 AND l.target_note_id = ?3 AND l.link_type = ?4"
            ),
            rusqlite::params![user.get(), source.get(), target.get(), link_type],
            link_from_row,
        )
        .optional()?;
    Ok(link)
}

/// Every link owned by the user.
pub(crate) fn all_links(conn: &Connection, user: UserId) -> Result<Vec<NoteLink>> {
    query_links(conn, "1 = 1", [user.get()])
}

/// Validates and inserts one directed link.
///
/// Checks run in order: both notes exist, no self-link, no duplicate triple.
fn insert_link(
    conn: &Connection,
    user: UserId,
    source: NoteId,
    target: NoteId,
    link_type: LinkType,
    weight: i32,
    is_bidirectional: bool,
) -> Result<NoteLink> {
    require_note(conn, user, source)?;
    require_note(conn, user, target)?;
    if source == target {
        return Err(NoteGraphError::SelfLink { note: source.get() });
    }

    let duplicate = || NoteGraphError::DuplicateLink {
        source_note: source.get(),
        target_note: target.get(),
        link_type,
    };
    if find_link(conn, user, source, target, link_type)?.is_some() {
        return Err(duplicate());
    }

    let now = now_timestamp();
    conn.execute(
        "INSERT INTO note_links
         (source_note_id, target_note_id, link_type, weight, is_bidirectional, metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, ?6)",
        rusqlite::params![
            source.get(),
            target.get(),
            link_type,
            clamp_weight(weight),
            is_bidirectional,
            now
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            duplicate()
        } else {
            e.into()
        }
    })?;

    let id = LinkId::new(conn.last_insert_rowid());
    info!(user = %user, link = %id, %source, %target, %link_type, "created link");
    require_link(conn, user, id)
}

/// Link CRUD, bidirectional synthesis and graph analytics for one database.
pub struct NoteLinkGraph<'a> {
    db: &'a Database,
    config: &'a GraphConfig,
}

impl<'a> NoteLinkGraph<'a> {
    pub fn new(db: &'a Database, config: &'a GraphConfig) -> Self {
        Self { db, config }
    }

    /// Creates a directed link. Weights are clamped to 1..=10.
    ///
    /// Fails with `NotFound` if either note is missing, `SelfLink` if
    /// `source == target`, `DuplicateLink` if the triple already exists.
    pub fn create_link(
        &self,
        user: UserId,
        source: NoteId,
        target: NoteId,
        link_type: LinkType,
        weight: i32,
    ) -> Result<NoteLink> {
        self.db.transaction(|conn| {
            insert_link(conn, user, source, target, link_type, weight, false)
        })
    }

    /// Links two notes in both directions.
    ///
    /// A symmetric type produces one link flagged bidirectional. Any other
    /// type produces `a -> b: type` and `b -> a: type.inverse()`. Either
    /// every link is created or none is.
    pub fn create_bidirectional_link(
        &self,
        user: UserId,
        a: NoteId,
        b: NoteId,
        link_type: LinkType,
        weight: i32,
    ) -> Result<Vec<NoteLink>> {
        self.db.transaction(|conn| {
            if link_type.is_symmetric() {
                let link = insert_link(conn, user, a, b, link_type, weight, true)?;
                return Ok(vec![link]);
            }

            let forward = insert_link(conn, user, a, b, link_type, weight, false)?;
            let inverse = insert_link(conn, user, b, a, link_type.inverse(), weight, false)?;
            info!(user = %user, forward = %forward.id, inverse = %inverse.id, "created link pair");
            Ok(vec![forward, inverse])
        })
    }

    pub fn get_link(&self, user: UserId, id: LinkId) -> Result<Option<NoteLink>> {
        fetch_link(self.db.connection(), user, id)
    }

    /// Changes weight and/or replaces metadata. `None` leaves a field as is.
    pub fn update_link(
        &self,
        user: UserId,
        id: LinkId,
        weight: Option<i32>,
        metadata: Option<BTreeMap<String, Value>>,
    ) -> Result<NoteLink> {
        self.db.transaction(|conn| {
            let current = require_link(conn, user, id)?;
            let weight = weight.map(clamp_weight).unwrap_or(current.weight);
            let metadata = metadata.unwrap_or(current.metadata);
            let encoded = if metadata.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&metadata)?)
            };

            conn.execute(
                "UPDATE note_links SET weight = ?1, metadata = ?2, updated_at = ?3 WHERE id = ?4",
                rusqlite::params![weight, encoded, now_timestamp(), id.get()],
            )?;
            info!(user = %user, link = %id, weight, "updated link");
            require_link(conn, user, id)
        })
    }

    pub fn delete_link(&self, user: UserId, id: LinkId) -> Result<()> {
        self.db.transaction(|conn| {
            require_link(conn, user, id)?;
            conn.execute("DELETE FROM note_links WHERE id = ?1", [id.get()])?;
            info!(user = %user, link = %id, "deleted link");
            Ok(())
        })
    }

    /// Deletes the link identified by its triple.
    pub fn delete_link_between(
        &self,
        user: UserId,
        source: NoteId,
        target: NoteId,
        link_type: LinkType,
    ) -> Result<()> {
        self.db.transaction(|conn| {
            // Reported against the source note since the triple has no single id.
            let link = find_link(conn, user, source, target, link_type)?
                .ok_or_else(|| NoteGraphError::not_found("NoteLink from note", source.get()))?;
            conn.execute("DELETE FROM note_links WHERE id = ?1", [link.id.get()])?;
            info!(user = %user, link = %link.id, "deleted link");
            Ok(())
        })
    }

    /// Removes every link touching `note`. Returns the number removed.
    pub fn delete_all_links_for_note(&self, user: UserId, note: NoteId) -> Result<usize> {
        self.db.transaction(|conn| {
            require_note(conn, user, note)?;
            let removed = conn.execute(
                "DELETE FROM note_links WHERE source_note_id = ?1 OR target_note_id = ?1",
                [note.get()],
            )?;
            info!(user = %user, %note, removed, "deleted links for note");
            Ok(removed)
        })
    }

    pub fn link_exists(
        &self,
        user: UserId,
        source: NoteId,
        target: NoteId,
        link_type: LinkType,
    ) -> Result<bool> {
        Ok(find_link(self.db.connection(), user, source, target, link_type)?.is_some())
    }

    pub fn outgoing_links(&self, user: UserId, note: NoteId) -> Result<Vec<NoteLink>> {
        query_links(
            self.db.connection(),
            "l.source_note_id = ?2",
            [user.get(), note.get()],
        )
    }

    pub fn incoming_links(&self, user: UserId, note: NoteId) -> Result<Vec<NoteLink>> {
        query_links(
            self.db.connection(),
            "l.target_note_id = ?2",
            [user.get(), note.get()],
        )
    }

    /// Links in either direction.
    pub fn links_for_note(&self, user: UserId, note: NoteId) -> Result<Vec<NoteLink>> {
        query_links(
            self.db.connection(),
            "(l.source_note_id = ?2 OR l.target_note_id = ?2)",
            [user.get(), note.get()],
        )
    }

    pub fn links_for_note_by_type(
        &self,
        user: UserId,
        note: NoteId,
        link_type: LinkType,
    ) -> Result<Vec<NoteLink>> {
        query_links(
            self.db.connection(),
            "(l.source_note_id = ?2 OR l.target_note_id = ?2) AND l.link_type = ?3",
            rusqlite::params![user.get(), note.get(), link_type],
        )
    }

    /// Links between `a` and `b` in either direction.
    pub fn links_between(&self, user: UserId, a: NoteId, b: NoteId) -> Result<Vec<NoteLink>> {
        query_links(
            self.db.connection(),
            "((l.source_note_id = ?2 AND l.target_note_id = ?3)
              OR (l.source_note_id = ?3 AND l.target_note_id = ?2))",
            [user.get(), a.get(), b.get()],
        )
    }

    pub fn links_by_type(&self, user: UserId, link_type: LinkType) -> Result<Vec<NoteLink>> {
        query_links(
            self.db.connection(),
            "l.link_type = ?2",
            rusqlite::params![user.get(), link_type],
        )
    }

    /// Links with `min <= weight <= max`.
    pub fn links_by_weight(&self, user: UserId, min: i32, max: i32) -> Result<Vec<NoteLink>> {
        if min > max {
            return Err(NoteGraphError::InvalidArgument(format!(
                "weight range {min}..={max} is empty"
            )));
        }
        query_links(
            self.db.connection(),
            "l.weight BETWEEN ?2 AND ?3",
            [user.get(), i64::from(min), i64::from(max)],
        )
    }

    pub fn all_links(&self, user: UserId) -> Result<Vec<NoteLink>> {
        all_links(self.db.connection(), user)
    }

    /// Number of links touching `note`, incoming plus outgoing.
    pub fn count_links(&self, user: UserId, note: NoteId) -> Result<i64> {
        let count = self.db.connection().query_row(
            &format!(
                "SELECT COUNT(*) FROM note_links l {OWNED}
                 WHERE l.source_note_id = ?2 OR l.target_note_id = ?2"
            ),
            [user.get(), note.get()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Link counts grouped by type.
    pub fn link_statistics(&self, user: UserId) -> Result<BTreeMap<LinkType, i64>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare(&format!(
            "SELECT l.link_type, COUNT(*) FROM note_links l {OWNED} GROUP BY l.link_type"
        ))?;
        let rows = stmt.query_map([user.get()], |row| {
            Ok((row.get::<_, LinkType>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = BTreeMap::new();
        for row in rows {
            let (link_type, count) = row?;
            stats.insert(link_type, count);
        }
        Ok(stats)
    }

    /// Mean weight over links touching `note`; `None` when it has none.
    pub fn average_weight(&self, user: UserId, note: NoteId) -> Result<Option<f64>> {
        let avg = self.db.connection().query_row(
            &format!(
                "SELECT AVG(l.weight) FROM note_links l {OWNED}
                 WHERE l.source_note_id = ?2 OR l.target_note_id = ?2"
            ),
            [user.get(), note.get()],
            |row| row.get::<_, Option<f64>>(0),
        )?;
        Ok(avg)
    }

    /// Loads the user's links into an in-memory graph.
    pub fn graph(&self, user: UserId) -> Result<LinkGraph> {
        let links = self.all_links(user)?;
        let graph = LinkGraph::from_links(&links);
        debug!(user = %user, edges = graph.edge_count(), "loaded link graph");
        Ok(graph)
    }

    /// Notes reachable from `start` within `max_depth` hops, excluding `start`.
    ///
    /// Fails with `InvalidArgument` if `max_depth` exceeds the configured ceiling.
    pub fn connected_notes(
        &self,
        user: UserId,
        start: NoteId,
        max_depth: usize,
    ) -> Result<BTreeSet<NoteId>> {
        if max_depth > self.config.max_depth_ceiling {
            return Err(NoteGraphError::InvalidArgument(format!(
                "max depth {max_depth} exceeds limit of {}",
                self.config.max_depth_ceiling
            )));
        }
        if max_depth == 0 {
            return Ok(BTreeSet::new());
        }
        let reached = self.graph(user)?.connected_notes(start, max_depth);
        debug!(user = %user, %start, max_depth, reached = reached.len(), "connected notes");
        Ok(reached)
    }

    /// Shortest path from `start` to `target`, both included.
    ///
    /// `None` when unreachable within the configured hop bound or when
    /// `start == target`.
    pub fn shortest_path(
        &self,
        user: UserId,
        start: NoteId,
        target: NoteId,
    ) -> Result<Option<Vec<NoteId>>> {
        if start == target {
            return Ok(None);
        }
        Ok(self
            .graph(user)?
            .shortest_path(start, target, self.config.shortest_path_max_hops))
    }

    /// Top `limit` notes by degree with their degrees.
    pub fn most_connected(&self, user: UserId, limit: usize) -> Result<Vec<(NoteId, usize)>> {
        Ok(self.graph(user)?.most_connected(limit))
    }

    /// Notes with no links in either direction, by id.
    pub fn orphaned_notes(&self, user: UserId) -> Result<Vec<NoteId>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare("SELECT id FROM notes WHERE user_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map([user.get()], |row| row.get::<_, i64>(0))?;

        let mut notes = Vec::new();
        for row in rows {
            notes.push(NoteId::new(row?));
        }
        Ok(self.graph(user)?.orphans(notes))
    }
}
