//! Filtered subgraphs and summaries for visualization and analytics.
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::config::GraphConfig;
use crate::db::Database;
use crate::error::{NoteGraphError, Result};
use crate::graph::LinkGraph;
use crate::links::{NoteLinkGraph, all_links};
use crate::models::{GroupId, LinkId, LinkType, Note, NoteId, NoteLink, UserId};
use crate::service::{
    TagMatch, fetch_note, group_scope, load_notes, note_ids_in_groups, note_ids_with_tags,
};
use crate::tags::fetch_tag;

const MIN_NODE_SIZE: u32 = 15;
const MAX_NODE_SIZE: u32 = 60;
const NODE_SIZE_PER_LINK: u32 = 8;
const MIN_OPACITY: f64 = 0.3;

/// Edge stroke width: half the weight, at least 1.
pub fn stroke_width(weight: i32) -> f64 {
    (f64::from(weight) / 2.0).max(1.0)
}

/// Edge opacity: a tenth of the weight, within `[0.3, 1.0]`.
pub fn edge_opacity(weight: i32) -> f64 {
    (f64::from(weight) / 10.0).clamp(MIN_OPACITY, 1.0)
}

/// Node size grows with degree and saturates at 60.
pub fn node_size(degree: usize) -> u32 {
    let degree = u32::try_from(degree).unwrap_or(u32::MAX);
    MIN_NODE_SIZE
        .saturating_add(degree.saturating_mul(NODE_SIZE_PER_LINK))
        .clamp(MIN_NODE_SIZE, MAX_NODE_SIZE)
}

/// Which notes a query starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    /// `None` selects every note of the user.
    pub group: Option<GroupId>,
    /// Also include every group below `group`.
    pub include_sub_groups: bool,
    /// Tag names to match; empty disables tag filtering.
    pub tags: Vec<String>,
    pub tag_match: TagMatch,
}

impl NoteFilter {
    pub fn group(group: GroupId, include_sub_groups: bool) -> Self {
        Self {
            group: Some(group),
            include_sub_groups,
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I, tag_match: TagMatch) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self.tag_match = tag_match;
        self
    }
}

/// One side of a link as seen from a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSummary {
    pub link_id: LinkId,
    /// The note at the other end.
    pub note_id: NoteId,
    pub title: String,
    pub link_type: LinkType,
    pub weight: i32,
}

/// Display record for a single note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub group_id: GroupId,
    pub tags: Vec<String>,
    pub outgoing: Vec<LinkSummary>,
    pub incoming: Vec<LinkSummary>,
    pub link_count: usize,
    pub average_weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubNode {
    pub id: NoteId,
    pub title: String,
    pub degree: usize,
}

/// Whole-graph analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub total_notes: usize,
    pub total_links: usize,
    pub orphan_count: usize,
    pub link_type_distribution: BTreeMap<LinkType, usize>,
    pub hubs: Vec<HubNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: NoteId,
    pub title: String,
    pub group_id: GroupId,
    pub link_count: usize,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub id: LinkId,
    pub source: NoteId,
    pub target: NoteId,
    pub link_type: LinkType,
    pub weight: i32,
    pub bidirectional: bool,
    pub stroke_width: f64,
    pub opacity: f64,
}

/// Nodes and edges of a filtered subgraph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Read-only queries that combine the link graph with group and tag filters.
pub struct GraphQuery<'a> {
    db: &'a Database,
    config: &'a GraphConfig,
}

impl<'a> GraphQuery<'a> {
    pub fn new(db: &'a Database, config: &'a GraphConfig) -> Self {
        Self { db, config }
    }

    fn note_ids(&self, user: UserId, filter: &NoteFilter) -> Result<Vec<NoteId>> {
        let conn = self.db.connection();
        let mut ids = match filter.group {
            Some(group) => {
                let groups = group_scope(conn, user, group, filter.include_sub_groups)?;
                note_ids_in_groups(conn, user, Some(&groups))?
            }
            None => note_ids_in_groups(conn, user, None)?,
        };

        if !filter.tags.is_empty() {
            let names: Vec<&str> = filter.tags.iter().map(String::as_str).collect();
            let tagged = note_ids_with_tags(conn, user, &names, filter.tag_match)?;
            ids.retain(|id| tagged.contains(id));
        }
        Ok(ids)
    }

    /// Notes selected by group (optionally with subgroups) and then by tags.
    pub fn filtered_notes(&self, user: UserId, filter: &NoteFilter) -> Result<Vec<Note>> {
        let ids = self.note_ids(user, filter)?;
        load_notes(self.db.connection(), user, &ids)
    }

    /// Links whose source and target both lie in `notes`.
    pub fn links_among(&self, user: UserId, notes: &BTreeSet<NoteId>) -> Result<Vec<NoteLink>> {
        let mut links = all_links(self.db.connection(), user)?;
        links.retain(|l| notes.contains(&l.source) && notes.contains(&l.target));
        Ok(links)
    }

    /// Note fields, tag names and link summaries for one note.
    pub fn node_view(&self, user: UserId, note: NoteId) -> Result<NodeView> {
        let conn = self.db.connection();
        let current =
            fetch_note(conn, user, note)?.ok_or_else(|| NoteGraphError::not_found("Note", note.get()))?;

        let mut tags = Vec::with_capacity(current.tags().len());
        for note_tag in current.tags() {
            if let Some(tag) = fetch_tag(conn, user, note_tag.tag_id())? {
                tags.push(tag.name().to_string());
            }
        }
        tags.sort_by_key(|name| name.to_ascii_lowercase());

        let links = NoteLinkGraph::new(self.db, self.config);
        let summarize = |link: &NoteLink, other: NoteId| -> Result<LinkSummary> {
            let title = fetch_note(conn, user, other)?
                .map(|n| n.title().to_string())
                .unwrap_or_default();
            Ok(LinkSummary {
                link_id: link.id,
                note_id: other,
                title,
                link_type: link.link_type,
                weight: link.weight,
            })
        };

        let mut outgoing = Vec::new();
        for link in links.outgoing_links(user, note)? {
            outgoing.push(summarize(&link, link.target)?);
        }
        let mut incoming = Vec::new();
        for link in links.incoming_links(user, note)? {
            incoming.push(summarize(&link, link.source)?);
        }

        Ok(NodeView {
            id: current.id(),
            title: current.title().to_string(),
            content: current.content().to_string(),
            group_id: current.group_id(),
            tags,
            link_count: outgoing.len() + incoming.len(),
            average_weight: links.average_weight(user, note)?,
            outgoing,
            incoming,
        })
    }

    /// Type histogram, top hubs, orphan count and totals.
    pub fn graph_stats(&self, user: UserId) -> Result<GraphStats> {
        let conn = self.db.connection();
        let links = all_links(conn, user)?;
        let graph = LinkGraph::from_links(&links);
        let notes = note_ids_in_groups(conn, user, None)?;

        let mut link_type_distribution = BTreeMap::new();
        for link in &links {
            *link_type_distribution.entry(link.link_type).or_insert(0) += 1;
        }

        let mut hubs = Vec::new();
        for (id, degree) in graph.most_connected(self.config.hub_limit) {
            let title = fetch_note(conn, user, id)?
                .map(|n| n.title().to_string())
                .unwrap_or_default();
            hubs.push(HubNode { id, title, degree });
        }

        let stats = GraphStats {
            total_notes: notes.len(),
            total_links: links.len(),
            orphan_count: graph.orphans(notes).len(),
            link_type_distribution,
            hubs,
        };
        debug!(user = %user, notes = stats.total_notes, links = stats.total_links, "graph stats");
        Ok(stats)
    }

    /// Visualization payload for the notes selected by `filter`.
    ///
    /// Edges are restricted to links among the selected notes; node sizes use
    /// each note's degree over all of the user's links.
    pub fn graph_view(&self, user: UserId, filter: &NoteFilter) -> Result<GraphView> {
        let conn = self.db.connection();
        let notes = self.filtered_notes(user, filter)?;
        let links = all_links(conn, user)?;
        let graph = LinkGraph::from_links(&links);
        let selected: BTreeSet<NoteId> = notes.iter().map(Note::id).collect();

        let nodes = notes
            .iter()
            .map(|note| {
                let degree = graph.degree(note.id());
                GraphNode {
                    id: note.id(),
                    title: note.title().to_string(),
                    group_id: note.group_id(),
                    link_count: degree,
                    size: node_size(degree),
                }
            })
            .collect();

        let edges = links
            .iter()
            .filter(|l| selected.contains(&l.source) && selected.contains(&l.target))
            .map(|l| GraphEdge {
                id: l.id,
                source: l.source,
                target: l.target,
                link_type: l.link_type,
                weight: l.weight,
                bidirectional: l.is_bidirectional,
                stroke_width: stroke_width(l.weight),
                opacity: edge_opacity(l.weight),
            })
            .collect();

        Ok(GraphView { nodes, edges })
    }

    /// Links with both ends inside the group (and its subgroups if asked).
    pub fn links_within_group(
        &self,
        user: UserId,
        group: GroupId,
        include_sub_groups: bool,
    ) -> Result<Vec<NoteLink>> {
        let ids = self.note_ids(user, &NoteFilter::group(group, include_sub_groups))?;
        self.links_among(user, &ids.into_iter().collect())
    }

    /// Notes of the group set that have a link to another note in the set.
    pub fn connected_notes_in_group(
        &self,
        user: UserId,
        group: GroupId,
        include_sub_groups: bool,
    ) -> Result<Vec<Note>> {
        let ids = self.note_ids(user, &NoteFilter::group(group, include_sub_groups))?;
        let members: BTreeSet<NoteId> = ids.iter().copied().collect();

        let mut linked = BTreeSet::new();
        for link in self.links_among(user, &members)? {
            linked.insert(link.source);
            linked.insert(link.target);
        }

        let connected: Vec<NoteId> = ids.into_iter().filter(|id| linked.contains(id)).collect();
        load_notes(self.db.connection(), user, &connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stroke_width_has_floor_of_one() {
        assert_eq!(stroke_width(1), 1.0);
        assert_eq!(stroke_width(2), 1.0);
        assert_eq!(stroke_width(7), 3.5);
        assert_eq!(stroke_width(10), 5.0);
    }

    #[test]
    fn opacity_saturates_at_both_ends() {
        assert_eq!(edge_opacity(1), 0.3);
        assert_eq!(edge_opacity(5), 0.5);
        assert_eq!(edge_opacity(10), 1.0);
        assert_eq!(edge_opacity(25), 1.0);
    }

    #[test]
    fn node_size_is_monotonic_and_clamped() {
        assert_eq!(node_size(0), 15);
        assert_eq!(node_size(1), 23);
        assert_eq!(node_size(5), 55);
        assert_eq!(node_size(6), 60);
        assert_eq!(node_size(usize::MAX), 60);

        let sizes: Vec<u32> = (0..10).map(node_size).collect();
        assert!(sizes.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn filter_builders() {
        let filter = NoteFilter::group(GroupId::new(2), true).with_tags(["a", "b"], TagMatch::All);
        assert_eq!(filter.group, Some(GroupId::new(2)));
        assert!(filter.include_sub_groups);
        assert_eq!(filter.tags, vec!["a", "b"]);
        assert_eq!(filter.tag_match, TagMatch::All);
    }
}
