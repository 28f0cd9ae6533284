//! In-memory adjacency view over a set of note links.
//!
//! Traversal follows a link forward always and backward only when the link
//! is flagged bidirectional. Degree counts every link once per endpoint.
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::models::{NoteId, NoteLink};

/// Adjacency lists built from a link slice. Holds no database handle.
#[derive(Debug, Default, Clone)]
pub struct LinkGraph {
    neighbors: HashMap<NoteId, Vec<NoteId>>,
    degree: HashMap<NoteId, usize>,
    edge_count: usize,
}

impl LinkGraph {
    pub fn from_links<'l>(links: impl IntoIterator<Item = &'l NoteLink>) -> Self {
        let mut graph = Self::default();
        for link in links {
            graph.add_edge(link.source, link.target, link.is_bidirectional);
        }
        for list in graph.neighbors.values_mut() {
            list.sort();
            list.dedup();
        }
        graph
    }

    fn add_edge(&mut self, source: NoteId, target: NoteId, bidirectional: bool) {
        self.neighbors.entry(source).or_default().push(target);
        if bidirectional {
            self.neighbors.entry(target).or_default().push(source);
        }
        *self.degree.entry(source).or_default() += 1;
        *self.degree.entry(target).or_default() += 1;
        self.edge_count += 1;
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Notes traversal can step to from `note`, by id.
    pub fn neighbors(&self, note: NoteId) -> &[NoteId] {
        self.neighbors.get(&note).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incoming plus outgoing link count.
    pub fn degree(&self, note: NoteId) -> usize {
        self.degree.get(&note).copied().unwrap_or(0)
    }

    /// Notes reachable from `start` within `max_depth` hops, excluding `start`.
    pub fn connected_notes(&self, start: NoteId, max_depth: usize) -> BTreeSet<NoteId> {
        let mut reached = BTreeSet::new();
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for &next in self.neighbors(current) {
                if visited.insert(next) {
                    reached.insert(next);
                    queue.push_back((next, depth + 1));
                }
            }
        }
        reached
    }

    /// Shortest path from `start` to `target` using at most `max_hops` links.
    ///
    /// The path includes both endpoints. `start == target` has no path.
    pub fn shortest_path(
        &self,
        start: NoteId,
        target: NoteId,
        max_hops: usize,
    ) -> Option<Vec<NoteId>> {
        if start == target {
            return None;
        }

        let mut came_from: HashMap<NoteId, NoteId> = HashMap::new();
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);

        while let Some((current, hops)) = queue.pop_front() {
            if hops >= max_hops {
                continue;
            }
            for &next in self.neighbors(current) {
                if !visited.insert(next) {
                    continue;
                }
                came_from.insert(next, current);
                if next == target {
                    return Some(unwind(&came_from, start, target));
                }
                queue.push_back((next, hops + 1));
            }
        }
        None
    }

    /// Linked notes ranked by degree, highest first; ties go to the lower id.
    pub fn most_connected(&self, limit: usize) -> Vec<(NoteId, usize)> {
        let mut ranked: Vec<(NoteId, usize)> =
            self.degree.iter().map(|(&id, &deg)| (id, deg)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    /// Members of `notes` that touch no link at all, in input order.
    pub fn orphans(&self, notes: impl IntoIterator<Item = NoteId>) -> Vec<NoteId> {
        notes
            .into_iter()
            .filter(|id| self.degree(*id) == 0)
            .collect()
    }
}

fn unwind(came_from: &HashMap<NoteId, NoteId>, start: NoteId, target: NoteId) -> Vec<NoteId> {
    let mut path = vec![target];
    let mut current = target;
    while current != start {
        match came_from.get(&current) {
            Some(&prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LinkId, LinkType};
    use std::collections::BTreeMap;
    use time::OffsetDateTime;

    fn n(id: i64) -> NoteId {
        NoteId::new(id)
    }

    fn link(id: i64, source: i64, target: i64, bidirectional: bool) -> NoteLink {
        let now = OffsetDateTime::now_utc();
        NoteLink {
            id: LinkId::new(id),
            source: n(source),
            target: n(target),
            link_type: LinkType::Extends,
            weight: 3,
            is_bidirectional: bidirectional,
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn chain() -> LinkGraph {
        // 1 -> 2 -> 3, 4 isolated
        let links = [link(1, 1, 2, false), link(2, 2, 3, false)];
        LinkGraph::from_links(&links)
    }

    #[test]
    fn connected_notes_respects_depth() {
        let graph = chain();
        assert_eq!(graph.connected_notes(n(1), 1), BTreeSet::from([n(2)]));
        assert_eq!(graph.connected_notes(n(1), 2), BTreeSet::from([n(2), n(3)]));
        assert!(graph.connected_notes(n(1), 0).is_empty());
    }

    #[test]
    fn incoming_edges_need_bidirectional_flag() {
        let graph = chain();
        assert!(graph.connected_notes(n(3), 5).is_empty());

        let links = [link(1, 1, 2, true)];
        let graph = LinkGraph::from_links(&links);
        assert_eq!(graph.connected_notes(n(2), 1), BTreeSet::from([n(1)]));
    }

    #[test]
    fn cycles_do_not_revisit_nodes() {
        let links = [
            link(1, 1, 2, false),
            link(2, 2, 3, false),
            link(3, 3, 1, false),
        ];
        let graph = LinkGraph::from_links(&links);
        assert_eq!(graph.connected_notes(n(1), 10), BTreeSet::from([n(2), n(3)]));
    }

    #[test]
    fn shortest_path_includes_both_endpoints() {
        let links = [
            link(1, 1, 2, false),
            link(2, 2, 3, false),
            link(3, 3, 4, false),
            link(4, 1, 3, false),
        ];
        let graph = LinkGraph::from_links(&links);
        assert_eq!(
            graph.shortest_path(n(1), n(4), 10),
            Some(vec![n(1), n(3), n(4)])
        );
    }

    #[test]
    fn shortest_path_edge_cases() {
        let graph = chain();
        assert_eq!(graph.shortest_path(n(1), n(1), 10), None);
        assert_eq!(graph.shortest_path(n(3), n(1), 10), None);
        assert_eq!(graph.shortest_path(n(1), n(3), 1), None);
        assert_eq!(graph.shortest_path(n(1), n(3), 2), Some(vec![n(1), n(2), n(3)]));
    }

    #[test]
    fn most_connected_breaks_ties_by_id() {
        let graph = chain();
        assert_eq!(graph.most_connected(2), vec![(n(2), 2), (n(1), 1)]);
        assert_eq!(graph.most_connected(10).len(), 3);
    }

    #[test]
    fn symmetric_link_counts_once_per_note() {
        let links = [link(1, 1, 2, true)];
        let graph = LinkGraph::from_links(&links);
        assert_eq!(graph.degree(n(1)), 1);
        assert_eq!(graph.degree(n(2)), 1);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn orphans_have_no_links() {
        let graph = chain();
        assert_eq!(graph.orphans([n(1), n(4), n(3), n(5)]), vec![n(4), n(5)]);
    }

    #[test]
    fn empty_graph_yields_empty_results() {
        let graph = LinkGraph::default();
        assert!(graph.connected_notes(n(1), 3).is_empty());
        assert_eq!(graph.shortest_path(n(1), n(2), 10), None);
        assert!(graph.most_connected(5).is_empty());
    }
}
