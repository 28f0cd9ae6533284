use anyhow::Result;
use notegraph::{
    Database, GroupId, LinkType, NewGroup, NewNote, NoteFilter, NoteId, NoteService, TagMatch,
    UserId,
};

const USER: UserId = UserId::new(1);

/// Two groups of linked research notes plus one unlinked note.
struct Fixture {
    service: NoteService,
    research: GroupId,
    papers: GroupId,
    overview: NoteId,
    paper: NoteId,
    draft: NoteId,
    stray: NoteId,
}

fn fixture() -> Result<Fixture> {
    let service = NoteService::new(Database::in_memory()?);
    let research = service.groups().create_group(USER, NewGroup::new("Research"))?.id;
    let papers = service
        .groups()
        .create_sub_group(USER, research, NewGroup::new("Papers"))?
        .id;

    let overview = service
        .create_note(
            USER,
            NewNote::new("Overview", "map of the field")
                .in_group(research)
                .with_tags(["survey"]),
        )?
        .id();
    let paper = service
        .create_note(
            USER,
            NewNote::new("Paper", "")
                .in_group(papers)
                .with_tags(["survey", "graphs"]),
        )?
        .id();
    let draft = service.create_note(USER, NewNote::new("Draft", ""))?.id();
    let stray = service.create_note(USER, NewNote::new("Stray", ""))?.id();

    let links = service.links();
    links.create_link(USER, overview, paper, LinkType::Cites, 9)?;
    links.create_link(USER, draft, overview, LinkType::Summarizes, 3)?;

    Ok(Fixture {
        service,
        research,
        papers,
        overview,
        paper,
        draft,
        stray,
    })
}

#[test]
fn test_graph_view_for_group_with_subgroups() -> Result<()> {
    // Arrange
    let f = fixture()?;

    // Act
    let view = f
        .service
        .graph_query()
        .graph_view(USER, &NoteFilter::group(f.research, true))?;

    // Assert: only the Cites edge lies inside the selection
    let node_ids: Vec<NoteId> = view.nodes.iter().map(|n| n.id).collect();
    assert_eq!(node_ids, vec![f.overview, f.paper]);
    assert_eq!(view.edges.len(), 1);
    assert_eq!(view.edges[0].source, f.overview);
    assert_eq!(view.edges[0].target, f.paper);
    assert_eq!(view.edges[0].stroke_width, 4.5);
    assert!((view.edges[0].opacity - 0.9).abs() < 1e-9);

    // Overview touches two links overall, even though one leaves the group
    let overview = &view.nodes[0];
    assert_eq!(overview.link_count, 2);
    assert_eq!(overview.size, 31);

    Ok(())
}

#[test]
fn test_graph_view_serializes_to_json() -> Result<()> {
    let f = fixture()?;
    let view = f
        .service
        .graph_query()
        .graph_view(USER, &NoteFilter::default())?;

    let json = serde_json::to_value(&view)?;

    assert_eq!(json["nodes"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["edges"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["edges"][0]["link_type"], "CITES");
    Ok(())
}

#[test]
fn test_tag_filter_narrows_selection() -> Result<()> {
    let f = fixture()?;
    let query = f.service.graph_query();

    let all = NoteFilter::default().with_tags(["SURVEY", "graphs"], TagMatch::All);
    let any = NoteFilter::default().with_tags(["graphs", "survey"], TagMatch::Any);
    let only_papers = NoteFilter::group(f.papers, false).with_tags(["survey"], TagMatch::Any);

    let ids = |filter: &NoteFilter| -> Result<Vec<NoteId>> {
        Ok(query
            .filtered_notes(USER, filter)?
            .iter()
            .map(|n| n.id())
            .collect())
    };

    assert_eq!(ids(&all)?, vec![f.paper]);
    assert_eq!(ids(&any)?, vec![f.overview, f.paper]);
    assert_eq!(ids(&only_papers)?, vec![f.paper]);
    Ok(())
}

#[test]
fn test_graph_stats_summary() -> Result<()> {
    let f = fixture()?;

    let stats = f.service.graph_query().graph_stats(USER)?;

    assert_eq!(stats.total_notes, 4);
    assert_eq!(stats.total_links, 2);
    assert_eq!(stats.orphan_count, 1);
    assert_eq!(stats.link_type_distribution.len(), 2);
    assert_eq!(stats.hubs[0].id, f.overview);
    assert_eq!(stats.hubs[0].degree, 2);
    assert!(stats.hubs.iter().all(|h| h.id != f.stray));
    Ok(())
}

#[test]
fn test_node_view_lists_both_directions() -> Result<()> {
    let f = fixture()?;

    let view = f.service.graph_query().node_view(USER, f.overview)?;

    assert_eq!(view.tags, vec!["survey"]);
    assert_eq!(view.outgoing.len(), 1);
    assert_eq!(view.outgoing[0].note_id, f.paper);
    assert_eq!(view.incoming.len(), 1);
    assert_eq!(view.incoming[0].note_id, f.draft);
    assert_eq!(view.incoming[0].link_type, LinkType::Summarizes);
    assert_eq!(view.average_weight, Some(6.0));
    Ok(())
}

#[test]
fn test_group_scoped_links_and_connected_notes() -> Result<()> {
    let f = fixture()?;
    let query = f.service.graph_query();

    assert_eq!(query.links_within_group(USER, f.research, true)?.len(), 1);
    assert!(query.links_within_group(USER, f.research, false)?.is_empty());
    assert!(query.links_within_group(USER, f.papers, true)?.is_empty());

    let connected: Vec<NoteId> = query
        .connected_notes_in_group(USER, f.research, true)?
        .iter()
        .map(|n| n.id())
        .collect();
    assert_eq!(connected, vec![f.overview, f.paper]);
    Ok(())
}

#[test]
fn test_unknown_group_filter_is_not_found() -> Result<()> {
    let f = fixture()?;

    let result = f
        .service
        .graph_query()
        .graph_view(USER, &NoteFilter::group(GroupId::new(404), true));

    assert!(matches!(
        result,
        Err(notegraph::NoteGraphError::NotFound { entity: "Group", .. })
    ));
    Ok(())
}
