use anyhow::Result;
use notegraph::{
    Database, GroupId, NewGroup, NewNote, NewTag, NoteGraphError, NoteService, UserId,
};

const USER: UserId = UserId::new(1);

fn chain(service: &NoteService, names: &[&str]) -> Result<Vec<GroupId>> {
    let mut ids: Vec<GroupId> = Vec::new();
    for name in names {
        let mut spec = NewGroup::new(*name);
        spec.parent_id = ids.last().copied();
        ids.push(service.groups().create_group(USER, spec)?.id);
    }
    Ok(ids)
}

#[test]
fn test_move_group_round_trip() -> Result<()> {
    // Arrange: A > B and a separate root P
    let service = NoteService::new(Database::in_memory()?);
    let ab = chain(&service, &["A", "B"])?;
    let p = service.groups().create_group(USER, NewGroup::new("P"))?.id;

    // Act
    service.groups().move_group(USER, ab[1], Some(p))?;

    // Assert: P is the immediate predecessor of B
    let path = service.groups().hierarchy_of(USER, ab[1])?;
    assert_eq!(path.len(), 2);
    assert_eq!(path[path.len() - 2].id, p);
    assert_eq!(service.groups().full_name(USER, ab[1])?, "P > B");

    Ok(())
}

#[test]
fn test_move_group_into_descendant_leaves_parent_unchanged() -> Result<()> {
    let service = NoteService::new(Database::in_memory()?);
    let ids = chain(&service, &["Root", "Mid", "Leaf"])?;

    let result = service.groups().move_group(USER, ids[1], Some(ids[2]));

    assert!(matches!(
        result,
        Err(NoteGraphError::CircularReference { .. })
    ));
    let mid = service
        .groups()
        .get_group(USER, ids[1])?
        .expect("group still exists");
    assert_eq!(mid.parent_id, Some(ids[0]));
    Ok(())
}

#[test]
fn test_delete_group_scenario() -> Result<()> {
    // Arrange: G owns one note
    let service = NoteService::new(Database::in_memory()?);
    let g = service.groups().create_group(USER, NewGroup::new("G"))?.id;
    let elsewhere = service.groups().create_group(USER, NewGroup::new("Elsewhere"))?.id;
    let note = service.create_note(USER, NewNote::new("owned", "").in_group(g))?;

    // Act + Assert: refused while the note is there
    assert!(matches!(
        service.groups().delete_group(USER, g),
        Err(NoteGraphError::InvalidState(_))
    ));

    service.assign_note_to_group(USER, note.id(), elsewhere)?;
    service.groups().delete_group(USER, g)?;

    assert!(service.groups().get_group(USER, g)?.is_none());
    Ok(())
}

#[test]
fn test_deleting_group_cascades_its_scoped_tags() -> Result<()> {
    let service = NoteService::new(Database::in_memory()?);
    let g = service.groups().create_group(USER, NewGroup::new("G"))?.id;
    let tag = service
        .tags()
        .create_in_scope(USER, NewTag::new("local"), Some(g))?;

    service.groups().delete_group(USER, g)?;

    assert!(service.tags().get_tag(USER, tag.id())?.is_none());
    Ok(())
}

#[test]
fn test_urgent_tag_scenario() -> Result<()> {
    let service = NoteService::new(Database::in_memory()?);
    let g = service.groups().create_group(USER, NewGroup::new("G"))?.id;
    let tags = service.tags();

    tags.create_in_scope(USER, NewTag::new("urgent"), Some(g))?;
    tags.create_in_scope(USER, NewTag::new("urgent"), None)?;

    assert!(tags.tag_exists_in_group(USER, "urgent", g)?);
    assert!(matches!(
        tags.create_in_scope(USER, NewTag::new("urgent"), Some(g)),
        Err(NoteGraphError::DuplicateName { .. })
    ));
    Ok(())
}

#[test]
fn test_tag_visibility_follows_lineage() -> Result<()> {
    // Arrange: Work > Rust, plus a sibling root Home
    let service = NoteService::new(Database::in_memory()?);
    let work_rust = chain(&service, &["Work", "Rust"])?;
    let home = service.groups().create_group(USER, NewGroup::new("Home"))?.id;
    let tags = service.tags();

    tags.create_in_scope(USER, NewTag::new("everywhere"), None)?;
    tags.create_in_scope(USER, NewTag::new("work-only"), Some(work_rust[0]))?;
    tags.create_in_scope(USER, NewTag::new("rust-only"), Some(work_rust[1]))?;
    tags.create_in_scope(USER, NewTag::new("home-only"), Some(home))?;

    let names = |scope: Option<GroupId>| -> Result<Vec<String>> {
        Ok(service
            .tags()
            .tags_visible_in(USER, scope)?
            .iter()
            .map(|t| t.name().to_string())
            .collect())
    };

    // Assert
    assert_eq!(
        names(Some(work_rust[1]))?,
        vec!["everywhere", "rust-only", "work-only"]
    );
    assert_eq!(names(Some(work_rust[0]))?, vec!["everywhere", "work-only"]);
    assert_eq!(names(Some(home))?, vec!["everywhere", "home-only"]);
    assert_eq!(names(None)?.len(), 4);
    assert_eq!(names(Some(GroupId::new(999)))?, vec!["everywhere"]);

    Ok(())
}

#[test]
fn test_find_or_create_prefers_nearest_scope() -> Result<()> {
    let service = NoteService::new(Database::in_memory()?);
    let ids = chain(&service, &["Work", "Rust"])?;
    let tags = service.tags();
    let global = tags.create_in_scope(USER, NewTag::new("review"), None)?;

    // Global tag is reused from deep inside the tree
    let found = tags.find_or_create(USER, "Review", None, Some(ids[1]))?;
    assert_eq!(found.id(), global.id());

    // A new name is created in the requested scope
    let created = tags.find_or_create(USER, "async", Some("#00ff00"), Some(ids[1]))?;
    assert_eq!(created.group_id(), Some(ids[1]));
    assert_eq!(created.color(), Some("#00ff00"));
    Ok(())
}

#[test]
fn test_move_tag_between_scopes() -> Result<()> {
    let service = NoteService::new(Database::in_memory()?);
    let g = service.groups().create_group(USER, NewGroup::new("G"))?.id;
    let h = service.groups().create_group(USER, NewGroup::new("H"))?.id;
    let tags = service.tags();

    let tag = tags.create_in_scope(USER, NewTag::new("shared"), Some(g))?;
    tags.create_in_scope(USER, NewTag::new("shared"), Some(h))?;

    // H already has one, so the move clashes
    assert!(matches!(
        tags.move_to_group(USER, tag.id(), Some(h)),
        Err(NoteGraphError::DuplicateName { .. })
    ));

    let global = tags.make_tag_global(USER, tag.id())?;
    assert!(global.is_global());
    assert_eq!(tags.global_tags(USER)?.len(), 1);
    assert_eq!(tags.group_specific_tags(USER, h)?.len(), 1);
    Ok(())
}

#[test]
fn test_users_are_isolated() -> Result<()> {
    let service = NoteService::new(Database::in_memory()?);
    let other = UserId::new(2);
    let g = service.groups().create_group(USER, NewGroup::new("G"))?.id;

    assert!(service.groups().get_group(other, g)?.is_none());
    assert!(matches!(
        service.groups().move_group(other, g, None),
        Err(NoteGraphError::NotFound { .. })
    ));
    assert!(service.tags().tags_visible_in(other, None)?.is_empty());
    Ok(())
}
