use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{GroupId, NoteId, NoteTag, TagId, UserId};

/// A note with its content, owning group and tag associations.
///
/// Notes are the nodes of the link graph. Every stored note belongs to
/// exactly one group; callers that omit a group get the user's default group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    id: NoteId,
    user_id: UserId,
    title: String,
    content: String,
    group_id: GroupId,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
    tags: Vec<NoteTag>,
}

impl Note {
    pub fn id(&self) -> NoteId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    /// Tag associations, oldest first.
    pub fn tags(&self) -> &[NoteTag] {
        &self.tags
    }

    /// Returns true if the note carries the given tag.
    pub fn has_tag(&self, tag_id: TagId) -> bool {
        self.tags.iter().any(|t| t.tag_id() == tag_id)
    }
}

/// Builder for constructing `Note` instances with optional fields.
///
/// # Examples
///
/// ```
/// use notegraph::{GroupId, NoteBuilder, NoteId, UserId};
///
/// let note = NoteBuilder::new()
///     .id(NoteId::new(1))
///     .user_id(UserId::new(7))
///     .group_id(GroupId::new(3))
///     .title("Intro")
///     .build();
///
/// assert_eq!(note.id(), NoteId::new(1));
/// assert_eq!(note.title(), "Intro");
/// assert_eq!(note.content(), "");
/// assert!(note.tags().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct NoteBuilder {
    id: Option<NoteId>,
    user_id: Option<UserId>,
    title: Option<String>,
    content: Option<String>,
    group_id: Option<GroupId>,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
    tags: Option<Vec<NoteTag>>,
}

impl NoteBuilder {
    /// Creates a new `NoteBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn group_id(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn updated_at(mut self, updated_at: OffsetDateTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn tags(mut self, tags: Vec<NoteTag>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Builds the `Note`, using defaults for optional fields.
    ///
    /// # Panics
    ///
    /// Panics if `id`, `user_id`, `group_id` or `title` have not been set.
    pub fn build(self) -> Note {
        let now = OffsetDateTime::now_utc();
        Note {
            id: self.id.expect("id is required"),
            user_id: self.user_id.expect("user_id is required"),
            title: self.title.expect("title is required"),
            content: self.content.unwrap_or_default(),
            group_id: self.group_id.expect("group_id is required"),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
            tags: self.tags.unwrap_or_default(),
        }
    }
}

/// Input for creating a note.
///
/// `group_id = None` places the note in the user's default group. Tag names
/// are resolved in the note's group scope and created when missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub group_id: Option<GroupId>,
    pub tags: Vec<String>,
}

impl NewNote {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NoteBuilder {
        NoteBuilder::new()
            .id(NoteId::new(1))
            .user_id(UserId::new(1))
            .group_id(GroupId::new(1))
    }

    #[test]
    fn builder_creates_note_with_default_empty_tags() {
        let note = base().title("Test note").build();

        assert_eq!(note.title(), "Test note");
        assert!(note.tags().is_empty());
        assert!(note.content().is_empty());
    }

    #[test]
    fn builder_allows_setting_all_fields() {
        let now = OffsetDateTime::now_utc();
        let note_tag = NoteTag::new(TagId::new(5), now);

        let note = base()
            .title("Complete")
            .content("body")
            .created_at(now)
            .updated_at(now)
            .tags(vec![note_tag.clone()])
            .build();

        assert_eq!(note.content(), "body");
        assert_eq!(note.created_at(), now);
        assert_eq!(note.tags(), &[note_tag]);
        assert!(note.has_tag(TagId::new(5)));
        assert!(!note.has_tag(TagId::new(6)));
    }

    #[test]
    #[should_panic(expected = "title is required")]
    fn builder_requires_title() {
        base().build();
    }

    #[test]
    fn serialization_roundtrip() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let note = base()
            .title("Intro")
            .created_at(now)
            .updated_at(now)
            .build();

        let json = serde_json::to_string(&note).unwrap();
        let deserialized: Note = serde_json::from_str(&json).unwrap();

        assert_eq!(note, deserialized);
    }

    #[test]
    fn new_note_helpers_fill_fields() {
        let spec = NewNote::new("Intro", "text")
            .in_group(GroupId::new(4))
            .with_tags(["rust", "graphs"]);

        assert_eq!(spec.group_id, Some(GroupId::new(4)));
        assert_eq!(spec.tags, vec!["rust", "graphs"]);
    }
}
