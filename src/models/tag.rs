use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{GroupId, TagId, UserId};

/// A label attachable to notes, either global or scoped to one group.
///
/// Name uniqueness is case-insensitive and scoped to (user, group-or-global).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    id: TagId,
    user_id: UserId,
    name: String,
    color: Option<String>,
    is_key: bool,
    group_id: Option<GroupId>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl Tag {
    /// Creates a global tag value with no color.
    ///
    /// # Examples
    ///
    /// ```
    /// use notegraph::{Tag, TagId, UserId};
    ///
    /// let tag = Tag::new(TagId::new(1), UserId::new(1), "urgent");
    /// assert_eq!(tag.name(), "urgent");
    /// assert!(tag.is_global());
    /// ```
    pub fn new(id: TagId, user_id: UserId, name: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            user_id,
            name: name.into(),
            color: None,
            is_key: false,
            group_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: TagId,
        user_id: UserId,
        name: String,
        color: Option<String>,
        is_key: bool,
        group_id: Option<GroupId>,
        created_at: OffsetDateTime,
        updated_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            user_id,
            name,
            color,
            is_key,
            group_id,
            created_at,
            updated_at,
        }
    }

    /// Scopes the tag to a group (`None` makes it global).
    pub fn in_group(mut self, group_id: Option<GroupId>) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn id(&self) -> TagId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    /// Owning group; `None` for global tags.
    pub fn group_id(&self) -> Option<GroupId> {
        self.group_id
    }

    pub fn is_global(&self) -> bool {
        self.group_id.is_none()
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }
}

/// Input for creating a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTag {
    pub name: String,
    pub color: Option<String>,
    pub is_key: bool,
}

impl NewTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }
}

/// Partial update of a tag. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub is_key: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tag_is_global() {
        let tag = Tag::new(TagId::new(1), UserId::new(1), "rust");

        assert!(tag.is_global());
        assert_eq!(tag.group_id(), None);
        assert!(!tag.is_key());
    }

    #[test]
    fn in_group_scopes_the_tag() {
        let tag = Tag::new(TagId::new(1), UserId::new(1), "rust")
            .in_group(Some(GroupId::new(9)))
            .with_color("#FF0000");

        assert!(!tag.is_global());
        assert_eq!(tag.group_id(), Some(GroupId::new(9)));
        assert_eq!(tag.color(), Some("#FF0000"));
    }

    #[test]
    fn new_tag_spec_builders() {
        let spec = NewTag::new("urgent").color("#FFA500").key();
        assert_eq!(spec.name, "urgent");
        assert_eq!(spec.color.as_deref(), Some("#FFA500"));
        assert!(spec.is_key);
    }
}
