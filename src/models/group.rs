use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{GroupId, UserId};

/// Name of the root group notes fall into when created without one.
pub const DEFAULT_GROUP_NAME: &str = "Default";
/// Color used when neither a group nor any of its ancestors defines one.
pub const DEFAULT_GROUP_COLOR: &str = "#6c757d";
/// Icon used when neither a group nor any of its ancestors defines one.
pub const DEFAULT_GROUP_ICON: &str = "fas fa-folder";
/// Icon given to the lazily created default group.
pub const DEFAULT_GROUP_OWN_ICON: &str = "fas fa-sticky-note";

/// A named container in a user's group forest.
///
/// The tree is stored as parent-id indirection only; walking up means
/// looking up `parent_id` repeatedly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<GroupId>,
    pub sort_order: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Group {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Input for creating a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<GroupId>,
    pub sort_order: i32,
}

impl NewGroup {
    /// A root group with the default gray color.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: Some(DEFAULT_GROUP_COLOR.to_string()),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn parent(mut self, parent_id: GroupId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn color(mut self, color: Option<String>) -> Self {
        self.color = color;
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }
}

/// Partial update of a group's descriptive fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub sort_order: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_group_defaults_to_gray_root() {
        let spec = NewGroup::new("Work");
        assert_eq!(spec.color.as_deref(), Some(DEFAULT_GROUP_COLOR));
        assert_eq!(spec.parent_id, None);
        assert_eq!(spec.sort_order, 0);
    }

    #[test]
    fn builder_methods_set_fields() {
        let spec = NewGroup::new("Rust")
            .parent(GroupId::new(2))
            .description("language notes")
            .color(None)
            .icon("fas fa-crab")
            .sort_order(3);

        assert_eq!(spec.parent_id, Some(GroupId::new(2)));
        assert_eq!(spec.color, None);
        assert_eq!(spec.icon.as_deref(), Some("fas fa-crab"));
        assert_eq!(spec.sort_order, 3);
    }
}
