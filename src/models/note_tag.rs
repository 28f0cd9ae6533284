use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::TagId;

/// Association of a tag with a note.
///
/// Has no lifecycle of its own: rows disappear when either the note or the
/// tag is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTag {
    tag_id: TagId,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl NoteTag {
    pub fn new(tag_id: TagId, created_at: OffsetDateTime) -> Self {
        Self { tag_id, created_at }
    }

    pub fn tag_id(&self) -> TagId {
        self.tag_id
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_tag_id_as_integer() {
        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let nt = NoteTag::new(TagId::new(3), now);
        let json = serde_json::to_value(&nt).unwrap();

        assert_eq!(json["tag_id"], 3);
        assert!(json["created_at"].is_string());
    }
}
