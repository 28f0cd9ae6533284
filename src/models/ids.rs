use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database id.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the underlying ID value.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Identifier of the owning user (tenant). Authentication lives outside
    /// this crate; every operation receives the acting user explicitly.
    UserId
);

define_id!(
    /// Unique identifier for a note.
    NoteId
);

define_id!(
    /// Unique identifier for a group.
    GroupId
);

define_id!(
    /// Unique identifier for a tag.
    TagId
);

define_id!(
    /// Unique identifier for a note link.
    LinkId
);

define_id!(
    /// Unique identifier for an attachment record.
    AttachmentId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_id_serializes_as_raw_integer() {
        let id = NoteId::new(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");

        let deserialized: NoteId = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, id);
    }

    #[test]
    fn ids_order_by_raw_value() {
        let mut ids = vec![GroupId::new(3), GroupId::new(1), GroupId::new(2)];
        ids.sort();
        assert_eq!(ids, vec![GroupId::new(1), GroupId::new(2), GroupId::new(3)]);
    }

    #[test]
    fn ids_are_not_interchangeable() {
        // These lines would fail to compile:
        // let note_id: NoteId = TagId::new(1);
        // let link_id: LinkId = NoteId::new(1);
        let note_id = NoteId::new(1);
        let link_id = LinkId::new(1);

        assert_eq!(note_id.get(), link_id.get());
        assert_eq!(format!("{note_id}"), "1");
    }
}
