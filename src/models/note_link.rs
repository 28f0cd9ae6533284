use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::{LinkId, LinkType, NoteId};

/// Lowest weight on the conventional scale.
pub const MIN_WEIGHT: i32 = 1;
/// Highest weight on the conventional scale.
pub const MAX_WEIGHT: i32 = 10;

/// A directed, typed, weighted edge between two notes.
///
/// At most one link exists per (source, target, type); self-links are rejected.
/// `is_bidirectional` marks a symmetric link that traversal may follow in
/// both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteLink {
    pub id: LinkId,
    pub source: NoteId,
    pub target: NoteId,
    pub link_type: LinkType,
    pub weight: i32,
    pub is_bidirectional: bool,
    pub metadata: BTreeMap<String, Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl NoteLink {
    pub fn is_strong(&self) -> bool {
        self.weight >= 7
    }

    pub fn is_weak(&self) -> bool {
        self.weight <= 3
    }

    pub fn involves(&self, note: NoteId) -> bool {
        self.source == note || self.target == note
    }

    /// Returns the opposite endpoint, or `None` if `note` is not on this link.
    pub fn other_end(&self, note: NoteId) -> Option<NoteId> {
        if self.source == note {
            Some(self.target)
        } else if self.target == note {
            Some(self.source)
        } else {
            None
        }
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }
}

/// Clamps a weight to the 1-10 scale.
pub fn clamp_weight(weight: i32) -> i32 {
    weight.clamp(MIN_WEIGHT, MAX_WEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(weight: i32) -> NoteLink {
        let now = OffsetDateTime::now_utc();
        NoteLink {
            id: LinkId::new(1),
            source: NoteId::new(1),
            target: NoteId::new(2),
            link_type: LinkType::Extends,
            weight,
            is_bidirectional: false,
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn strength_thresholds() {
        assert!(link(7).is_strong());
        assert!(!link(6).is_strong());
        assert!(link(3).is_weak());
        assert!(!link(4).is_weak());
    }

    #[test]
    fn other_end_returns_opposite_note() {
        let l = link(1);
        assert_eq!(l.other_end(NoteId::new(1)), Some(NoteId::new(2)));
        assert_eq!(l.other_end(NoteId::new(2)), Some(NoteId::new(1)));
        assert_eq!(l.other_end(NoteId::new(3)), None);
        assert!(l.involves(NoteId::new(2)));
    }

    #[test]
    fn metadata_set_and_get() {
        let mut l = link(1);
        l.set_metadata("reason", "same topic");
        assert_eq!(
            l.metadata_value("reason"),
            Some(&Value::String("same topic".into()))
        );
        assert_eq!(l.metadata_value("missing"), None);
    }

    #[test]
    fn weights_clamp_to_scale() {
        assert_eq!(clamp_weight(0), 1);
        assert_eq!(clamp_weight(5), 5);
        assert_eq!(clamp_weight(42), 10);
    }
}
