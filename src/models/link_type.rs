use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic relationship carried by a note link.
///
/// Stored and serialized in `SCREAMING_SNAKE_CASE` (e.g. `PARENT_OF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkType {
    RelatesTo,
    References,
    FollowsFrom,
    Contradicts,
    Extends,
    Summarizes,
    Implements,
    InspiredBy,
    ParentOf,
    ChildOf,
    SimilarTo,
    Prerequisites,
    DerivedFrom,
    Updates,
    Obsoletes,
    Cites,
    Mentions,
}

impl LinkType {
    /// Every link type, in declaration order.
    pub const ALL: [LinkType; 17] = [
        Self::RelatesTo,
        Self::References,
        Self::FollowsFrom,
        Self::Contradicts,
        Self::Extends,
        Self::Summarizes,
        Self::Implements,
        Self::InspiredBy,
        Self::ParentOf,
        Self::ChildOf,
        Self::SimilarTo,
        Self::Prerequisites,
        Self::DerivedFrom,
        Self::Updates,
        Self::Obsoletes,
        Self::Cites,
        Self::Mentions,
    ];

    /// Returns the stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RelatesTo => "RELATES_TO",
            Self::References => "REFERENCES",
            Self::FollowsFrom => "FOLLOWS_FROM",
            Self::Contradicts => "CONTRADICTS",
            Self::Extends => "EXTENDS",
            Self::Summarizes => "SUMMARIZES",
            Self::Implements => "IMPLEMENTS",
            Self::InspiredBy => "INSPIRED_BY",
            Self::ParentOf => "PARENT_OF",
            Self::ChildOf => "CHILD_OF",
            Self::SimilarTo => "SIMILAR_TO",
            Self::Prerequisites => "PREREQUISITES",
            Self::DerivedFrom => "DERIVED_FROM",
            Self::Updates => "UPDATES",
            Self::Obsoletes => "OBSOLETES",
            Self::Cites => "CITES",
            Self::Mentions => "MENTIONS",
        }
    }

    /// Relationship used for the reverse edge of a bidirectional link.
    ///
    /// Paired types map onto each other and `CITES` maps to `MENTIONS`.
    /// Everything else falls back to `RELATES_TO`, which leaves `RELATES_TO`
    /// as the only symmetric type.
    pub fn inverse(self) -> Self {
        match self {
            Self::ParentOf => Self::ChildOf,
            Self::ChildOf => Self::ParentOf,
            Self::FollowsFrom => Self::Prerequisites,
            Self::Prerequisites => Self::FollowsFrom,
            Self::Updates => Self::Obsoletes,
            Self::Obsoletes => Self::Updates,
            Self::Cites => Self::Mentions,
            _ => Self::RelatesTo,
        }
    }

    /// True when the type is its own inverse.
    pub fn is_symmetric(self) -> bool {
        self.inverse() == self
    }

    pub fn is_hierarchical(self) -> bool {
        matches!(self, Self::ParentOf | Self::ChildOf)
    }

    pub fn is_sequential(self) -> bool {
        matches!(self, Self::FollowsFrom | Self::Prerequisites | Self::Updates)
    }

    pub fn is_content_based(self) -> bool {
        matches!(
            self,
            Self::SimilarTo | Self::Extends | Self::Summarizes | Self::DerivedFrom
        )
    }

    pub fn is_conflicting(self) -> bool {
        matches!(self, Self::Contradicts | Self::Obsoletes)
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown link type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown link type: {0}")]
pub struct ParseLinkTypeError(String);

impl FromStr for LinkType {
    type Err = ParseLinkTypeError;

    /// Parses case-insensitively; `-` is accepted in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| ParseLinkTypeError(s.to_string()))
    }
}

impl ToSql for LinkType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LinkType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paired_types_invert_each_other() {
        let pairs = [
            (LinkType::ParentOf, LinkType::ChildOf),
            (LinkType::FollowsFrom, LinkType::Prerequisites),
            (LinkType::Updates, LinkType::Obsoletes),
        ];
        for (a, b) in pairs {
            assert_eq!(a.inverse(), b);
            assert_eq!(b.inverse(), a);
            assert!(!a.is_symmetric());
        }
    }

    #[test]
    fn cites_is_answered_by_mentions_one_way() {
        assert_eq!(LinkType::Cites.inverse(), LinkType::Mentions);
        assert_eq!(LinkType::Mentions.inverse(), LinkType::RelatesTo);
    }

    #[test]
    fn relates_to_is_the_only_symmetric_type() {
        let symmetric: Vec<LinkType> = LinkType::ALL
            .into_iter()
            .filter(|t| t.is_symmetric())
            .collect();
        assert_eq!(symmetric, vec![LinkType::RelatesTo]);
    }

    #[test]
    fn types_without_counterpart_fall_back_to_relates_to() {
        assert_eq!(LinkType::Extends.inverse(), LinkType::RelatesTo);
        assert_eq!(LinkType::Summarizes.inverse(), LinkType::RelatesTo);
        assert_eq!(LinkType::InspiredBy.inverse(), LinkType::RelatesTo);
        assert_eq!(LinkType::SimilarTo.inverse(), LinkType::RelatesTo);
        assert_eq!(LinkType::Contradicts.inverse(), LinkType::RelatesTo);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("parent_of".parse::<LinkType>(), Ok(LinkType::ParentOf));
        assert_eq!("Follows-From".parse::<LinkType>(), Ok(LinkType::FollowsFrom));
        assert!("likes".parse::<LinkType>().is_err());
    }

    #[test]
    fn every_type_round_trips_through_its_name() {
        for t in LinkType::ALL {
            assert_eq!(t.as_str().parse::<LinkType>(), Ok(t));
        }
    }

    #[test]
    fn serializes_in_screaming_snake_case() {
        let json = serde_json::to_string(&LinkType::DerivedFrom).unwrap();
        assert_eq!(json, r#""DERIVED_FROM""#);
    }

    #[test]
    fn categories() {
        assert!(LinkType::ChildOf.is_hierarchical());
        assert!(LinkType::Updates.is_sequential());
        assert!(LinkType::Summarizes.is_content_based());
        assert!(LinkType::Obsoletes.is_conflicting());
        assert!(!LinkType::RelatesTo.is_conflicting());
    }
}
