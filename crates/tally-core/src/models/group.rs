//! Group and membership models

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-assigned identifier of a mirrored group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub i64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The mutable content fields of a group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupContent {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A group row in the mirror store.
///
/// Groups form a forest like tasks; memberships hang off each group and
/// are cascaded away by the store when the group row is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Store-assigned identifier
    pub id: GroupId,
    /// Remote identifier, unique when present
    #[serde(default)]
    pub external_id: Option<String>,
    /// Local parent reference (`None` for roots)
    #[serde(default)]
    pub parent_id: Option<GroupId>,
    #[serde(flatten)]
    pub content: GroupContent,
}

/// A group/user membership pair.
///
/// At most one row exists per pair; the set under a group mirrors the
/// remote group's member list after each pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: GroupId,
    pub user_uuid: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_content_equality() {
        let a = GroupContent {
            name: "Platform".to_string(),
            description: None,
        };
        let mut b = a.clone();
        assert_eq!(a, b);

        b.description = Some("Infra team".to_string());
        assert_ne!(a, b);
    }

    #[test]
    fn membership_pair_roundtrips_through_json() {
        let membership = Membership {
            group_id: GroupId(7),
            user_uuid: "a7f5f35426684bcd85c3f85744246ba1".parse().unwrap(),
        };
        let json = serde_json::to_string(&membership).unwrap();
        let back: Membership = serde_json::from_str(&json).unwrap();
        assert_eq!(membership, back);
    }
}
