//! Group membership set reconciliation.
//!
//! Pure set difference between the remote member list and the local
//! mirror: upserts are the full remote set (insert-if-absent keeps them
//! idempotent), deletes are exactly the local members no longer present
//! remotely.

use std::collections::BTreeSet;

use uuid::Uuid;

/// Membership operations for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDiff {
    /// Members to insert-if-absent
    pub to_upsert: BTreeSet<Uuid>,
    /// Members to remove
    pub to_delete: BTreeSet<Uuid>,
}

impl MembershipDiff {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.to_upsert.is_empty()
    }
}

/// Diff the remote member set against the local mirror's member set.
#[must_use]
pub fn diff_members(remote: &BTreeSet<Uuid>, local: &BTreeSet<Uuid>) -> MembershipDiff {
    MembershipDiff {
        to_upsert: remote.clone(),
        to_delete: local.difference(remote).copied().collect(),
    }
}
