//! Pluggable content comparison for the tree reconciler.
//!
//! "Same identity" and "same content" are decided separately: identity
//! matching lives in the reconciler, content comparison is a swappable
//! strategy so callers can widen or narrow what counts as a change.

/// Strategy deciding whether an already-matched entity must be updated.
pub trait EqualityPolicy<C> {
    /// `true` when the local content already matches the remote content
    /// and no write is needed.
    fn equal(&self, remote: &C, local: &C) -> bool;
}

/// Field-by-field comparison over exactly the mutable content fields.
///
/// Content types only carry mutable fields (names, descriptions, flags,
/// custom fields, day-granularity validity dates); volatile values such
/// as store-assigned ids and timestamps are excluded by construction, so
/// repeated passes never see spurious differences.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentEquality;

impl<C: PartialEq> EqualityPolicy<C> for ContentEquality {
    fn equal(&self, remote: &C, local: &C) -> bool {
        remote == local
    }
}
