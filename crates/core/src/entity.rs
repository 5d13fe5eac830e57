//! Entity traits: identity plus the soft-delete lifecycle shared by every row.

/// A record with a stable identity.
pub trait Entity {
    /// Strongly-typed row identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> Self::Id;
}

/// A record that is hidden by a deletion marker instead of being removed.
///
/// Soft-deleted records stay readable for audit purposes but are excluded from
/// aggregates and from existence checks.
pub trait SoftDeletable: Entity {
    fn is_deleted(&self) -> bool;

    fn is_live(&self) -> bool {
        !self.is_deleted()
    }
}
