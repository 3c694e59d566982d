//! Aggregate root trait for stateful domain models.

/// Aggregate root marker + minimal interface.
///
/// Postings are the aggregate roots of this domain: every mutation of a
/// posting or of one of its records goes through the posting and bumps its
/// version, so hosts can cheaply detect that cached presentation state (drawn
/// destination overlays, quantity widgets) has gone stale.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Counts applied mutations since construction (or since restore).
    fn version(&self) -> u64;
}
