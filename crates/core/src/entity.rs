//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// A payment obligation is the canonical entity here: its status and notes
/// change over time while its identity (and billing key) never does.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
