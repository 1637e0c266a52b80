//! Entity capability trait.

use std::fmt::Debug;

/// Marks a type as independently persistable and queryable.
///
/// This is a capability tag, not a base type: it carries no state and no
/// behavior beyond the identity definition used by key lookup. A type that
/// implements `Entity` can be handed to any unit of work or repository in
/// this crate; everything else about its storage shape is the store's
/// concern.
///
/// The key must order and compare consistently for the lifetime of the
/// entity; stores index by it.
pub trait Entity: Debug + Clone + Send + Sync + 'static {
    /// Identity of the entity, one or more key values collapsed into a
    /// single ordered type.
    type Key: Clone + Ord + Debug + Send + Sync + 'static;

    /// The identity of this instance.
    fn key(&self) -> Self::Key;
}
