//! Store abstraction: the seam between the data-access layer and a
//! concrete persistence engine.
//!
//! A [`Store`] hands out independent [`StoreSession`]s. A session stages
//! writes, flushes them atomically, and carries at most one engine-level
//! transaction. Per-entity-type operations live on [`EntitySet`], which a
//! backend implements for every entity type it can hold.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::entity::Entity;
use crate::error::Result;
use crate::specification::QueryPlan;

/// A persistence engine that can open sessions.
///
/// The store value itself is the connection descriptor: it knows how to
/// reach the engine and hands out as many independent sessions as callers
/// ask for.
pub trait Store {
    /// Session type this store produces.
    type Session: StoreSession;

    /// Open a fresh session.
    fn connect(&self) -> Result<Self::Session>;
}

/// One session against a store: staged writes, an optional engine
/// transaction, and a disposal lifecycle.
///
/// A session is not safe for concurrent use from multiple workflows; the
/// `&mut self` receivers encode that for the owning case, and callers of
/// shared handles are responsible for serialization.
#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Flush every staged write as one atomic batch and return the number
    /// of affected rows. Does not open or close a transaction.
    fn save_changes(&mut self) -> Result<u64>;

    /// Cancellable form of [`save_changes`](Self::save_changes). A token
    /// cancelled before dispatch aborts without sending any staged write.
    async fn save_changes_async(&mut self, cancel: &CancellationToken) -> Result<u64>;

    /// Open an engine-level transaction. Blocking only.
    fn begin_transaction(&mut self) -> Result<()>;

    /// Commit the open engine-level transaction, if any. Blocking only.
    fn commit_transaction(&mut self) -> Result<()>;

    /// Roll back the open engine-level transaction, if any. Blocking only.
    fn rollback_transaction(&mut self) -> Result<()>;

    /// Release the session. An open transaction is abandoned, which the
    /// engine treats as rolled back. Must be idempotent.
    fn dispose(&mut self);

    /// Whether [`dispose`](Self::dispose) has been called.
    fn is_disposed(&self) -> bool;
}

/// Per-entity-type operations of a session.
///
/// The `_many` forms default to looping the single-entity form; backends
/// with a cheaper bulk path should override them.
#[async_trait]
pub trait EntitySet<T: Entity>: StoreSession {
    /// Resolve a query plan: apply every include in plan order, then the
    /// filter, then materialize.
    fn query(&self, plan: &QueryPlan<'_, T>) -> Result<Vec<T>>;

    /// Cancellable form of [`query`](Self::query).
    async fn query_async(
        &self,
        plan: &QueryPlan<'_, T>,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>>;

    /// Identity lookup. A key that matches no row is `Ok(None)`, never an
    /// error.
    fn find_by_key(&self, key: &T::Key) -> Result<Option<T>>;

    /// Cancellable form of [`find_by_key`](Self::find_by_key).
    async fn find_by_key_async(
        &self,
        key: &T::Key,
        cancel: &CancellationToken,
    ) -> Result<Option<T>>;

    /// Stage one insert.
    fn stage_insert(&mut self, entity: T) -> Result<()>;

    /// Stage many inserts.
    fn stage_insert_many(&mut self, entities: Vec<T>) -> Result<()> {
        for entity in entities {
            self.stage_insert(entity)?;
        }
        Ok(())
    }

    /// Stage one modification of an existing entity.
    fn stage_update(&mut self, entity: T) -> Result<()>;

    /// Stage many modifications.
    fn stage_update_many(&mut self, entities: Vec<T>) -> Result<()> {
        for entity in entities {
            self.stage_update(entity)?;
        }
        Ok(())
    }

    /// Stage one deletion.
    fn stage_remove(&mut self, entity: T) -> Result<()>;

    /// Stage many deletions.
    fn stage_remove_many(&mut self, entities: Vec<T>) -> Result<()> {
        for entity in entities {
            self.stage_remove(entity)?;
        }
        Ok(())
    }
}
