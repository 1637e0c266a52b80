//! The consolidated repository contract.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::entity::Entity;
use crate::error::Result;
use crate::specification::Specification;

/// Entity-typed repository: the unit-of-work verb set scoped to one
/// entity type.
///
/// There is exactly one contract; the two concrete modes differ only in
/// who owns the session. `StoreRepository` owns its own,
/// `SharedRepository` delegates to an externally-owned unit of work so
/// several repositories can share one transaction. A concrete repository
/// commits to one mode; there is no mixing within an instance.
#[async_trait]
pub trait EntityRepository<T: Entity>: Send {
    /// Resolve a specification.
    fn get(&self, spec: &Specification<T>) -> Result<Vec<T>>;

    /// Cancellable form of [`get`](Self::get).
    async fn get_async(
        &self,
        spec: &Specification<T>,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>>;

    /// Apply a plain predicate against the full entity set.
    fn get_where<P>(&self, predicate: P) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool + Send + Sync;

    /// Cancellable form of [`get_where`](Self::get_where).
    async fn get_where_async<P>(&self, predicate: P, cancel: &CancellationToken) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool + Send + Sync;

    /// Every entity of the repository's type.
    fn get_all(&self) -> Result<Vec<T>>;

    /// Cancellable form of [`get_all`](Self::get_all).
    async fn get_all_async(&self, cancel: &CancellationToken) -> Result<Vec<T>>;

    /// Identity lookup; a missing key is `Ok(None)`, never an error.
    fn find_by_key(&self, key: &T::Key) -> Result<Option<T>>;

    /// Cancellable form of [`find_by_key`](Self::find_by_key).
    async fn find_by_key_async(
        &self,
        key: &T::Key,
        cancel: &CancellationToken,
    ) -> Result<Option<T>>;

    /// Stage one insert and hand the entity back.
    fn add(&mut self, entity: T) -> Result<T>;

    /// Cancellable form of [`add`](Self::add).
    async fn add_async(&mut self, entity: T, cancel: &CancellationToken) -> Result<T>;

    /// Stage many inserts.
    fn add_many(&mut self, entities: Vec<T>) -> Result<()>;

    /// Cancellable form of [`add_many`](Self::add_many).
    async fn add_many_async(&mut self, entities: Vec<T>, cancel: &CancellationToken)
    -> Result<()>;

    /// Stage one modification and hand the entity back.
    fn update(&mut self, entity: T) -> Result<T>;

    /// Cancellable form of [`update`](Self::update).
    async fn update_async(&mut self, entity: T, cancel: &CancellationToken) -> Result<T>;

    /// Stage many modifications.
    fn update_many(&mut self, entities: Vec<T>) -> Result<()>;

    /// Cancellable form of [`update_many`](Self::update_many).
    async fn update_many_async(
        &mut self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Stage one deletion.
    fn remove(&mut self, entity: T) -> Result<()>;

    /// Cancellable form of [`remove`](Self::remove).
    async fn remove_async(&mut self, entity: T, cancel: &CancellationToken) -> Result<()>;

    /// Stage many deletions.
    fn remove_many(&mut self, entities: Vec<T>) -> Result<()>;

    /// Cancellable form of [`remove_many`](Self::remove_many).
    async fn remove_many_async(
        &mut self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Flush all staged writes as one atomic batch.
    fn save_changes(&mut self) -> Result<u64>;

    /// Cancellable form of [`save_changes`](Self::save_changes).
    async fn save_changes_async(&mut self, cancel: &CancellationToken) -> Result<u64>;

    /// Open a transaction. Blocking only; no-op when one is open.
    fn begin_transaction(&mut self) -> Result<()>;

    /// Commit the open transaction; silent no-op when none is open.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction; silent no-op when none is open.
    fn rollback(&mut self) -> Result<()>;

    /// Release what this repository owns. Owning mode disposes its unit
    /// of work; shared mode only drops its reference.
    fn dispose(&mut self);
}
