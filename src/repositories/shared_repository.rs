//! Shared-unit-of-work repository mode.

use std::marker::PhantomData;

use async_trait::async_trait;
use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;

use crate::entity::Entity;
use crate::error::{Result, StoreError};
use crate::repositories::base::EntityRepository;
use crate::specification::Specification;
use crate::storage::session::{EntitySet, StoreSession};
use crate::unit_of_work::{SharedUnitOfWork, UnitOfWork};

/// A repository delegating every call to an externally-owned unit of
/// work, so several repositories of different entity types participate in
/// one transaction.
///
/// The repository never disposes the unit of work; that is its owner's
/// call. Blocking verbs acquire the handle with `try_lock` and surface a
/// busy unit of work as [`StoreError::Conflict`]; serialization of
/// access is the caller's responsibility, never this crate's.
pub struct SharedRepository<T: Entity, S: StoreSession> {
    uow: SharedUnitOfWork<S>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, S> SharedRepository<T, S>
where
    T: Entity,
    S: EntitySet<T>,
{
    /// Build a repository over a shared unit of work.
    pub fn new(uow: SharedUnitOfWork<S>) -> Self {
        Self {
            uow,
            _entity: PhantomData,
        }
    }

    fn lock_sync(&self) -> Result<MutexGuard<'_, UnitOfWork<S>>> {
        self.uow.try_lock().map_err(|_| {
            StoreError::Conflict("shared unit of work is already in use".into())
        })
    }
}

#[async_trait]
impl<T, S> EntityRepository<T> for SharedRepository<T, S>
where
    T: Entity,
    S: EntitySet<T>,
{
    fn get(&self, spec: &Specification<T>) -> Result<Vec<T>> {
        self.lock_sync()?.get(spec)
    }

    async fn get_async(
        &self,
        spec: &Specification<T>,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>> {
        self.uow.lock().await.get_async(spec, cancel).await
    }

    fn get_where<P>(&self, predicate: P) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool + Send + Sync,
    {
        self.lock_sync()?.get_where(predicate)
    }

    async fn get_where_async<P>(&self, predicate: P, cancel: &CancellationToken) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool + Send + Sync,
    {
        self.uow.lock().await.get_where_async(predicate, cancel).await
    }

    fn get_all(&self) -> Result<Vec<T>> {
        self.lock_sync()?.get_all()
    }

    async fn get_all_async(&self, cancel: &CancellationToken) -> Result<Vec<T>> {
        self.uow.lock().await.get_all_async(cancel).await
    }

    fn find_by_key(&self, key: &T::Key) -> Result<Option<T>> {
        self.lock_sync()?.find_by_key(key)
    }

    async fn find_by_key_async(
        &self,
        key: &T::Key,
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        self.uow.lock().await.find_by_key_async(key, cancel).await
    }

    fn add(&mut self, entity: T) -> Result<T> {
        self.lock_sync()?.add(entity)
    }

    async fn add_async(&mut self, entity: T, cancel: &CancellationToken) -> Result<T> {
        self.uow.lock().await.add_async(entity, cancel).await
    }

    fn add_many(&mut self, entities: Vec<T>) -> Result<()> {
        self.lock_sync()?.add_many(entities)
    }

    async fn add_many_async(
        &mut self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.uow.lock().await.add_many_async(entities, cancel).await
    }

    fn update(&mut self, entity: T) -> Result<T> {
        self.lock_sync()?.update(entity)
    }

    async fn update_async(&mut self, entity: T, cancel: &CancellationToken) -> Result<T> {
        self.uow.lock().await.update_async(entity, cancel).await
    }

    fn update_many(&mut self, entities: Vec<T>) -> Result<()> {
        self.lock_sync()?.update_many(entities)
    }

    async fn update_many_async(
        &mut self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.uow.lock().await.update_many_async(entities, cancel).await
    }

    fn remove(&mut self, entity: T) -> Result<()> {
        self.lock_sync()?.remove(entity)
    }

    async fn remove_async(&mut self, entity: T, cancel: &CancellationToken) -> Result<()> {
        self.uow.lock().await.remove_async(entity, cancel).await
    }

    fn remove_many(&mut self, entities: Vec<T>) -> Result<()> {
        self.lock_sync()?.remove_many(entities)
    }

    async fn remove_many_async(
        &mut self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.uow.lock().await.remove_many_async(entities, cancel).await
    }

    fn save_changes(&mut self) -> Result<u64> {
        self.lock_sync()?.save_changes()
    }

    async fn save_changes_async(&mut self, cancel: &CancellationToken) -> Result<u64> {
        self.uow.lock().await.save_changes_async(cancel).await
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.lock_sync()?.begin_transaction()
    }

    fn commit(&mut self) -> Result<()> {
        self.lock_sync()?.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.lock_sync()?.rollback()
    }

    fn dispose(&mut self) {
        // The unit of work is externally owned; this repository only ever
        // releases its own reference, which happens on drop.
    }
}

impl<T, S> Clone for SharedRepository<T, S>
where
    T: Entity,
    S: StoreSession,
{
    fn clone(&self) -> Self {
        Self {
            uow: self.uow.clone(),
            _entity: PhantomData,
        }
    }
}
