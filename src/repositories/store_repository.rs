//! Session-owning repository mode.

use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::entity::Entity;
use crate::error::Result;
use crate::repositories::base::EntityRepository;
use crate::specification::Specification;
use crate::storage::session::{EntitySet, Store, StoreSession};
use crate::unit_of_work::UnitOfWork;

/// A repository that holds its own store session. Its transaction calls
/// act on that session alone, and disposing the repository releases it.
pub struct StoreRepository<T: Entity, S: StoreSession> {
    uow: UnitOfWork<S>,
    _entity: PhantomData<fn() -> T>,
}

impl<T, S> StoreRepository<T, S>
where
    T: Entity,
    S: EntitySet<T>,
{
    /// Build a repository over an already-open session.
    pub fn new(session: S) -> Self {
        Self {
            uow: UnitOfWork::new(session),
            _entity: PhantomData,
        }
    }

    /// Open a fresh session on `store` and build a repository over it.
    pub fn connect<St>(store: &St) -> Result<Self>
    where
        St: Store<Session = S>,
    {
        Ok(Self::new(store.connect()?))
    }

    /// The unit of work backing this repository, read-only.
    pub fn unit_of_work(&self) -> &UnitOfWork<S> {
        &self.uow
    }
}

#[async_trait]
impl<T, S> EntityRepository<T> for StoreRepository<T, S>
where
    T: Entity,
    S: EntitySet<T>,
{
    fn get(&self, spec: &Specification<T>) -> Result<Vec<T>> {
        self.uow.get(spec)
    }

    async fn get_async(
        &self,
        spec: &Specification<T>,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>> {
        self.uow.get_async(spec, cancel).await
    }

    fn get_where<P>(&self, predicate: P) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool + Send + Sync,
    {
        self.uow.get_where(predicate)
    }

    async fn get_where_async<P>(&self, predicate: P, cancel: &CancellationToken) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool + Send + Sync,
    {
        self.uow.get_where_async(predicate, cancel).await
    }

    fn get_all(&self) -> Result<Vec<T>> {
        self.uow.get_all()
    }

    async fn get_all_async(&self, cancel: &CancellationToken) -> Result<Vec<T>> {
        self.uow.get_all_async(cancel).await
    }

    fn find_by_key(&self, key: &T::Key) -> Result<Option<T>> {
        self.uow.find_by_key(key)
    }

    async fn find_by_key_async(
        &self,
        key: &T::Key,
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        self.uow.find_by_key_async(key, cancel).await
    }

    fn add(&mut self, entity: T) -> Result<T> {
        self.uow.add(entity)
    }

    async fn add_async(&mut self, entity: T, cancel: &CancellationToken) -> Result<T> {
        self.uow.add_async(entity, cancel).await
    }

    fn add_many(&mut self, entities: Vec<T>) -> Result<()> {
        self.uow.add_many(entities)
    }

    async fn add_many_async(
        &mut self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.uow.add_many_async(entities, cancel).await
    }

    fn update(&mut self, entity: T) -> Result<T> {
        self.uow.update(entity)
    }

    async fn update_async(&mut self, entity: T, cancel: &CancellationToken) -> Result<T> {
        self.uow.update_async(entity, cancel).await
    }

    fn update_many(&mut self, entities: Vec<T>) -> Result<()> {
        self.uow.update_many(entities)
    }

    async fn update_many_async(
        &mut self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.uow.update_many_async(entities, cancel).await
    }

    fn remove(&mut self, entity: T) -> Result<()> {
        self.uow.remove(entity)
    }

    async fn remove_async(&mut self, entity: T, cancel: &CancellationToken) -> Result<()> {
        self.uow.remove_async(entity, cancel).await
    }

    fn remove_many(&mut self, entities: Vec<T>) -> Result<()> {
        self.uow.remove_many(entities)
    }

    async fn remove_many_async(
        &mut self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.uow.remove_many_async(entities, cancel).await
    }

    fn save_changes(&mut self) -> Result<u64> {
        self.uow.save_changes()
    }

    async fn save_changes_async(&mut self, cancel: &CancellationToken) -> Result<u64> {
        self.uow.save_changes_async(cancel).await
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.uow.begin_transaction()
    }

    fn commit(&mut self) -> Result<()> {
        self.uow.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.uow.rollback()
    }

    fn dispose(&mut self) {
        self.uow.dispose();
    }
}
