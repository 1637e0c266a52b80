//! Unit of work: one store session, at most one open transaction.
//!
//! A [`UnitOfWork`] coordinates a batch of staged persistence operations
//! against a single session and demarcates the transaction inside which
//! they commit or roll back together. Every data verb exists in a blocking
//! form and a cancellable non-blocking form with identical semantics;
//! transaction control is blocking-only.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::entity::Entity;
use crate::error::{Result, StoreError};
use crate::specification::{QueryPlan, Specification};
use crate::storage::session::{EntitySet, Store, StoreSession};

/// A unit of work shared by several repositories, so they participate in
/// one transaction. The mutex only mediates `&mut` access; serialization
/// of the workflow remains the caller's responsibility.
pub type SharedUnitOfWork<S> = Arc<Mutex<UnitOfWork<S>>>;

/// Opaque token identifying the open transaction of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHandle {
    id: Uuid,
}

impl TransactionHandle {
    fn next() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Identity of the transaction, as it appears in tracing output.
    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug)]
enum TransactionState {
    Idle,
    Open(TransactionHandle),
    Disposed,
}

/// Race a store-boundary future against cancellation. The token is also
/// checked before the future is constructed, so a cancelled call never
/// reads data or sends a staged write.
async fn race<F, R>(cancel: &CancellationToken, fut: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StoreError::Cancelled),
        res = fut => res,
    }
}

/// Coordinates staged CRUD and explicit transaction boundaries over one
/// store session.
pub struct UnitOfWork<S: StoreSession> {
    session: S,
    state: TransactionState,
}

impl<S: StoreSession> UnitOfWork<S> {
    /// Bind a unit of work to an already-open session.
    pub fn new(session: S) -> Self {
        Self {
            session,
            state: TransactionState::Idle,
        }
    }

    /// Open a fresh session on `store` and bind a unit of work to it.
    pub fn connect<St>(store: &St) -> Result<Self>
    where
        St: Store<Session = S>,
    {
        Ok(Self::new(store.connect()?))
    }

    /// Wrap into a [`SharedUnitOfWork`] for shared-mode repositories.
    pub fn into_shared(self) -> SharedUnitOfWork<S> {
        Arc::new(Mutex::new(self))
    }

    /// The underlying session, read-only.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// The handle of the open transaction, if one exists.
    pub fn current_transaction(&self) -> Option<&TransactionHandle> {
        match &self.state {
            TransactionState::Open(handle) => Some(handle),
            _ => None,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if matches!(self.state, TransactionState::Disposed) {
            Err(StoreError::SessionDisposed)
        } else {
            Ok(())
        }
    }

    fn ensure_dispatchable(&self, cancel: &CancellationToken) -> Result<()> {
        self.ensure_live()?;
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }

    // --- queries ---------------------------------------------------------

    /// Resolve a specification: eager loads in plan order, then the
    /// filter, then materialization.
    pub fn get<T>(&self, spec: &Specification<T>) -> Result<Vec<T>>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_live()?;
        self.session.query(&spec.plan())
    }

    /// Cancellable form of [`get`](Self::get).
    pub async fn get_async<T>(
        &self,
        spec: &Specification<T>,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_dispatchable(cancel)?;
        let plan = spec.plan();
        race(cancel, self.session.query_async(&plan, cancel)).await
    }

    /// Apply a plain predicate against the full entity set.
    pub fn get_where<T, P>(&self, predicate: P) -> Result<Vec<T>>
    where
        T: Entity,
        S: EntitySet<T>,
        P: Fn(&T) -> bool + Send + Sync,
    {
        self.ensure_live()?;
        self.session.query(&QueryPlan::filtered(&predicate))
    }

    /// Cancellable form of [`get_where`](Self::get_where).
    pub async fn get_where_async<T, P>(
        &self,
        predicate: P,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>>
    where
        T: Entity,
        S: EntitySet<T>,
        P: Fn(&T) -> bool + Send + Sync,
    {
        self.ensure_dispatchable(cancel)?;
        let plan = QueryPlan::filtered(&predicate);
        race(cancel, self.session.query_async(&plan, cancel)).await
    }

    /// Every entity of type `T`.
    pub fn get_all<T>(&self) -> Result<Vec<T>>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_live()?;
        self.session.query(&QueryPlan::unrestricted())
    }

    /// Cancellable form of [`get_all`](Self::get_all).
    pub async fn get_all_async<T>(&self, cancel: &CancellationToken) -> Result<Vec<T>>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_dispatchable(cancel)?;
        let plan = QueryPlan::unrestricted();
        race(cancel, self.session.query_async(&plan, cancel)).await
    }

    /// Direct identity lookup, bypassing specifications. A key that
    /// matches nothing is `Ok(None)`, never an error.
    pub fn find_by_key<T>(&self, key: &T::Key) -> Result<Option<T>>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_live()?;
        self.session.find_by_key(key)
    }

    /// Cancellable form of [`find_by_key`](Self::find_by_key).
    pub async fn find_by_key_async<T>(
        &self,
        key: &T::Key,
        cancel: &CancellationToken,
    ) -> Result<Option<T>>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_dispatchable(cancel)?;
        race(cancel, self.session.find_by_key_async(key, cancel)).await
    }

    // --- staged writes ---------------------------------------------------

    /// Stage one insert and hand the entity back to the caller.
    pub fn add<T>(&mut self, entity: T) -> Result<T>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_live()?;
        self.session.stage_insert(entity.clone())?;
        Ok(entity)
    }

    /// Cancellable form of [`add`](Self::add). A cancelled token aborts
    /// before anything is staged.
    pub async fn add_async<T>(&mut self, entity: T, cancel: &CancellationToken) -> Result<T>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_dispatchable(cancel)?;
        self.session.stage_insert(entity.clone())?;
        Ok(entity)
    }

    /// Stage many inserts.
    pub fn add_many<T>(&mut self, entities: Vec<T>) -> Result<()>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_live()?;
        self.session.stage_insert_many(entities)
    }

    /// Cancellable form of [`add_many`](Self::add_many).
    pub async fn add_many_async<T>(
        &mut self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_dispatchable(cancel)?;
        self.session.stage_insert_many(entities)
    }

    /// Stage one modification and hand the entity back to the caller.
    pub fn update<T>(&mut self, entity: T) -> Result<T>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_live()?;
        self.session.stage_update(entity.clone())?;
        Ok(entity)
    }

    /// Cancellable form of [`update`](Self::update).
    pub async fn update_async<T>(&mut self, entity: T, cancel: &CancellationToken) -> Result<T>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_dispatchable(cancel)?;
        self.session.stage_update(entity.clone())?;
        Ok(entity)
    }

    /// Stage many modifications.
    pub fn update_many<T>(&mut self, entities: Vec<T>) -> Result<()>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_live()?;
        self.session.stage_update_many(entities)
    }

    /// Cancellable form of [`update_many`](Self::update_many).
    pub async fn update_many_async<T>(
        &mut self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_dispatchable(cancel)?;
        self.session.stage_update_many(entities)
    }

    /// Stage one deletion.
    pub fn remove<T>(&mut self, entity: T) -> Result<()>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_live()?;
        self.session.stage_remove(entity)
    }

    /// Cancellable form of [`remove`](Self::remove).
    pub async fn remove_async<T>(&mut self, entity: T, cancel: &CancellationToken) -> Result<()>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_dispatchable(cancel)?;
        self.session.stage_remove(entity)
    }

    /// Stage many deletions.
    pub fn remove_many<T>(&mut self, entities: Vec<T>) -> Result<()>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_live()?;
        self.session.stage_remove_many(entities)
    }

    /// Cancellable form of [`remove_many`](Self::remove_many).
    pub async fn remove_many_async<T>(
        &mut self,
        entities: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        T: Entity,
        S: EntitySet<T>,
    {
        self.ensure_dispatchable(cancel)?;
        self.session.stage_remove_many(entities)
    }

    /// Flush all staged writes to the store as one atomic batch. Does not
    /// open or close a transaction.
    #[instrument(skip(self))]
    pub fn save_changes(&mut self) -> Result<u64> {
        self.ensure_live()?;
        self.session.save_changes()
    }

    /// Cancellable form of [`save_changes`](Self::save_changes). Once the
    /// store has acknowledged the flush, cancellation cannot undo it.
    pub async fn save_changes_async(&mut self, cancel: &CancellationToken) -> Result<u64> {
        self.ensure_dispatchable(cancel)?;
        race(cancel, self.session.save_changes_async(cancel)).await
    }

    // --- transaction control (blocking only) -----------------------------

    /// Open a transaction on the session. A no-op when one is already
    /// open; the existing handle stays current.
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.ensure_live()?;
        if let TransactionState::Open(handle) = &self.state {
            debug!(transaction_id = %handle.id(), "transaction already open");
            return Ok(());
        }
        self.session.begin_transaction()?;
        let handle = TransactionHandle::next();
        debug!(transaction_id = %handle.id(), "transaction opened");
        self.state = TransactionState::Open(handle);
        Ok(())
    }

    /// Commit the open transaction. A silent no-op when none is open.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_live()?;
        if let TransactionState::Open(handle) = &self.state {
            let id = handle.id();
            self.session.commit_transaction()?;
            debug!(transaction_id = %id, "transaction committed");
            self.state = TransactionState::Idle;
        }
        Ok(())
    }

    /// Roll back the open transaction. A silent no-op when none is open.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_live()?;
        if let TransactionState::Open(handle) = &self.state {
            let id = handle.id();
            self.session.rollback_transaction()?;
            debug!(transaction_id = %id, "transaction rolled back");
            self.state = TransactionState::Idle;
        }
        Ok(())
    }

    /// Open a transaction and return a scope that rolls it back on drop
    /// unless explicitly committed.
    pub fn transaction(&mut self) -> Result<TransactionScope<'_, S>> {
        self.begin_transaction()?;
        Ok(TransactionScope {
            uow: self,
            completed: false,
        })
    }

    /// Release the session. An open transaction is abandoned, which the
    /// store treats as rolled back. Safe to call any number of times;
    /// every later operation fails with [`StoreError::SessionDisposed`].
    pub fn dispose(&mut self) {
        if matches!(self.state, TransactionState::Disposed) {
            return;
        }
        if let TransactionState::Open(handle) = &self.state {
            debug!(transaction_id = %handle.id(), "abandoning open transaction");
        }
        self.session.dispose();
        self.state = TransactionState::Disposed;
    }
}

impl<S: StoreSession> Drop for UnitOfWork<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Borrowed transaction scope over a unit of work.
///
/// Derefs to the unit of work, so staged writes and saves go through the
/// scope directly. Dropping it without [`commit`](Self::commit) rolls the
/// transaction back.
pub struct TransactionScope<'a, S: StoreSession> {
    uow: &'a mut UnitOfWork<S>,
    completed: bool,
}

impl<'a, S: StoreSession> TransactionScope<'a, S> {
    /// Commit the transaction and consume the scope.
    pub fn commit(mut self) -> Result<()> {
        self.completed = true;
        self.uow.commit()
    }

    /// Roll the transaction back and consume the scope.
    pub fn rollback(mut self) -> Result<()> {
        self.completed = true;
        self.uow.rollback()
    }
}

impl<'a, S: StoreSession> std::ops::Deref for TransactionScope<'a, S> {
    type Target = UnitOfWork<S>;

    fn deref(&self) -> &Self::Target {
        self.uow
    }
}

impl<'a, S: StoreSession> std::ops::DerefMut for TransactionScope<'a, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.uow
    }
}

impl<'a, S: StoreSession> Drop for TransactionScope<'a, S> {
    fn drop(&mut self) {
        if !self.completed {
            let _ = self.uow.rollback();
        }
    }
}
