//! In-memory reference backend.
//!
//! `MemoryStore` keeps one ordered table per entity type behind a shared
//! lock; every session it hands out sees the same committed data.
//! Sessions stage writes locally and flush them all-or-nothing, and a
//! transaction is a snapshot overlay: saves made inside it stay invisible
//! to other sessions until commit publishes them.

use std::any::{Any, TypeId, type_name};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::entity::Entity;
use crate::error::{Result, StoreError};
use crate::specification::QueryPlan;
use crate::storage::StoreOptions;
use crate::storage::session::{EntitySet, Store, StoreSession};

/// Type-erased table so one map can hold every entity type.
trait AnyTable: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_box(&self) -> Box<dyn AnyTable>;
}

struct TableState<T: Entity> {
    rows: BTreeMap<T::Key, T>,
}

impl<T: Entity> TableState<T> {
    fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Entity> Clone for TableState<T> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
        }
    }
}

impl<T: Entity> AnyTable for TableState<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn AnyTable> {
        Box::new(self.clone())
    }
}

#[derive(Default)]
struct Tables {
    map: HashMap<TypeId, Box<dyn AnyTable>>,
}

impl Clone for Tables {
    fn clone(&self) -> Self {
        Self {
            map: self
                .map
                .iter()
                .map(|(id, table)| (*id, table.clone_box()))
                .collect(),
        }
    }
}

impl Tables {
    fn table<T: Entity>(&self) -> Option<&TableState<T>> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|table| table.as_any().downcast_ref())
    }

    fn table_mut<T: Entity>(&mut self) -> &mut TableState<T> {
        self.map
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(TableState::<T>::new()))
            .as_any_mut()
            .downcast_mut()
            .expect("table registered under a different entity type")
    }
}

/// A staged write, replayable so a failed flush leaves the batch intact.
type StagedWrite = Box<dyn Fn(&mut Tables, &StoreOptions) -> Result<u64> + Send + Sync>;

/// Shared in-memory store. Cloning shares the same committed data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    options: StoreOptions,
}

impl MemoryStore {
    /// An empty store with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store with the given options.
    pub fn with_options(options: StoreOptions) -> Self {
        Self {
            tables: Arc::default(),
            options,
        }
    }
}

impl Store for MemoryStore {
    type Session = MemorySession;

    fn connect(&self) -> Result<MemorySession> {
        Ok(MemorySession {
            shared: Arc::clone(&self.tables),
            options: self.options.clone(),
            staged: Vec::new(),
            overlay: None,
            applied_includes: Mutex::new(Vec::new()),
            disposed: false,
        })
    }
}

/// One session against a [`MemoryStore`].
pub struct MemorySession {
    shared: Arc<RwLock<Tables>>,
    options: StoreOptions,
    staged: Vec<StagedWrite>,
    overlay: Option<Tables>,
    applied_includes: Mutex<Vec<String>>,
    disposed: bool,
}

impl MemorySession {
    /// Every include directive this session has applied, in order. Stands
    /// in for the join generation a SQL backend would perform; tests
    /// assert against it.
    pub fn applied_includes(&self) -> Vec<String> {
        lock_clean(&self.applied_includes).clone()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            Err(StoreError::SessionDisposed)
        } else {
            Ok(())
        }
    }

    fn read_shared(&self) -> RwLockReadGuard<'_, Tables> {
        self.shared.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_shared(&self) -> RwLockWriteGuard<'_, Tables> {
        self.shared.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn lock_clean<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Run the whole batch against a scratch copy and publish only on success,
/// so a failing write persists nothing.
fn apply_batch(target: &mut Tables, staged: &[StagedWrite], options: &StoreOptions) -> Result<u64> {
    let mut scratch = target.clone();
    let mut affected = 0;
    for write in staged {
        affected += write(&mut scratch, options)?;
    }
    *target = scratch;
    Ok(affected)
}

fn collect<T: Entity>(tables: &Tables, plan: &QueryPlan<'_, T>) -> Vec<T> {
    match tables.table::<T>() {
        Some(table) => table
            .rows
            .values()
            .filter(|entity| plan.matches(entity))
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    fn save_changes(&mut self) -> Result<u64> {
        self.ensure_live()?;
        if self.staged.is_empty() {
            return Ok(0);
        }
        let affected = match &mut self.overlay {
            Some(tables) => apply_batch(tables, &self.staged, &self.options)?,
            None => {
                let mut shared = self.shared.write().unwrap_or_else(|e| e.into_inner());
                apply_batch(&mut shared, &self.staged, &self.options)?
            }
        };
        self.staged.clear();
        debug!(affected, "flushed staged writes");
        Ok(affected)
    }

    async fn save_changes_async(&mut self, cancel: &CancellationToken) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        self.save_changes()
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.overlay.is_none() {
            let snapshot = self.read_shared().clone();
            self.overlay = Some(snapshot);
        }
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<()> {
        self.ensure_live()?;
        // The overlay is a full snapshot; commit publishes it wholesale.
        if let Some(tables) = self.overlay.take() {
            *self.write_shared() = tables;
        }
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.overlay = None;
        Ok(())
    }

    fn dispose(&mut self) {
        self.overlay = None;
        self.staged.clear();
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[async_trait]
impl<T: Entity> EntitySet<T> for MemorySession {
    fn query(&self, plan: &QueryPlan<'_, T>) -> Result<Vec<T>> {
        self.ensure_live()?;
        if !plan.includes.is_empty() {
            let mut applied = lock_clean(&self.applied_includes);
            applied.extend(plan.includes.iter().map(|path| path.to_string()));
        }
        let rows = match &self.overlay {
            Some(tables) => collect(tables, plan),
            None => collect(&self.read_shared(), plan),
        };
        Ok(rows)
    }

    async fn query_async(
        &self,
        plan: &QueryPlan<'_, T>,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        self.query(plan)
    }

    fn find_by_key(&self, key: &T::Key) -> Result<Option<T>> {
        self.ensure_live()?;
        let found = match &self.overlay {
            Some(tables) => tables.table::<T>().and_then(|t| t.rows.get(key).cloned()),
            None => self
                .read_shared()
                .table::<T>()
                .and_then(|t| t.rows.get(key).cloned()),
        };
        Ok(found)
    }

    async fn find_by_key_async(
        &self,
        key: &T::Key,
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        self.find_by_key(key)
    }

    fn stage_insert(&mut self, entity: T) -> Result<()> {
        self.ensure_live()?;
        self.staged.push(Box::new(move |tables, _options| {
            let table = tables.table_mut::<T>();
            let key = entity.key();
            if table.rows.contains_key(&key) {
                return Err(StoreError::Constraint(format!(
                    "duplicate key {key:?} for {}",
                    type_name::<T>()
                )));
            }
            table.rows.insert(key, entity.clone());
            Ok(1)
        }));
        Ok(())
    }

    fn stage_update(&mut self, entity: T) -> Result<()> {
        self.ensure_live()?;
        self.staged.push(Box::new(move |tables, options| {
            let table = tables.table_mut::<T>();
            let key = entity.key();
            if table.rows.contains_key(&key) {
                table.rows.insert(key, entity.clone());
                Ok(1)
            } else if options.strict_writes() {
                Err(StoreError::Conflict(format!(
                    "update of missing row {key:?} for {}",
                    type_name::<T>()
                )))
            } else {
                Ok(0)
            }
        }));
        Ok(())
    }

    fn stage_remove(&mut self, entity: T) -> Result<()> {
        self.ensure_live()?;
        self.staged.push(Box::new(move |tables, options| {
            let table = tables.table_mut::<T>();
            let key = entity.key();
            if table.rows.remove(&key).is_some() {
                Ok(1)
            } else if options.strict_writes() {
                Err(StoreError::Conflict(format!(
                    "removal of missing row {key:?} for {}",
                    type_name::<T>()
                )))
            } else {
                Ok(0)
            }
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::generators;

    #[test]
    fn duplicate_key_insert_is_a_constraint_violation() {
        let store = MemoryStore::new();
        let mut session = store.connect().unwrap();
        let customer = generators::customer("dup");
        session.stage_insert(customer.clone()).unwrap();
        session.stage_insert(customer).unwrap();

        let err = session.save_changes().unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)), "got {err:?}");

        // Nothing from the failed batch may have landed.
        let rows: Vec<generators::Customer> =
            session.query(&QueryPlan::unrestricted()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn strict_update_of_missing_row_conflicts() {
        let store = MemoryStore::new();
        let mut session = store.connect().unwrap();
        session
            .stage_update(generators::customer("ghost"))
            .unwrap();
        let err = session.save_changes().unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
    }

    #[test]
    fn lenient_writes_skip_missing_rows() {
        let store = MemoryStore::with_options(StoreOptions::new().with_strict_writes(false));
        let mut session = store.connect().unwrap();
        session
            .stage_update(generators::customer("ghost"))
            .unwrap();
        session
            .stage_remove(generators::customer("also-ghost"))
            .unwrap();
        assert_eq!(session.save_changes().unwrap(), 0);
    }

    #[test]
    fn uncommitted_overlay_is_invisible_to_other_sessions() {
        let store = MemoryStore::new();
        let mut writer = store.connect().unwrap();
        writer.begin_transaction().unwrap();
        writer
            .stage_insert(generators::customer("hidden"))
            .unwrap();
        assert_eq!(writer.save_changes().unwrap(), 1);

        let reader = store.connect().unwrap();
        let seen: Vec<generators::Customer> =
            reader.query(&QueryPlan::unrestricted()).unwrap();
        assert!(seen.is_empty());

        writer.commit_transaction().unwrap();
        let seen: Vec<generators::Customer> =
            reader.query(&QueryPlan::unrestricted()).unwrap();
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn dispose_is_idempotent_and_fails_later_calls() {
        let store = MemoryStore::new();
        let mut session = store.connect().unwrap();
        session.dispose();
        session.dispose();
        assert!(session.is_disposed());
        let err = session.save_changes().unwrap_err();
        assert!(matches!(err, StoreError::SessionDisposed));
    }
}
