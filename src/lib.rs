//! Specification, unit-of-work and repository toolkit over pluggable
//! storage backends.
//!
//! The triad:
//!
//! - [`Specification`]: an immutable description of a query, an optional
//!   filter predicate plus ordered eager-load directives.
//! - [`UnitOfWork`]: one store session, staged CRUD, explicit
//!   transaction boundaries, every data verb in blocking and cancellable
//!   non-blocking form.
//! - [`EntityRepository`]: the same verb set scoped to one entity type,
//!   either owning its session or sharing a unit of work with other
//!   repositories.
//!
//! The persistence engine stays behind the [`Store`] / [`StoreSession`] /
//! [`EntitySet`] traits; [`MemoryStore`] is the in-crate reference
//! backend.

pub mod entity;
pub mod error;
pub mod logging;
pub mod repositories;
pub mod specification;
pub mod storage;
pub mod unit_of_work;

#[cfg(test)]
mod tests;

pub use entity::Entity;
pub use error::{Result, StoreError};
pub use repositories::{EntityRepository, SharedRepository, StoreRepository};
pub use specification::{Include, Predicate, QueryPlan, Relation, Specification};
pub use storage::{EntitySet, MemorySession, MemoryStore, Store, StoreOptions, StoreSession};
pub use unit_of_work::{SharedUnitOfWork, TransactionHandle, TransactionScope, UnitOfWork};
