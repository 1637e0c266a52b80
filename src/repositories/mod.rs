//! Entity-typed repositories over a unit of work.
//!
//! One contract, two ownership modes: [`StoreRepository`] holds its own
//! store session, [`SharedRepository`] delegates to a shared unit of work
//! so several repositories commit or roll back together.

pub mod base;
pub mod shared_repository;
pub mod store_repository;

pub use base::EntityRepository;
pub use shared_repository::SharedRepository;
pub use store_repository::StoreRepository;
