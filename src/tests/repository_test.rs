//! Repository tests covering both ownership modes.

use tokio_util::sync::CancellationToken;

use crate::error::StoreError;
use crate::repositories::{EntityRepository, SharedRepository, StoreRepository};
use crate::specification::Specification;
use crate::storage::MemoryStore;
use crate::storage::memory::MemorySession;
use crate::tests::generators::{self, Customer, Order};
use crate::unit_of_work::UnitOfWork;

#[test]
fn owning_repository_crud_roundtrip() {
    let store = MemoryStore::new();
    let mut repo: StoreRepository<Customer, _> = StoreRepository::connect(&store).unwrap();

    let mut customer = repo.add(generators::customer("first")).unwrap();
    assert_eq!(repo.save_changes().unwrap(), 1);
    assert_eq!(repo.get_all().unwrap().len(), 1);

    customer.name = "renamed".to_string();
    customer = repo.update(customer).unwrap();
    repo.save_changes().unwrap();
    assert_eq!(
        repo.find_by_key(&customer.id).unwrap().map(|c| c.name),
        Some("renamed".to_string())
    );

    repo.remove(customer).unwrap();
    repo.save_changes().unwrap();
    assert!(repo.get_all().unwrap().is_empty());
}

#[test]
fn owning_repository_resolves_specifications() {
    let store = MemoryStore::new();
    let mut repo: StoreRepository<Customer, _> = StoreRepository::connect(&store).unwrap();
    repo.add(generators::customer("active")).unwrap();
    repo.add(generators::inactive_customer("dormant")).unwrap();
    repo.save_changes().unwrap();

    let spec = Specification::matching(|c: &Customer| c.active)
        .include(Customer::ORDERS)
        .build()
        .unwrap();
    let matched = repo.get(&spec).unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].name, "active");

    let by_predicate = repo.get_where(|c: &Customer| !c.active).unwrap();
    assert_eq!(by_predicate.len(), 1);
}

#[test]
fn owning_repository_transaction_rollback_discards_saves() {
    let store = MemoryStore::new();
    let mut repo: StoreRepository<Customer, _> = StoreRepository::connect(&store).unwrap();

    repo.begin_transaction().unwrap();
    let customer = repo.add(generators::customer("volatile")).unwrap();
    repo.save_changes().unwrap();
    repo.rollback().unwrap();

    let fresh = UnitOfWork::connect(&store).unwrap();
    assert!(
        fresh
            .find_by_key::<Customer>(&customer.id)
            .unwrap()
            .is_none()
    );
}

#[test]
fn disposed_owning_repository_rejects_operations() {
    let store = MemoryStore::new();
    let mut repo: StoreRepository<Customer, _> = StoreRepository::connect(&store).unwrap();
    repo.dispose();
    let err = repo.get_all().unwrap_err();
    assert!(matches!(err, StoreError::SessionDisposed));
}

#[test]
fn shared_repositories_participate_in_one_transaction() {
    let store = MemoryStore::new();
    let shared = UnitOfWork::connect(&store).unwrap().into_shared();
    let mut customers: SharedRepository<Customer, MemorySession> =
        SharedRepository::new(shared.clone());
    let mut orders: SharedRepository<Order, MemorySession> = SharedRepository::new(shared.clone());

    customers.begin_transaction().unwrap();
    let customer = customers.add(generators::customer("buyer")).unwrap();
    orders.add(generators::order(&customer, 2_500)).unwrap();
    // One flush covers both repositories: they stage into the same session.
    assert_eq!(orders.save_changes().unwrap(), 2);
    orders.commit().unwrap();

    let fresh = UnitOfWork::connect(&store).unwrap();
    assert_eq!(fresh.get_all::<Customer>().unwrap().len(), 1);
    assert_eq!(fresh.get_all::<Order>().unwrap().len(), 1);
}

#[test]
fn shared_transaction_rollback_spans_every_repository() {
    let store = MemoryStore::new();
    let shared = UnitOfWork::connect(&store).unwrap().into_shared();
    let mut customers: SharedRepository<Customer, MemorySession> =
        SharedRepository::new(shared.clone());
    let mut orders: SharedRepository<Order, MemorySession> = SharedRepository::new(shared.clone());

    customers.begin_transaction().unwrap();
    let customer = customers.add(generators::customer("undone")).unwrap();
    orders.add(generators::order(&customer, 900)).unwrap();
    customers.save_changes().unwrap();
    customers.rollback().unwrap();

    let fresh = UnitOfWork::connect(&store).unwrap();
    assert!(fresh.get_all::<Customer>().unwrap().is_empty());
    assert!(fresh.get_all::<Order>().unwrap().is_empty());
}

#[test]
fn disposing_a_shared_repository_leaves_the_unit_of_work_usable() {
    let store = MemoryStore::new();
    let shared = UnitOfWork::connect(&store).unwrap().into_shared();
    let mut customers: SharedRepository<Customer, MemorySession> =
        SharedRepository::new(shared.clone());
    let mut orders: SharedRepository<Order, MemorySession> = SharedRepository::new(shared.clone());

    customers.dispose();
    drop(customers);

    orders.add(generators::order(&generators::customer("still"), 100)).unwrap();
    assert_eq!(orders.save_changes().unwrap(), 1);
}

#[test]
fn busy_shared_unit_of_work_surfaces_as_a_conflict() {
    let store = MemoryStore::new();
    let shared = UnitOfWork::connect(&store).unwrap().into_shared();
    let customers: SharedRepository<Customer, MemorySession> =
        SharedRepository::new(shared.clone());

    let _guard = shared.try_lock().unwrap();
    let err = customers.get_all().unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
}

#[tokio::test]
async fn shared_repository_async_verbs() -> crate::error::Result<()> {
    let store = MemoryStore::new();
    let shared = UnitOfWork::connect(&store)?.into_shared();
    let mut customers: SharedRepository<Customer, MemorySession> =
        SharedRepository::new(shared.clone());
    let cancel = CancellationToken::new();

    let customer = customers
        .add_async(generators::customer("async-shared"), &cancel)
        .await?;
    assert_eq!(customers.save_changes_async(&cancel).await?, 1);
    assert!(
        customers
            .find_by_key_async(&customer.id, &cancel)
            .await?
            .is_some()
    );
    assert_eq!(customers.get_all_async(&cancel).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn owning_repository_async_query_honors_cancellation() {
    let store = MemoryStore::new();
    let repo: StoreRepository<Customer, _> = StoreRepository::connect(&store).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = repo.get_all_async(&cancel).await.unwrap_err();
    assert!(err.is_cancelled(), "got {err:?}");
}
