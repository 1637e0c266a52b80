//! Test utilities and suites for the triad.
//!
//! `generators` builds fixture entities, `assertions` holds the
//! verification helpers shared across suites.

mod repository_test;

/// Fixture entities and builders.
pub mod generators {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use crate::entity::Entity;
    use crate::specification::Relation;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Customer {
        pub id: Uuid,
        pub name: String,
        pub active: bool,
        pub created_at: DateTime<Utc>,
    }

    impl Customer {
        pub const ORDERS: Relation<Customer> = Relation::new("orders");
        pub const ADDRESS: Relation<Customer> = Relation::new("address");
    }

    impl Entity for Customer {
        type Key = Uuid;

        fn key(&self) -> Uuid {
            self.id
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct Order {
        pub id: Uuid,
        pub customer_id: Uuid,
        pub total_cents: i64,
    }

    impl Entity for Order {
        type Key = Uuid;

        fn key(&self) -> Uuid {
            self.id
        }
    }

    /// An active customer with a fresh id.
    pub fn customer(name: &str) -> Customer {
        Customer {
            id: Uuid::new_v4(),
            name: name.to_string(),
            active: true,
            created_at: Utc::now(),
        }
    }

    /// An inactive customer with a fresh id.
    pub fn inactive_customer(name: &str) -> Customer {
        Customer {
            active: false,
            ..customer(name)
        }
    }

    /// An order for the given customer.
    pub fn order(customer: &Customer, total_cents: i64) -> Order {
        Order {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            total_cents,
        }
    }
}

/// Verification helpers shared across suites.
pub mod assertions {
    use crate::entity::Entity;
    use crate::storage::session::{EntitySet, StoreSession};
    use crate::unit_of_work::UnitOfWork;

    /// Assert the unit of work resolves the key to an entity.
    pub fn assert_key_present<T, S>(uow: &UnitOfWork<S>, key: &T::Key)
    where
        T: Entity,
        S: EntitySet<T> + StoreSession,
    {
        assert!(
            uow.find_by_key::<T>(key).unwrap().is_some(),
            "expected {key:?} to be present"
        );
    }

    /// Assert the unit of work resolves the key to nothing.
    pub fn assert_key_absent<T, S>(uow: &UnitOfWork<S>, key: &T::Key)
    where
        T: Entity,
        S: EntitySet<T> + StoreSession,
    {
        assert!(
            uow.find_by_key::<T>(key).unwrap().is_none(),
            "expected {key:?} to be absent"
        );
    }

    /// Assert how many entities of `T` the unit of work sees.
    pub fn assert_count<T, S>(uow: &UnitOfWork<S>, expected: usize)
    where
        T: Entity,
        S: EntitySet<T> + StoreSession,
    {
        assert_eq!(uow.get_all::<T>().unwrap().len(), expected);
    }
}
