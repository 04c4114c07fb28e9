//! Constraints only the `PostgreSQL` backend enforces.

use bugstore_core::{Customer, Order};
use bugstore_data::StoreError;
use bugstore_integration_tests::fixtures::{customer, now, order};
use bugstore_integration_tests::{memory_database, postgres_database};

fn backdated(customer: &Customer) -> Order {
    let mut o = order(customer);
    o.updated_at = now() - chrono::Duration::days(1);
    o
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_updated_before_created_is_a_constraint_violation() {
    let db = postgres_database().await;
    let mut store = db.store();
    let c = customer("Backdated");
    let o = backdated(&c);
    store.add(c.clone());
    store.add(o.clone());

    let err = store.commit().await.expect_err("check constraint rejects order");

    assert!(matches!(err, StoreError::ConstraintViolation(_)), "got {err:?}");
    assert!(db.store().find_by_id::<Customer>(c.id).await.expect("find").is_none());
    assert!(db.store().find_by_id::<Order>(o.id).await.expect("find").is_none());
}

#[tokio::test]
async fn test_memory_backend_does_not_check_timestamps() {
    let db = memory_database();
    let mut store = db.store();
    let c = customer("Backdated");
    store.add(backdated(&c));

    store.commit().await.expect("in-memory backend enforces no constraints");
}
