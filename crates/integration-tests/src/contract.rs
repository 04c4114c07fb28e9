//! Store contract scenarios.
//!
//! Each function panics on the first violated expectation.

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use bugstore_core::{
    Customer, CustomerId, Entity, EntityKey, EntityKind, Order, OrderId, OrderLine, Product,
    ProductId,
};
use bugstore_data::{Database, StoreError};

use crate::fixtures::{aged_order, customer, line, now, order, product, unique_slug};

fn price(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

// ============================================================================
// Customers
// ============================================================================

pub async fn create_customer_persists(db: &Database) {
    let mut store = db.store();
    let c = customer("Ada Lovelace");

    store.add(c.clone());
    let summary = store.commit().await.expect("commit");

    assert_eq!(summary.written, 1);
    let found = db.store().find_by_id::<Customer>(c.id).await.expect("find");
    assert_eq!(found, Some(c));
}

pub async fn find_customer_by_id(db: &Database) {
    let mut store = db.store();
    let wanted = customer("Wanted");
    store.add_range([customer("Other One"), wanted.clone(), customer("Other Two")]);
    store.commit().await.expect("commit");

    let found = store
        .find_by_id::<Customer>(wanted.id)
        .await
        .expect("find")
        .expect("customer exists");
    assert_eq!(found.name, "Wanted");
    assert_eq!(found.email, wanted.email);

    let missing = store
        .find_by_id::<Customer>(CustomerId::new_v4())
        .await
        .expect("find");
    assert!(missing.is_none());
}

pub async fn update_customer_modifies(db: &Database) {
    let mut store = db.store();
    let mut c = customer("Before");
    store.add(c.clone());
    store.commit().await.expect("commit");

    c.name = "After".to_owned();
    c.email = "after@example.com".to_owned();
    store.update(c.clone());
    store.commit().await.expect("commit update");

    let found = db
        .store()
        .find_by_id::<Customer>(c.id)
        .await
        .expect("find")
        .expect("customer exists");
    assert_eq!(found, c);
    assert_ne!(found.name, "Before");
}

pub async fn delete_customer_removes(db: &Database) {
    let mut store = db.store();
    let c = customer("Doomed");
    store.add(c.clone());
    store.commit().await.expect("commit");

    store.remove(&c);
    let summary = store.commit().await.expect("commit remove");

    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.cascaded, 0);
    assert!(store.find_by_id::<Customer>(c.id).await.expect("find").is_none());
}

pub async fn list_customers_returns_all(db: &Database) {
    let mut store = db.store();
    let created = [customer("First"), customer("Second"), customer("Third")];
    let ids: Vec<CustomerId> = created.iter().map(|c| c.id).collect();
    store.add_range(created);
    store.commit().await.expect("commit");

    let mine = store
        .query(move |c: &Customer| ids.contains(&c.id))
        .await
        .expect("query");
    assert_eq!(mine.count(), 3);
}

// ============================================================================
// Products
// ============================================================================

pub async fn create_product_persists(db: &Database) {
    let mut store = db.store();
    let p = product(&unique_slug("keyboard"), price(8990));
    store.add(p.clone());
    store.commit().await.expect("commit");

    let found = db.store().find_by_id::<Product>(p.id).await.expect("find");
    assert_eq!(found, Some(p));
}

pub async fn find_product_by_id(db: &Database) {
    let mut store = db.store();
    let p = product(&unique_slug("mouse"), price(2450));
    store.add(p.clone());
    store.commit().await.expect("commit");

    let found = store
        .find_by_id::<Product>(p.id)
        .await
        .expect("find")
        .expect("product exists");
    assert_eq!(found.price, price(2450));
    assert!(
        store
            .find_by_id::<Product>(ProductId::new_v4())
            .await
            .expect("find")
            .is_none()
    );
}

pub async fn update_product_modifies(db: &Database) {
    let mut store = db.store();
    let mut p = product(&unique_slug("monitor"), price(19900));
    store.add(p.clone());
    store.commit().await.expect("commit");

    p.title = "Monitor 27in".to_owned();
    p.price = price(17900);
    store.update(p.clone());
    store.commit().await.expect("commit update");

    let found = store
        .find_by_id::<Product>(p.id)
        .await
        .expect("find")
        .expect("product exists");
    assert_eq!(found, p);
}

pub async fn delete_product_removes(db: &Database) {
    let mut store = db.store();
    let p = product(&unique_slug("cable"), price(599));
    store.add(p.clone());
    store.commit().await.expect("commit");

    store.remove_by_id::<Product>(p.id);
    store.commit().await.expect("commit remove");

    assert!(store.find_by_id::<Product>(p.id).await.expect("find").is_none());
}

pub async fn list_products_returns_all(db: &Database) {
    let prefix = unique_slug("list");
    let mut store = db.store();
    store.add_range((0..4).map(|i| product(&format!("{prefix}-{i}"), price(100 * i))));
    store.commit().await.expect("commit");

    let listed = store
        .query(move |p: &Product| p.slug.starts_with(&prefix))
        .await
        .expect("query");
    assert_eq!(listed.count(), 4);
    assert_eq!(listed.to_vec().len(), 4);
}

pub async fn same_slug_is_allowed(db: &Database) {
    let slug = unique_slug("same-slug");
    let mut store = db.store();
    store.add(product(&slug, price(1000)));
    store.add(product(&slug, price(2000)));
    store.commit().await.expect("duplicate slugs commit");

    let wanted = slug.clone();
    let matches = store
        .query(move |p: &Product| p.slug == wanted)
        .await
        .expect("query");
    assert_eq!(matches.count(), 2);
}

// ============================================================================
// Orders
// ============================================================================

pub async fn create_order_with_customer(db: &Database) {
    let mut store = db.store();
    let c = customer("Buyer");
    let o = order(&c);
    store.add(c.clone());
    store.add(o.clone());
    store.commit().await.expect("commit");

    let mut found = db
        .store()
        .find_by_id::<Order>(o.id)
        .await
        .expect("find")
        .expect("order exists");
    assert_eq!(found.customer_id, c.id);
    assert_eq!(found, o);

    store.load_customer(&mut found).await.expect("load customer");
    assert_eq!(found.customer, Some(c));
}

pub async fn create_order_with_lines(db: &Database) {
    let mut store = db.store();
    let c = customer("Line Buyer");
    let p1 = product(&unique_slug("pen"), price(150));
    let p2 = product(&unique_slug("pad"), price(325));
    let o = order(&c);
    let lines = vec![line(&o, &p1, 4), line(&o, &p2, 1)];

    // Children registered before parents; the commit orders them.
    store.add_range(lines.clone());
    store.add(o.clone());
    store.add_range([p1, p2]);
    store.add(c);
    store.commit().await.expect("commit");

    let loaded = db
        .store()
        .find_order_with_lines(o.id)
        .await
        .expect("find")
        .expect("order exists");
    let mut got = loaded.lines.expect("lines loaded");
    got.sort_by_key(|l| l.id);
    let mut want = lines;
    want.sort_by_key(|l| l.id);
    assert_eq!(got, want);

    let total: Decimal = got.iter().map(|l| l.total).sum();
    assert_eq!(total, price(925));
}

pub async fn update_order_updates_timestamp(db: &Database) {
    let mut store = db.store();
    let c = customer("Timestamp");
    let mut o = aged_order(&c);
    store.add(c);
    store.add(o.clone());
    store.commit().await.expect("commit");

    o.touch(now());
    store.update(o.clone());
    store.commit().await.expect("commit update");

    let found = store
        .find_by_id::<Order>(o.id)
        .await
        .expect("find")
        .expect("order exists");
    assert!(found.updated_at > found.created_at);
    assert_eq!(found.updated_at, o.updated_at);
}

pub async fn delete_order_deletes_lines(db: &Database) {
    let mut store = db.store();
    let c = customer("Cascade");
    let p = product(&unique_slug("widget"), price(999));
    let doomed = order(&c);
    let kept = order(&c);
    let doomed_lines = vec![line(&doomed, &p, 1), line(&doomed, &p, 2), line(&doomed, &p, 3)];
    let kept_line = line(&kept, &p, 1);
    store.add(c.clone());
    store.add(p.clone());
    store.add_range([doomed.clone(), kept.clone()]);
    store.add_range(doomed_lines.clone());
    store.add(kept_line.clone());
    store.commit().await.expect("commit");

    store.remove(&doomed);
    let summary = store.commit().await.expect("commit remove");

    assert_eq!(summary.cascaded, doomed_lines.len());
    assert_eq!(summary.deleted, doomed_lines.len() + 1);
    assert!(store.find_by_id::<Order>(doomed.id).await.expect("find").is_none());
    for l in &doomed_lines {
        assert!(
            store.find_by_id::<OrderLine>(l.id).await.expect("find").is_none(),
            "line {} should be gone",
            l.id
        );
    }
    assert!(store.find_by_id::<OrderLine>(kept_line.id).await.expect("find").is_some());
    assert!(store.find_by_id::<Customer>(c.id).await.expect("find").is_some());
    assert!(store.find_by_id::<Product>(p.id).await.expect("find").is_some());
}

pub async fn remove_line_and_order_together(db: &Database) {
    let mut store = db.store();
    let c = customer("Explicit");
    let p = product(&unique_slug("explicit"), price(100));
    let o = order(&c);
    let l = line(&o, &p, 1);
    store.add(c);
    store.add(p);
    store.add(o.clone());
    store.add(l.clone());
    store.commit().await.expect("commit");

    store.remove(&l);
    store.remove(&o);
    let summary = store.commit().await.expect("commit remove");

    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.cascaded, 0);
    assert!(store.find_order_with_lines(o.id).await.expect("find").is_none());
}

pub async fn update_order_line_modifies(db: &Database) {
    let mut store = db.store();
    let c = customer("Line Editor");
    let p = product(&unique_slug("editable"), price(250));
    let o = order(&c);
    let mut l = line(&o, &p, 2);
    store.add(c);
    store.add(p.clone());
    store.add(o);
    store.add(l.clone());
    store.commit().await.expect("commit");

    l.quantity = 5;
    l.total = p.price * Decimal::from(5);
    store.update(l.clone());
    let summary = store.commit().await.expect("commit update");

    assert_eq!(summary.written, 1);
    let found = db
        .store()
        .find_by_id::<OrderLine>(l.id)
        .await
        .expect("find")
        .expect("line exists");
    assert_eq!(found, l);
    assert_eq!(found.quantity, 5);
    assert_eq!(found.total, price(1250));
}

pub async fn update_line_to_missing_product_is_dangling(db: &Database) {
    let mut store = db.store();
    let c = customer("Line Breaker");
    let p = product(&unique_slug("real"), price(300));
    let o = order(&c);
    let l = line(&o, &p, 1);
    let bystander = customer("Bystander");
    store.add(c);
    store.add(p);
    store.add(o);
    store.add(l.clone());
    store.commit().await.expect("commit");

    let ghost = ProductId::new_v4();
    let mut broken = l.clone();
    broken.product_id = ghost;
    broken.quantity = 9;
    store.add(bystander.clone());
    store.update(broken);
    let err = store.commit().await.expect_err("line pointing at missing product fails");

    match err {
        StoreError::DanglingReference { line, missing } => {
            assert_eq!(line, l.id);
            assert_eq!(missing, EntityKey::of::<Product>(ghost));
        }
        other => panic!("expected DanglingReference, got {other:?}"),
    }
    let reader = db.store();
    let unchanged = reader
        .find_by_id::<OrderLine>(l.id)
        .await
        .expect("find")
        .expect("line still exists");
    assert_eq!(unchanged, l);
    assert!(reader.find_by_id::<Customer>(bystander.id).await.expect("find").is_none());
}

pub async fn quantities_are_not_validated(db: &Database) {
    let mut store = db.store();
    let c = customer("Quirky");
    let p = product(&unique_slug("quirk"), price(500));
    let o = order(&c);
    let zero = line(&o, &p, 0);
    let negative = line(&o, &p, -3);
    store.add(c);
    store.add(p);
    store.add(o);
    store.add_range([zero.clone(), negative.clone()]);
    store.commit().await.expect("commit");

    let found = store
        .find_by_id::<OrderLine>(negative.id)
        .await
        .expect("find")
        .expect("line exists");
    assert_eq!(found.quantity, -3);
    assert_eq!(found.total, price(-1500));
    assert!(store.find_by_id::<OrderLine>(zero.id).await.expect("find").is_some());
}

pub async fn removing_product_leaves_lines(db: &Database) {
    let mut store = db.store();
    let c = customer("Orphan");
    let p = product(&unique_slug("discontinued"), price(1200));
    let o = order(&c);
    let l = line(&o, &p, 1);
    store.add(c);
    store.add(p.clone());
    store.add(o);
    store.add(l.clone());
    store.commit().await.expect("commit");

    store.remove(&p);
    store.commit().await.expect("product removal does not cascade");

    let mut orphan = store
        .find_by_id::<OrderLine>(l.id)
        .await
        .expect("find")
        .expect("line survives");
    store.load_product(&mut orphan).await.expect("load product");
    assert!(orphan.product.is_none());
}

// ============================================================================
// Atomicity
// ============================================================================

pub async fn rollback_on_not_found(db: &Database) {
    let mut store = db.store();
    let valid = customer("Valid");
    let ghost = customer("Ghost");
    store.add(valid.clone());
    store.update(ghost.clone());

    let err = store.commit().await.expect_err("update of missing id fails");

    match err {
        StoreError::NotFound(key) => {
            assert_eq!(key.kind, EntityKind::Customer);
            assert_eq!(key, ghost.key());
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(db.store().find_by_id::<Customer>(valid.id).await.expect("find").is_none());
    assert_eq!(store.pending_len(), 2);
}

pub async fn rollback_on_dangling_reference(db: &Database) {
    let mut store = db.store();
    let c = customer("Dangling");
    let never_added = product(&unique_slug("phantom"), price(100));
    let o = order(&c);
    let l = line(&o, &never_added, 1);
    store.add(o.clone());
    store.add(l.clone());

    let err = store.commit().await.expect_err("dangling product fails");

    match err {
        StoreError::DanglingReference { line, missing } => {
            assert_eq!(line, l.id);
            assert_eq!(missing, never_added.key());
        }
        other => panic!("expected DanglingReference, got {other:?}"),
    }
    let reader = db.store();
    assert!(reader.find_by_id::<Order>(o.id).await.expect("find").is_none());
    assert!(reader.find_by_id::<OrderLine>(l.id).await.expect("find").is_none());
}

pub async fn line_for_removed_order_is_dangling(db: &Database) {
    let mut store = db.store();
    let c = customer("Late Line");
    let p = product(&unique_slug("late"), price(100));
    let o = order(&c);
    store.add(p.clone());
    store.add(o.clone());
    store.commit().await.expect("commit");

    store.remove(&o);
    store.add(line(&o, &p, 1));
    let err = store.commit().await.expect_err("line for removed order fails");

    assert!(err.is_dangling_reference());
    assert!(store.find_by_id::<Order>(o.id).await.expect("find").is_some());
}

pub async fn remove_missing_is_not_found(db: &Database) {
    let mut store = db.store();
    let id = OrderId::new_v4();
    store.remove_by_id::<Order>(id);

    let err = store.commit().await.expect_err("remove of missing id fails");

    assert!(matches!(err, StoreError::NotFound(key) if key.id == id.as_uuid()));
}

pub async fn cancelled_commit_applies_nothing(db: &Database) {
    let token = CancellationToken::new();
    let mut store = db.store().with_cancellation(token.clone());
    let c = customer("Cancelled");
    store.add(c.clone());

    token.cancel();
    let err = store.commit().await.expect_err("cancelled commit fails");

    assert!(matches!(err, StoreError::Cancelled));
    assert!(store.has_pending_changes());
    assert!(db.store().find_by_id::<Customer>(c.id).await.expect("find").is_none());
}
