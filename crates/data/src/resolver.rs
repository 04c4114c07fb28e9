//! Relationship resolver.
//!
//! Turns a [`PendingBatch`] into a [`CommitPlan`] against the committed state
//! visible through a [`StateView`]. Backends call [`resolve`] inside their
//! commit critical section (write lock or transaction), so the checks and the
//! writes that follow observe the same state.
//!
//! Rules:
//!
//! - Mutations replay in registration order onto an overlay of the
//!   post-commit state. Update and remove require the target to exist there.
//! - Removing an order also removes every order line whose `order_id` points
//!   at it ([`dependent_lines`]).
//! - Every order line written by the batch must reference an order and a
//!   product that exist after the commit.
//!
//! Customer and product removals never cascade. Orders are not checked
//! against their customer, and existing order lines are not checked when
//! their product is removed; callers own those references.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tracing::debug;

use bugstore_core::{
    EntityKey, EntityKind, Order, OrderId, OrderLine, OrderLineId, Product, Record,
};

use crate::batch::{Mutation, PendingBatch};
use crate::error::StoreError;

/// Read access to committed state during a commit.
#[async_trait]
pub trait StateView: Send {
    /// Whether an entity with this key is committed.
    async fn contains(&mut self, key: EntityKey) -> Result<bool, StoreError>;

    /// IDs of committed order lines whose `order_id` equals `order`.
    async fn order_line_ids(&mut self, order: OrderId) -> Result<Vec<OrderLineId>, StoreError>;
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitSummary {
    /// Entities inserted or replaced.
    pub written: usize,
    /// Entities deleted, including cascaded order lines.
    pub deleted: usize,
    /// Order lines deleted because their order was removed.
    pub cascaded: usize,
}

/// Net effect of a batch on committed state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitPlan {
    /// Keys to delete, children before parents.
    pub deletes: Vec<EntityKey>,
    /// Records to insert or replace, parents before children.
    pub writes: Vec<Record>,
    /// How many of `deletes` came from order cascades.
    pub cascaded: usize,
}

impl CommitPlan {
    /// Summary reported to the caller once the plan is applied.
    #[must_use]
    pub fn summary(&self) -> CommitSummary {
        CommitSummary {
            written: self.writes.len(),
            deleted: self.deletes.len(),
            cascaded: self.cascaded,
        }
    }
}

/// Post-commit state as far as the batch has changed it.
///
/// `Some(record)` is present after commit, `None` is deleted. Keys not in the
/// overlay fall through to committed state.
#[derive(Debug, Default)]
struct Overlay {
    entries: BTreeMap<EntityKey, Option<Record>>,
}

impl Overlay {
    fn write(&mut self, record: Record) {
        self.entries.insert(record.key(), Some(record));
    }

    fn delete(&mut self, key: EntityKey) {
        self.entries.insert(key, None);
    }

    async fn contains<V: StateView>(&self, key: EntityKey, view: &mut V) -> Result<bool, StoreError> {
        match self.entries.get(&key) {
            Some(slot) => Ok(slot.is_some()),
            None => view.contains(key).await,
        }
    }

    fn order_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.entries
            .values()
            .filter_map(|slot| slot.as_ref().and_then(Record::as_order_line))
    }
}

/// Resolve `batch` against committed state.
///
/// # Errors
///
/// - `StoreError::NotFound` if an update or remove targets a missing entity
/// - `StoreError::DanglingReference` if a written order line references an
///   order or product that will not exist
/// - Any error raised by `view`
pub async fn resolve<V: StateView>(
    batch: &PendingBatch,
    view: &mut V,
) -> Result<CommitPlan, StoreError> {
    let mut overlay = Overlay::default();
    let mut cascaded = BTreeSet::new();

    for mutation in batch {
        match mutation {
            Mutation::Add(record) => overlay.write(record.clone()),
            Mutation::Update(record) => {
                let key = record.key();
                if !overlay.contains(key, view).await? {
                    return Err(StoreError::NotFound(key));
                }
                overlay.write(record.clone());
            }
            Mutation::Remove(key) => {
                if !overlay.contains(*key, view).await? {
                    return Err(StoreError::NotFound(*key));
                }
                if key.kind == EntityKind::Order {
                    let order = OrderId::from(key.id);
                    for line in dependent_lines(order, &overlay, view).await? {
                        debug!(%order, %line, "cascading order removal to order line");
                        let line = EntityKey::of::<OrderLine>(line);
                        overlay.delete(line);
                        cascaded.insert(line);
                    }
                }
                overlay.delete(*key);
            }
        }
    }

    check_references(&overlay, view).await?;

    let mut plan = CommitPlan::default();
    // BTreeMap order is kind-major (parents first); deletes walk it backwards.
    // Keys that were never committed have nothing to delete and do not count.
    for (key, slot) in overlay.entries.iter().rev() {
        if slot.is_none() && view.contains(*key).await? {
            plan.deletes.push(*key);
            if cascaded.contains(key) {
                plan.cascaded += 1;
            }
        }
    }
    plan.writes = overlay.entries.into_values().flatten().collect();
    Ok(plan)
}

/// Order lines that belong to `order` in the post-commit state so far.
///
/// Committed lines count unless the batch already deleted them or re-pointed
/// them at another order; lines written by the batch count if they point at
/// `order`.
async fn dependent_lines<V: StateView>(
    order: OrderId,
    overlay: &Overlay,
    view: &mut V,
) -> Result<BTreeSet<OrderLineId>, StoreError> {
    let mut lines = BTreeSet::new();

    for id in view.order_line_ids(order).await? {
        match overlay.entries.get(&EntityKey::of::<OrderLine>(id)) {
            None => {
                lines.insert(id);
            }
            Some(Some(record)) => {
                if record.as_order_line().is_some_and(|l| l.order_id == order) {
                    lines.insert(id);
                }
            }
            Some(None) => {}
        }
    }

    lines.extend(
        overlay
            .order_lines()
            .filter(|line| line.order_id == order)
            .map(|line| line.id),
    );

    Ok(lines)
}

async fn check_references<V: StateView>(overlay: &Overlay, view: &mut V) -> Result<(), StoreError> {
    let references: Vec<(OrderLineId, [EntityKey; 2])> = overlay
        .order_lines()
        .map(|line| {
            (
                line.id,
                [
                    EntityKey::of::<Order>(line.order_id),
                    EntityKey::of::<Product>(line.product_id),
                ],
            )
        })
        .collect();

    for (line, targets) in references {
        for missing in targets {
            if !overlay.contains(missing, view).await? {
                return Err(StoreError::DanglingReference { line, missing });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use bugstore_core::{Customer, CustomerId, Entity, ProductId};
    use uuid::Uuid;

    use super::*;

    /// Committed state held in a plain map.
    #[derive(Default)]
    struct MapView {
        rows: BTreeMap<EntityKey, Record>,
    }

    impl MapView {
        fn with(records: impl IntoIterator<Item = Record>) -> Self {
            Self {
                rows: records.into_iter().map(|r| (r.key(), r)).collect(),
            }
        }
    }

    #[async_trait]
    impl StateView for MapView {
        async fn contains(&mut self, key: EntityKey) -> Result<bool, StoreError> {
            Ok(self.rows.contains_key(&key))
        }

        async fn order_line_ids(
            &mut self,
            order: OrderId,
        ) -> Result<Vec<OrderLineId>, StoreError> {
            Ok(self
                .rows
                .values()
                .filter_map(Record::as_order_line)
                .filter(|l| l.order_id == order)
                .map(|l| l.id)
                .collect())
        }
    }

    fn order() -> Order {
        Order {
            id: OrderId::new_v4(),
            customer_id: CustomerId::new_v4(),
            ..Order::default()
        }
    }

    fn product() -> Product {
        Product {
            id: ProductId::new_v4(),
            ..Product::default()
        }
    }

    fn line(order: &Order, product: &Product) -> OrderLine {
        OrderLine {
            id: OrderLineId::new_v4(),
            order_id: order.id,
            product_id: product.id,
            quantity: 1,
            ..OrderLine::default()
        }
    }

    fn batch(mutations: impl IntoIterator<Item = Mutation>) -> PendingBatch {
        mutations.into_iter().collect()
    }

    #[tokio::test]
    async fn test_adds_become_parent_first_writes() {
        let (o, p) = (order(), product());
        let l = line(&o, &p);
        let pending = batch([
            Mutation::Add(l.clone().into_record()),
            Mutation::Add(o.clone().into_record()),
            Mutation::Add(p.clone().into_record()),
        ]);

        let plan = resolve(&pending, &mut MapView::default()).await.unwrap();

        let kinds: Vec<_> = plan.writes.iter().map(Record::kind).collect();
        assert_eq!(
            kinds,
            vec![EntityKind::Product, EntityKind::Order, EntityKind::OrderLine]
        );
        assert!(plan.deletes.is_empty());
        assert_eq!(plan.summary().written, 3);
    }

    #[tokio::test]
    async fn test_update_of_missing_entity_is_not_found() {
        let customer = Customer {
            id: CustomerId::new_v4(),
            ..Customer::default()
        };
        let pending = batch([Mutation::Update(customer.clone().into_record())]);

        let err = resolve(&pending, &mut MapView::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(key) if key == customer.key()));
    }

    #[tokio::test]
    async fn test_remove_of_missing_entity_is_not_found() {
        let key = EntityKey::new(EntityKind::Product, Uuid::new_v4());
        let pending = batch([Mutation::Remove(key)]);

        let err = resolve(&pending, &mut MapView::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(k) if k == key));
    }

    #[tokio::test]
    async fn test_update_after_add_in_same_batch() {
        let mut customer = Customer {
            id: CustomerId::new_v4(),
            name: "Before".to_owned(),
            ..Customer::default()
        };
        let added = Mutation::Add(customer.clone().into_record());
        customer.name = "After".to_owned();
        let pending = batch([added, Mutation::Update(customer.clone().into_record())]);

        let plan = resolve(&pending, &mut MapView::default()).await.unwrap();
        assert_eq!(plan.writes, vec![customer.into_record()]);
    }

    #[tokio::test]
    async fn test_remove_after_add_in_same_batch_is_a_no_op() {
        let customer = Customer {
            id: CustomerId::new_v4(),
            ..Customer::default()
        };
        let pending = batch([
            Mutation::Add(customer.clone().into_record()),
            Mutation::Remove(customer.key()),
        ]);

        let plan = resolve(&pending, &mut MapView::default()).await.unwrap();
        assert_eq!(plan, CommitPlan::default());
    }

    #[tokio::test]
    async fn test_order_removal_cascades_to_committed_lines() {
        let (o, p) = (order(), product());
        let (l1, l2) = (line(&o, &p), line(&o, &p));
        let mut view = MapView::with([
            o.clone().into_record(),
            p.clone().into_record(),
            l1.clone().into_record(),
            l2.clone().into_record(),
        ]);
        let pending = batch([Mutation::Remove(o.key())]);

        let plan = resolve(&pending, &mut view).await.unwrap();

        assert_eq!(plan.cascaded, 2);
        assert_eq!(plan.deletes.len(), 3);
        assert!(plan.deletes.contains(&l1.key()));
        assert!(plan.deletes.contains(&l2.key()));
        // children first
        assert_eq!(plan.deletes.last(), Some(&o.key()));
        assert!(plan.writes.is_empty());
    }

    #[tokio::test]
    async fn test_cascade_skips_lines_already_removed() {
        let (o, p) = (order(), product());
        let l = line(&o, &p);
        let mut view = MapView::with([
            o.clone().into_record(),
            p.into_record(),
            l.clone().into_record(),
        ]);
        let pending = batch([Mutation::Remove(l.key()), Mutation::Remove(o.key())]);

        let plan = resolve(&pending, &mut view).await.unwrap();

        assert_eq!(plan.cascaded, 0);
        assert_eq!(plan.deletes, vec![l.key(), o.key()]);
    }

    #[tokio::test]
    async fn test_cascade_leaves_product_and_customer() {
        let customer = Customer {
            id: CustomerId::new_v4(),
            ..Customer::default()
        };
        let o = Order {
            customer_id: customer.id,
            ..order()
        };
        let p = product();
        let l = line(&o, &p);
        let mut view = MapView::with([
            customer.into_record(),
            o.clone().into_record(),
            p.into_record(),
            l.into_record(),
        ]);
        let pending = batch([Mutation::Remove(o.key())]);

        let plan = resolve(&pending, &mut view).await.unwrap();

        assert!(
            plan.deletes
                .iter()
                .all(|k| matches!(k.kind, EntityKind::Order | EntityKind::OrderLine))
        );
    }

    #[tokio::test]
    async fn test_dependent_lines_follow_pending_repoints() {
        let (o1, o2, p) = (order(), order(), product());
        let moved = line(&o1, &p);
        let stays = line(&o1, &p);
        let added = line(&o1, &p);
        let mut view = MapView::with([
            o1.clone().into_record(),
            o2.clone().into_record(),
            p.clone().into_record(),
            moved.clone().into_record(),
            stays.clone().into_record(),
        ]);

        let mut overlay = Overlay::default();
        overlay.write(
            OrderLine {
                order_id: o2.id,
                ..moved.clone()
            }
            .into_record(),
        );
        overlay.write(added.clone().into_record());

        let lines = dependent_lines(o1.id, &overlay, &mut view).await.unwrap();

        assert_eq!(lines, BTreeSet::from([stays.id, added.id]));
    }

    #[tokio::test]
    async fn test_line_with_missing_product_is_dangling() {
        let (o, p) = (order(), product());
        let l = line(&o, &p);
        let pending = batch([
            Mutation::Add(o.clone().into_record()),
            Mutation::Add(l.clone().into_record()),
        ]);

        let err = resolve(&pending, &mut MapView::default()).await.unwrap_err();

        match err {
            StoreError::DanglingReference { line, missing } => {
                assert_eq!(line, l.id);
                assert_eq!(missing, p.key());
            }
            other => panic!("expected dangling reference, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_line_added_after_order_removed_is_dangling() {
        let (o, p) = (order(), product());
        let mut view = MapView::with([o.clone().into_record(), p.clone().into_record()]);
        let pending = batch([
            Mutation::Remove(o.key()),
            Mutation::Add(line(&o, &p).into_record()),
        ]);

        let err = resolve(&pending, &mut view).await.unwrap_err();
        assert!(err.is_dangling_reference());
    }

    #[tokio::test]
    async fn test_line_referencing_committed_parents_is_accepted() {
        let (o, p) = (order(), product());
        let mut view = MapView::with([o.clone().into_record(), p.clone().into_record()]);
        let pending = batch([Mutation::Add(line(&o, &p).into_record())]);

        let plan = resolve(&pending, &mut view).await.unwrap();
        assert_eq!(plan.writes.len(), 1);
    }

    #[tokio::test]
    async fn test_product_removal_does_not_cascade() {
        let (o, p) = (order(), product());
        let l = line(&o, &p);
        let mut view = MapView::with([
            o.into_record(),
            p.clone().into_record(),
            l.into_record(),
        ]);
        let pending = batch([Mutation::Remove(p.key())]);

        let plan = resolve(&pending, &mut view).await.unwrap();
        assert_eq!(plan.deletes, vec![p.key()]);
        assert_eq!(plan.cascaded, 0);
    }

    #[tokio::test]
    async fn test_order_added_and_removed_in_one_batch_counts_no_cascade() {
        let (o, p) = (order(), product());
        let l = line(&o, &p);
        let pending = batch([
            Mutation::Add(p.clone().into_record()),
            Mutation::Add(o.clone().into_record()),
            Mutation::Add(l.into_record()),
            Mutation::Remove(o.key()),
        ]);

        let plan = resolve(&pending, &mut MapView::default()).await.unwrap();
        let summary = plan.summary();

        assert_eq!(plan.writes, vec![p.into_record()]);
        assert!(plan.deletes.is_empty());
        assert_eq!(summary.cascaded, 0);
        assert!(summary.cascaded <= summary.deleted);
    }

    #[tokio::test]
    async fn test_cascade_counts_only_committed_lines() {
        let (o, p) = (order(), product());
        let committed = line(&o, &p);
        let pending_line = line(&o, &p);
        let mut view = MapView::with([
            o.clone().into_record(),
            p.clone().into_record(),
            committed.clone().into_record(),
        ]);
        let pending = batch([
            Mutation::Add(pending_line.into_record()),
            Mutation::Remove(o.key()),
        ]);

        let plan = resolve(&pending, &mut view).await.unwrap();

        assert_eq!(plan.cascaded, 1);
        assert_eq!(plan.deletes, vec![committed.key(), o.key()]);
        assert!(plan.writes.is_empty());
    }

    #[tokio::test]
    async fn test_line_updated_to_missing_product_is_dangling() {
        let (o, p) = (order(), product());
        let l = line(&o, &p);
        let mut view = MapView::with([
            o.into_record(),
            p.into_record(),
            l.clone().into_record(),
        ]);
        let ghost = ProductId::new_v4();
        let pending = batch([Mutation::Update(
            OrderLine {
                product_id: ghost,
                ..l.clone()
            }
            .into_record(),
        )]);

        let err = resolve(&pending, &mut view).await.unwrap_err();

        match err {
            StoreError::DanglingReference { line, missing } => {
                assert_eq!(line, l.id);
                assert_eq!(missing, EntityKey::of::<Product>(ghost));
            }
            other => panic!("expected dangling reference, got {other:?}"),
        }
    }
}
