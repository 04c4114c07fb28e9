//! In-memory backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use bugstore_core::{EntityKey, EntityKind, OrderId, OrderLineId, Record};

use super::{Backend, BackendKind};
use crate::batch::PendingBatch;
use crate::error::StoreError;
use crate::resolver::{self, CommitPlan, CommitSummary, StateView};

/// Committed rows, one table per kind.
#[derive(Debug, Clone, Default)]
struct Tables {
    rows: BTreeMap<EntityKind, BTreeMap<Uuid, Record>>,
}

impl Tables {
    fn get(&self, key: EntityKey) -> Option<&Record> {
        self.rows.get(&key.kind).and_then(|table| table.get(&key.id))
    }

    fn scan(&self, kind: EntityKind) -> Vec<Record> {
        self.rows
            .get(&kind)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    fn apply(&mut self, plan: CommitPlan) {
        for key in plan.deletes {
            if let Some(table) = self.rows.get_mut(&key.kind) {
                table.remove(&key.id);
            }
        }
        for record in plan.writes {
            let key = record.key();
            self.rows.entry(key.kind).or_default().insert(key.id, record);
        }
    }
}

/// Committed state seen by the resolver.
struct TablesView<'a> {
    tables: &'a Tables,
}

#[async_trait]
impl StateView for TablesView<'_> {
    async fn contains(&mut self, key: EntityKey) -> Result<bool, StoreError> {
        Ok(self.tables.get(key).is_some())
    }

    async fn order_line_ids(&mut self, order: OrderId) -> Result<Vec<OrderLineId>, StoreError> {
        Ok(self
            .tables
            .rows
            .get(&EntityKind::OrderLine)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter_map(Record::as_order_line)
            .filter(|line| line.order_id == order)
            .map(|line| line.id)
            .collect())
    }
}

/// Process-local backend.
///
/// Readers clone an `Arc` snapshot and never wait on a commit for longer than
/// the pointer swap. Commits are serialized by the write lock; the resolver
/// runs against the locked tables and the plan is applied copy-on-write, so
/// readers holding an older snapshot keep seeing it unchanged.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<Arc<Tables>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn snapshot(&self) -> Arc<Tables> {
        Arc::clone(&*self.state.read().await)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn fetch(&self, key: EntityKey) -> Result<Option<Record>, StoreError> {
        Ok(self.snapshot().await.get(key).cloned())
    }

    async fn scan(&self, kind: EntityKind) -> Result<Vec<Record>, StoreError> {
        Ok(self.snapshot().await.scan(kind))
    }

    #[instrument(skip(self, batch), fields(mutations = batch.len()))]
    async fn commit(&self, batch: &PendingBatch) -> Result<CommitSummary, StoreError> {
        let mut state = self.state.write().await;

        let plan = {
            let mut view = TablesView { tables: &state };
            resolver::resolve(batch, &mut view).await?
        };
        let summary = plan.summary();

        Arc::make_mut(&mut *state).apply(plan);
        debug!(?summary, "memory commit applied");
        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bugstore_core::{Customer, CustomerId, Entity, Order};

    use super::*;
    use crate::batch::Mutation;

    fn customer(name: &str) -> Customer {
        Customer {
            id: CustomerId::new_v4(),
            name: name.to_owned(),
            ..Customer::default()
        }
    }

    #[tokio::test]
    async fn test_commit_then_fetch() {
        let backend = MemoryBackend::new();
        let c = customer("Grace");
        let batch: PendingBatch = [Mutation::Add(c.clone().into_record())].into_iter().collect();

        let summary = backend.commit(&batch).await.unwrap();

        assert_eq!(summary.written, 1);
        assert_eq!(backend.fetch(c.key()).await.unwrap(), Some(c.into_record()));
        assert_eq!(backend.scan(EntityKind::Customer).await.unwrap().len(), 1);
        assert!(backend.scan(EntityKind::Order).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let backend = MemoryBackend::new();
        let batch: PendingBatch = [
            Mutation::Add(customer("Kept out").into_record()),
            Mutation::Remove(EntityKey::of::<Order>(OrderId::new_v4())),
        ]
        .into_iter()
        .collect();

        let err = backend.commit(&batch).await.unwrap_err();

        assert!(err.is_not_found());
        assert!(backend.scan(EntityKind::Customer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_later_commits() {
        let backend = MemoryBackend::new();
        let before = backend.snapshot().await;

        let batch: PendingBatch = [Mutation::Add(customer("Later").into_record())]
            .into_iter()
            .collect();
        backend.commit(&batch).await.unwrap();

        assert!(before.scan(EntityKind::Customer).is_empty());
        assert_eq!(backend.snapshot().await.scan(EntityKind::Customer).len(), 1);
    }

    #[tokio::test]
    async fn test_scan_is_ordered_by_id() {
        let backend = MemoryBackend::new();
        let batch: PendingBatch = (0..5)
            .map(|i| Mutation::Add(customer(&format!("c{i}")).into_record()))
            .collect();
        backend.commit(&batch).await.unwrap();

        let ids: Vec<_> = backend
            .scan(EntityKind::Customer)
            .await
            .unwrap()
            .iter()
            .map(|r| r.key().id)
            .collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
