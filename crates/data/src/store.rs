//! Unit of work over a backend.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use bugstore_core::{Customer, Entity, EntityKey, Order, OrderId, OrderLine, Product, Record};

use crate::backend::Backend;
use crate::batch::{Mutation, PendingBatch};
use crate::cancel::OrCancelExt;
use crate::error::StoreError;
use crate::query::Query;
use crate::resolver::CommitSummary;

/// One unit of work.
///
/// Registrations (`add`, `update`, `remove`) only touch the pending batch.
/// Reads see committed state, never the pending batch. [`Store::commit`]
/// applies the whole batch or nothing.
///
/// A store is owned by one task; concurrent units of work each take their
/// own from [`Database::store`](crate::Database::store).
#[derive(Debug)]
pub struct Store {
    backend: Arc<dyn Backend>,
    pending: PendingBatch,
    cancel: CancellationToken,
}

fn decode<E: Entity>(record: Record) -> Result<E, StoreError> {
    let kind = record.kind();
    E::from_record(record).ok_or_else(|| {
        StoreError::DataCorruption(format!("expected {} record, backend returned {kind}", E::KIND))
    })
}

impl Store {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            pending: PendingBatch::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Bind a cancellation token.
    ///
    /// Reads and commits started after the token fires return
    /// `StoreError::Cancelled`; one in flight is abandoned without applying
    /// anything.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The token this store races its I/O against.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register `entity` for insertion.
    ///
    /// Navigation fields are dropped. Adding an id twice is not checked; the
    /// last registration wins.
    pub fn add<E: Entity>(&mut self, mut entity: E) {
        entity.detach();
        debug!(key = %entity.key(), "add registered");
        self.pending.push(Mutation::Add(entity.into_record()));
    }

    /// Register each entity for insertion, in order.
    pub fn add_range<E, I>(&mut self, entities: I)
    where
        E: Entity,
        I: IntoIterator<Item = E>,
    {
        for entity in entities {
            self.add(entity);
        }
    }

    /// Register `entity` to replace the entity with the same id.
    ///
    /// The commit fails with `StoreError::NotFound` if no such entity exists.
    pub fn update<E: Entity>(&mut self, mut entity: E) {
        entity.detach();
        debug!(key = %entity.key(), "update registered");
        self.pending.push(Mutation::Update(entity.into_record()));
    }

    /// Register `entity` for removal.
    ///
    /// Removing an order removes its order lines too.
    pub fn remove<E: Entity>(&mut self, entity: &E) {
        self.remove_by_id::<E>(entity.id());
    }

    /// Register the entity of type `E` with `id` for removal.
    pub fn remove_by_id<E: Entity>(&mut self, id: E::Id) {
        let key = EntityKey::of::<E>(id);
        debug!(%key, "remove registered");
        self.pending.push(Mutation::Remove(key));
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Committed entity with `id`, or `None`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Cancelled` if the token fires, or a backend error.
    #[instrument(skip(self), fields(kind = %E::KIND))]
    pub async fn find_by_id<E: Entity>(&self, id: E::Id) -> Result<Option<E>, StoreError> {
        self.backend
            .fetch(EntityKey::of::<E>(id))
            .or_cancel(&self.cancel)
            .await?
            .map(decode::<E>)
            .transpose()
    }

    /// Committed entities of type `E` matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Cancelled` if the token fires, or a backend error.
    #[instrument(skip(self, predicate), fields(kind = %E::KIND))]
    pub async fn query<E, P>(&self, predicate: P) -> Result<Query<E>, StoreError>
    where
        E: Entity,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Ok(Query::new(self.list::<E>().await?, predicate))
    }

    /// Every committed entity of type `E`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Cancelled` if the token fires, or a backend error.
    pub async fn list<E: Entity>(&self) -> Result<Vec<E>, StoreError> {
        self.backend
            .scan(E::KIND)
            .or_cancel(&self.cancel)
            .await?
            .into_iter()
            .map(decode::<E>)
            .collect()
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Populate `order.customer` from committed state.
    ///
    /// Left `None` if the customer does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Cancelled` if the token fires, or a backend error.
    pub async fn load_customer(&self, order: &mut Order) -> Result<(), StoreError> {
        order.customer = self.find_by_id::<Customer>(order.customer_id).await?;
        Ok(())
    }

    /// Populate `order.lines` with its committed order lines.
    ///
    /// An order without lines gets `Some(vec![])`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Cancelled` if the token fires, or a backend error.
    pub async fn load_lines(&self, order: &mut Order) -> Result<(), StoreError> {
        let id = order.id;
        let lines = self.query(move |line: &OrderLine| line.order_id == id).await?;
        order.lines = Some(lines.to_vec());
        Ok(())
    }

    /// Populate `line.product` from committed state.
    ///
    /// Left `None` if the product does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Cancelled` if the token fires, or a backend error.
    pub async fn load_product(&self, line: &mut OrderLine) -> Result<(), StoreError> {
        line.product = self.find_by_id::<Product>(line.product_id).await?;
        Ok(())
    }

    /// Committed order with its lines loaded.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Cancelled` if the token fires, or a backend error.
    pub async fn find_order_with_lines(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let Some(mut order) = self.find_by_id::<Order>(id).await? else {
            return Ok(None);
        };
        self.load_lines(&mut order).await?;
        Ok(Some(order))
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Apply the pending batch atomically.
    ///
    /// On success the batch is cleared. On failure committed state is
    /// unchanged and the batch is kept for inspection or [`Store::discard`].
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if an update or remove targets a missing entity
    /// - `StoreError::DanglingReference` if an order line would reference a
    ///   missing order or product
    /// - `StoreError::ConstraintViolation` if the backend rejects the batch
    /// - `StoreError::Cancelled` if the token fires first
    #[instrument(skip(self), fields(backend = %self.backend.kind(), pending = self.pending.len()))]
    pub async fn commit(&mut self) -> Result<CommitSummary, StoreError> {
        if self.pending.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            return Ok(CommitSummary::default());
        }

        let result = self
            .backend
            .commit(&self.pending)
            .or_cancel(&self.cancel)
            .await;
        match result {
            Ok(summary) => {
                self.pending.clear();
                info!(
                    written = summary.written,
                    deleted = summary.deleted,
                    cascaded = summary.cascaded,
                    "commit applied"
                );
                Ok(summary)
            }
            Err(err) => {
                warn!(error = %err, "commit failed, pending batch kept");
                Err(err)
            }
        }
    }

    /// Drop every pending registration.
    pub fn discard(&mut self) {
        if !self.pending.is_empty() {
            debug!(dropped = self.pending.len(), "pending batch discarded");
        }
        self.pending.clear();
    }

    /// Number of pending registrations.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether anything is pending.
    #[must_use]
    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The pending batch, in registration order.
    #[must_use]
    pub const fn pending(&self) -> &PendingBatch {
        &self.pending
    }
}
