//! Order records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Customer, OrderLine};
use crate::types::{CustomerId, OrderId};

/// An order placed by a customer.
///
/// Timestamps are never stamped by the store: callers set `created_at` on
/// creation and move `updated_at` forward (see [`Order::touch`]) whenever they
/// mutate the order, keeping `updated_at >= created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// Customer who placed the order (authoritative foreign key).
    pub customer_id: CustomerId,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When the order was last updated.
    pub updated_at: DateTime<Utc>,
    /// Order lines, if loaded. `None` means "not loaded", which is distinct
    /// from `Some(vec![])` ("loaded, and there are none").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<OrderLine>>,
    /// The customer, if loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
}

impl Order {
    /// Set `updated_at` to `at`.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    /// Whether the order lines have been loaded.
    #[must_use]
    pub const fn lines_loaded(&self) -> bool {
        self.lines.is_some()
    }

    /// Drop all navigation fields, keeping only scalar columns.
    pub fn clear_navigation(&mut self) {
        self.lines = None;
        self.customer = None;
    }
}
