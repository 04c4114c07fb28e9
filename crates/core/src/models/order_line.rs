//! Order line records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Product;
use crate::types::{OrderId, OrderLineId, ProductId};

/// A single line of an order.
///
/// `quantity` and `total` are caller-validated: zero and negative quantities
/// are accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderLine {
    /// Unique line ID.
    pub id: OrderLineId,
    /// Owning order (authoritative foreign key).
    pub order_id: OrderId,
    /// Product on this line (authoritative foreign key).
    pub product_id: ProductId,
    /// Number of units.
    pub quantity: i32,
    /// Line total.
    pub total: Decimal,
    /// The product, if loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}
