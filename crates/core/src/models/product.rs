//! Product records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// A product that order lines refer to.
///
/// The slug is not unique: several products may share one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Product title.
    pub title: String,
    /// Long-form description.
    pub description: String,
    /// URL slug (non-unique).
    pub slug: String,
    /// Unit price.
    pub price: Decimal,
}
