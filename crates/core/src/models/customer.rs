//! Customer records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::CustomerId;

/// A customer who places orders.
///
/// Email and phone carry no uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Customer {
    /// Unique customer ID.
    pub id: CustomerId,
    /// Display name.
    pub name: String,
    /// Contact email (unvalidated).
    pub email: String,
    /// Contact phone (unvalidated).
    pub phone: String,
    /// Date of birth.
    pub birth_date: NaiveDate,
}
