//! Store error taxonomy.

use thiserror::Error;

use bugstore_core::{EntityKey, OrderLineId};

/// Errors surfaced by store operations.
///
/// A commit that returns any of these has left committed state exactly as it
/// was before the call.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An update or remove targeted an entity that does not exist.
    #[error("not found: {0}")]
    NotFound(EntityKey),

    /// An order line would reference an order or product that does not exist
    /// once the batch is applied.
    #[error("dangling reference: order line {line} references missing {missing}")]
    DanglingReference {
        /// The offending order line.
        line: OrderLineId,
        /// The order or product it points at.
        missing: EntityKey,
    },

    /// A structural constraint enforced by the backend failed (e.g. a check
    /// or uniqueness constraint in `PostgreSQL`).
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Data read back from the backend is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The configured backend is not compiled into this build.
    #[error("backend unavailable: {0} (enable the `{0}` feature)")]
    BackendUnavailable(&'static str),

    /// Database error from sqlx.
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[cfg(feature = "postgres")]
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Whether this error is [`StoreError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error is [`StoreError::DanglingReference`].
    #[must_use]
    pub const fn is_dangling_reference(&self) -> bool {
        matches!(self, Self::DanglingReference { .. })
    }
}

#[cfg(test)]
mod tests {
    use bugstore_core::{EntityKind, Order, OrderId};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_not_found_message_names_the_key() {
        let id = OrderId::new_v4();
        let err = StoreError::NotFound(EntityKey::of::<Order>(id));
        assert_eq!(err.to_string(), format!("not found: order:{id}"));
        assert!(err.is_not_found());
        assert!(!err.is_dangling_reference());
    }

    #[test]
    fn test_dangling_reference_message() {
        let line = OrderLineId::new_v4();
        let product = Uuid::new_v4();
        let err = StoreError::DanglingReference {
            line,
            missing: EntityKey::new(EntityKind::Product, product),
        };
        assert_eq!(
            err.to_string(),
            format!("dangling reference: order line {line} references missing product:{product}")
        );
        assert!(err.is_dangling_reference());
    }
}
