//! Uniform view over the four entity types.
//!
//! The store is written once against [`Entity`] and moves heterogeneous
//! entities around as [`Record`]s keyed by [`EntityKey`].

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Customer, Order, OrderLine, Product};
use crate::types::{CustomerId, EntityId, OrderId, OrderLineId, ProductId};

/// Error returned when parsing an [`EntityKind`] fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid entity kind: {0}")]
pub struct EntityKindError(pub String);

/// The kind of an entity.
///
/// Ordered parent-first: customers and products before orders, orders before
/// order lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    Product,
    Order,
    OrderLine,
}

impl EntityKind {
    /// All kinds, parent-first.
    pub const ALL: [Self; 4] = [Self::Customer, Self::Product, Self::Order, Self::OrderLine];

    /// The `snake_case` name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Product => "product",
            Self::Order => "order",
            Self::OrderLine => "order_line",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = EntityKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "product" => Ok(Self::Product),
            "order" => Ok(Self::Order),
            "order_line" => Ok(Self::OrderLine),
            _ => Err(EntityKindError(s.to_owned())),
        }
    }
}

/// Identity of an entity of any kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity identifier.
    pub id: Uuid,
}

impl EntityKey {
    /// Create a key.
    #[must_use]
    pub const fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    /// Key of the entity of type `E` with the given id.
    #[must_use]
    pub fn of<E: Entity>(id: E::Id) -> Self {
        Self::new(E::KIND, id.as_uuid())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// An entity of any kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Record {
    Customer(Customer),
    Product(Product),
    Order(Order),
    OrderLine(OrderLine),
}

impl Record {
    /// The kind of the wrapped entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Customer(_) => EntityKind::Customer,
            Self::Product(_) => EntityKind::Product,
            Self::Order(_) => EntityKind::Order,
            Self::OrderLine(_) => EntityKind::OrderLine,
        }
    }

    /// The identity of the wrapped entity.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        let id = match self {
            Self::Customer(c) => c.id.as_uuid(),
            Self::Product(p) => p.id.as_uuid(),
            Self::Order(o) => o.id.as_uuid(),
            Self::OrderLine(l) => l.id.as_uuid(),
        };
        EntityKey::new(self.kind(), id)
    }

    /// Borrow the wrapped order line, if this is one.
    #[must_use]
    pub const fn as_order_line(&self) -> Option<&OrderLine> {
        match self {
            Self::OrderLine(line) => Some(line),
            _ => None,
        }
    }
}

/// A persistable entity.
///
/// Implemented for [`Customer`], [`Product`], [`Order`] and [`OrderLine`].
pub trait Entity: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Identifier type.
    type Id: EntityId;

    /// Kind tag.
    const KIND: EntityKind;

    /// This entity's identifier.
    fn id(&self) -> Self::Id;

    /// Wrap into a [`Record`].
    fn into_record(self) -> Record;

    /// Unwrap from a [`Record`] of the matching kind.
    fn from_record(record: Record) -> Option<Self>;

    /// Clear navigation fields so only scalar columns remain.
    fn detach(&mut self) {}

    /// This entity's identity.
    fn key(&self) -> EntityKey {
        EntityKey::new(Self::KIND, self.id().as_uuid())
    }
}

macro_rules! impl_entity {
    ($ty:ident, $id:ty, $kind:ident) => {
        impl_entity!($ty, $id, $kind, |_e: &mut $ty| {});
    };
    ($ty:ident, $id:ty, $kind:ident, $detach:expr) => {
        impl Entity for $ty {
            type Id = $id;

            const KIND: EntityKind = EntityKind::$kind;

            fn id(&self) -> Self::Id {
                self.id
            }

            fn into_record(self) -> Record {
                Record::$kind(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$kind(entity) => Some(entity),
                    _ => None,
                }
            }

            fn detach(&mut self) {
                let detach: fn(&mut $ty) = $detach;
                detach(self);
            }
        }

        impl From<$ty> for Record {
            fn from(entity: $ty) -> Self {
                Self::$kind(entity)
            }
        }
    };
}

impl_entity!(Customer, CustomerId, Customer);
impl_entity!(Product, ProductId, Product);
impl_entity!(Order, OrderId, Order, Order::clear_navigation);
impl_entity!(OrderLine, OrderLineId, OrderLine, |line: &mut OrderLine| {
    line.product = None;
});
