//! BugStore Core - Entity model for the order-management data layer.
//!
//! This crate provides the records every other BugStore component works with:
//! - `data` - The store (persistence context) and its backends
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access.
//! Entities are plain data holders: constructors never validate, and a freshly
//! defaulted entity carries the nil identifier.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe entity IDs
//! - [`models`] - `Customer`, `Product`, `Order`, `OrderLine`
//! - [`entity`] - The [`Entity`] trait, [`EntityKind`], [`EntityKey`] and [`Record`]

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod entity;
pub mod models;
pub mod types;

pub use entity::{Entity, EntityKey, EntityKind, EntityKindError, Record};
pub use models::{Customer, Order, OrderLine, Product};
pub use types::*;
