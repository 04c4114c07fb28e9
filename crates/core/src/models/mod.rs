//! Entity records.
//!
//! Customers and products are independent roots. Orders reference a customer
//! and own their order lines for lifecycle purposes; order lines also
//! reference a product, which holds no back-collection.
//!
//! Navigation fields (`Order::customer`, `Order::lines`, `OrderLine::product`)
//! are optional caches populated on demand by the store. The scalar foreign
//! keys beside them are always authoritative.

pub mod customer;
pub mod order;
pub mod order_line;
pub mod product;

pub use customer::Customer;
pub use order::Order;
pub use order_line::OrderLine;
pub use product::Product;
