//! Entity builders for tests.

use chrono::{DateTime, Duration, NaiveDate, SubsecRound, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use bugstore_core::{
    Customer, CustomerId, Order, OrderId, OrderLine, OrderLineId, Product, ProductId,
};

/// Current time at the precision `PostgreSQL` stores.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A customer with a fresh id.
#[must_use]
pub fn customer(name: &str) -> Customer {
    Customer {
        id: CustomerId::new_v4(),
        name: name.to_owned(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        phone: "+1 555 0100".to_owned(),
        birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default(),
    }
}

/// A product with a fresh id and the given slug.
#[must_use]
pub fn product(slug: &str, price: Decimal) -> Product {
    Product {
        id: ProductId::new_v4(),
        title: slug.replace('-', " "),
        description: format!("Test product {slug}"),
        slug: slug.to_owned(),
        price,
    }
}

/// A slug no other test uses.
#[must_use]
pub fn unique_slug(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// An order for `customer` created now.
#[must_use]
pub fn order(customer: &Customer) -> Order {
    let at = now();
    Order {
        id: OrderId::new_v4(),
        customer_id: customer.id,
        created_at: at,
        updated_at: at,
        lines: None,
        customer: None,
    }
}

/// An order created an hour ago.
#[must_use]
pub fn aged_order(customer: &Customer) -> Order {
    let at = now() - Duration::hours(1);
    Order {
        created_at: at,
        updated_at: at,
        ..order(customer)
    }
}

/// A line of `quantity` units of `product` on `order`.
#[must_use]
pub fn line(order: &Order, product: &Product, quantity: i32) -> OrderLine {
    OrderLine {
        id: OrderLineId::new_v4(),
        order_id: order.id,
        product_id: product.id,
        quantity,
        total: product.price * Decimal::from(quantity),
        product: None,
    }
}
