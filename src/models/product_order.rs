use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::product_orders;

use super::order::OrderRow;
use super::product::ProductRow;

/// Line item joining an order and a product. Composite key means a product
/// appears at most once per order; quantity changes go through update.
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations,
)]
#[diesel(table_name = product_orders)]
#[diesel(primary_key(order_id, product_id))]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(belongs_to(ProductRow, foreign_key = product_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductOrderRow {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub ordered_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = product_orders)]
pub struct NewProductOrderRow {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub ordered_at: DateTime<Utc>,
}
