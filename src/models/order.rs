use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::orders;

/// An order row. `version` is the optimistic-concurrency token: updates are
/// applied with a compare-and-swap on it, never blind writes.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    pub sales_rep_id: Option<Uuid>,
    pub order_date: NaiveDate,
    pub price: BigDecimal,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    pub sales_rep_id: Option<Uuid>,
    pub order_date: NaiveDate,
    pub price: BigDecimal,
}

impl NewOrderRow {
    /// Every order starts empty with a zero total.
    pub fn open(client_id: Uuid, sales_rep_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id: Some(client_id),
            sales_rep_id,
            order_date: Utc::now().date_naive(),
            price: BigDecimal::from(0),
        }
    }
}
