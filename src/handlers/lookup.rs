//! Entity lookups shared by the order and line-item handlers. Each returns
//! `NotFound` with a stable message when the reference does not resolve.

use diesel::prelude::*;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::order::OrderRow;
use crate::models::product::ProductRow;
use crate::models::user::{Role, UserRow};
use crate::schema::{orders, product_orders, products, users};

pub(crate) fn find_client(conn: &mut PgConnection, id: Uuid) -> Result<UserRow, AppError> {
    users::table
        .filter(users::id.eq(id))
        .filter(users::role.eq(Role::Client.as_str()))
        .select(UserRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound("Client not found".to_string()))
}

pub(crate) fn find_client_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> Result<UserRow, AppError> {
    users::table
        .filter(users::email.eq(email))
        .filter(users::role.eq(Role::Client.as_str()))
        .select(UserRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound("Client not found".to_string()))
}

pub(crate) fn find_employee(conn: &mut PgConnection, id: Uuid) -> Result<UserRow, AppError> {
    users::table
        .filter(users::id.eq(id))
        .filter(users::role.eq_any([Role::Employee.as_str(), Role::Admin.as_str()]))
        .select(UserRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound("Employee not found".to_string()))
}

pub(crate) fn find_order(conn: &mut PgConnection, id: Uuid) -> Result<OrderRow, AppError> {
    orders::table
        .find(id)
        .select(OrderRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

pub(crate) fn find_product(conn: &mut PgConnection, id: Uuid) -> Result<ProductRow, AppError> {
    products::table
        .find(id)
        .select(ProductRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

pub(crate) fn product_order_exists(
    conn: &mut PgConnection,
    order_id: Uuid,
    product_id: Uuid,
) -> Result<bool, AppError> {
    let count: i64 = product_orders::table
        .filter(product_orders::order_id.eq(order_id))
        .filter(product_orders::product_id.eq(product_id))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}
