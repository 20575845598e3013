use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Identity;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::order::{NewOrderRow, OrderRow};
use crate::models::user::UserRow;
use crate::schema::{orders, product_orders, products, users};

use super::lookup::{find_client, find_client_by_email, find_employee, find_order};

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    pub sales_rep_id: Option<Uuid>,
    pub order_date: NaiveDate,
    pub price: String,
    /// Optimistic-concurrency token; echo it back on PUT.
    pub version: i32,
}

impl From<OrderRow> for OrderResponse {
    fn from(row: OrderRow) -> Self {
        OrderResponse {
            id: row.id,
            client_id: row.client_id,
            sales_rep_id: row.sales_rep_id,
            order_date: row.order_date,
            price: row.price.to_string(),
            version: row.version,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminOrderRequest {
    pub client_id: Uuid,
    pub sales_rep_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ShopOrderRequest {
    pub client_email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderRequest {
    pub client_id: Option<Uuid>,
    pub sales_rep_id: Option<Uuid>,
    pub order_date: NaiveDate,
    /// Decimal total as a string, e.g. "25.00"
    pub price: String,
    /// The version the caller read; the update is rejected when it no longer
    /// matches (someone else committed in between).
    pub version: i32,
}

// ── Shared order creation / confirmation ─────────────────────────────────────

/// Creates an empty open order for `client` and points `current_order_id` at
/// it. Rejected up front when the client already has an open order, so no
/// orphan row is ever written.
pub(crate) fn create_open_order(
    conn: &mut PgConnection,
    client: &UserRow,
    sales_rep_id: Option<Uuid>,
) -> Result<OrderRow, AppError> {
    if client.current_order_id.is_some() {
        return Err(AppError::Conflict(
            "Client already has an open order".to_string(),
        ));
    }

    let new_row = NewOrderRow::open(client.id, sales_rep_id);
    let order_id = new_row.id;
    diesel::insert_into(orders::table)
        .values(&new_row)
        .execute(conn)?;

    diesel::update(users::table.find(client.id))
        .set(users::current_order_id.eq(order_id))
        .execute(conn)?;

    find_order(conn, order_id)
}

/// Finalizes `client`'s current order: credits loyalty points and clears the
/// open-order pointer. The order and its line items stay behind as history.
///
/// Points are credited once per distinct line item, NOT per unit. That is the
/// observable behavior this service has always had; see the confirmation test
/// before changing it.
fn confirm_current_order(conn: &mut PgConnection, client: &UserRow) -> Result<i32, AppError> {
    let order_id = client
        .current_order_id
        .ok_or_else(|| AppError::BadRequest("No active order".to_string()))?;

    let line_points: Vec<i32> = product_orders::table
        .inner_join(products::table)
        .filter(product_orders::order_id.eq(order_id))
        .select(products::points)
        .load(conn)?;
    let awarded: i32 = line_points.iter().sum();

    diesel::update(users::table.find(client.id))
        .set((
            users::points.eq(client.points.unwrap_or(0) + awarded),
            users::current_order_id.eq(None::<Uuid>),
        ))
        .execute(conn)?;

    Ok(awarded)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /orders (employee/admin)
#[utoipa::path(
    get,
    path = "/orders",
    responses(
        (status = 200, description = "All orders", body = [OrderResponse]),
        (status = 403, description = "Employee or admin role required"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    identity.require_staff()?;

    let rows = web::block(move || {
        let mut conn = pool.get()?;
        orders::table
            .order(orders::created_at.desc())
            .select(OrderRow::as_select())
            .load(&mut conn)
            .map_err(AppError::from)
    })
    .await??;

    let items: Vec<OrderResponse> = rows.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(items))
}

/// GET /orders/{id} (employee/admin)
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = OrderResponse),
        (status = 403, description = "Employee or admin role required"),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    identity.require_staff()?;
    let order_id = path.into_inner();

    let row = web::block(move || {
        let mut conn = pool.get()?;
        find_order(&mut conn, order_id)
    })
    .await??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(row)))
}

/// GET /orders/user — the caller's own orders (history plus the open one).
#[utoipa::path(
    get,
    path = "/orders/user",
    responses(
        (status = 200, description = "Caller's orders", body = [OrderResponse]),
    ),
    tag = "orders"
)]
pub async fn list_user_orders(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    let rows = web::block(move || {
        let mut conn = pool.get()?;
        orders::table
            .filter(orders::client_id.eq(identity.user_id))
            .order(orders::created_at.desc())
            .select(OrderRow::as_select())
            .load(&mut conn)
            .map_err(AppError::from)
    })
    .await??;

    let items: Vec<OrderResponse> = rows.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(items))
}

/// GET /orders/user/{id} — an order the caller owns (staff may read any).
#[utoipa::path(
    get,
    path = "/orders/user/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = OrderResponse),
        (status = 403, description = "Not the caller's order"),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_user_order(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let row = web::block(move || {
        let mut conn = pool.get()?;
        let order = find_order(&mut conn, order_id)?;
        if identity.is_client() && order.client_id != Some(identity.user_id) {
            return Err(AppError::Forbidden(
                "You do not have permission to view this order".to_string(),
            ));
        }
        Ok(order)
    })
    .await??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(row)))
}

/// POST /orders/admin (admin only) — create an order on a client's behalf.
#[utoipa::path(
    post,
    path = "/orders/admin",
    request_body = AdminOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Client or sales rep not found"),
        (status = 409, description = "Client already has an open order"),
    ),
    tag = "orders"
)]
pub async fn create_admin_order(
    pool: web::Data<DbPool>,
    identity: Identity,
    body: web::Json<AdminOrderRequest>,
) -> Result<HttpResponse, AppError> {
    identity.require_admin()?;
    let body = body.into_inner();

    let row = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let client = find_client(conn, body.client_id)?;
            if let Some(rep_id) = body.sales_rep_id {
                find_employee(conn, rep_id)?;
            }
            create_open_order(conn, &client, body.sales_rep_id)
        })
    })
    .await??;

    let location = format!("/orders/{}", row.id);
    Ok(HttpResponse::Created()
        .insert_header(("Location", location))
        .json(OrderResponse::from(row)))
}

/// POST /orders/online — the caller opens their own cart order.
#[utoipa::path(
    post,
    path = "/orders/online",
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 404, description = "Caller is not a client"),
        (status = 409, description = "Client already has an open order"),
    ),
    tag = "orders"
)]
pub async fn create_online_order(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    let row = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let client = find_client(conn, identity.user_id)?;
            create_open_order(conn, &client, None)
        })
    })
    .await??;

    let location = format!("/orders/{}", row.id);
    Ok(HttpResponse::Created()
        .insert_header(("Location", location))
        .json(OrderResponse::from(row)))
}

/// POST /orders/shop (employee/admin) — in-person order: the caller acts as
/// sales rep for the client resolved by email.
#[utoipa::path(
    post,
    path = "/orders/shop",
    request_body = ShopOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 403, description = "Employee or admin role required"),
        (status = 404, description = "Client or employee not found"),
        (status = 409, description = "Client already has an open order"),
    ),
    tag = "orders"
)]
pub async fn create_shop_order(
    pool: web::Data<DbPool>,
    identity: Identity,
    body: web::Json<ShopOrderRequest>,
) -> Result<HttpResponse, AppError> {
    identity.require_staff()?;
    let body = body.into_inner();

    let row = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let client = find_client_by_email(conn, &body.client_email)?;
            let sales_rep = find_employee(conn, identity.user_id)?;
            create_open_order(conn, &client, Some(sales_rep.id))
        })
    })
    .await??;

    let location = format!("/orders/{}", row.id);
    Ok(HttpResponse::Created()
        .insert_header(("Location", location))
        .json(OrderResponse::from(row)))
}

/// PATCH /orders/confirm-online — finalize the caller's current order.
#[utoipa::path(
    patch,
    path = "/orders/confirm-online",
    responses(
        (status = 200, description = "Order confirmed, points credited"),
        (status = 400, description = "No active order"),
        (status = 404, description = "Caller is not a client"),
    ),
    tag = "orders"
)]
pub async fn confirm_online_order(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    let awarded = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let client = find_client(conn, identity.user_id)?;
            confirm_current_order(conn, &client)
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Order confirmed",
        "points_awarded": awarded
    })))
}

/// PATCH /orders/confirm-shop (employee/admin) — finalize the current order
/// of the client resolved by email.
#[utoipa::path(
    patch,
    path = "/orders/confirm-shop",
    request_body = ShopOrderRequest,
    responses(
        (status = 200, description = "Order confirmed, points credited"),
        (status = 400, description = "No active order"),
        (status = 403, description = "Employee or admin role required"),
        (status = 404, description = "Client or employee not found"),
    ),
    tag = "orders"
)]
pub async fn confirm_shop_order(
    pool: web::Data<DbPool>,
    identity: Identity,
    body: web::Json<ShopOrderRequest>,
) -> Result<HttpResponse, AppError> {
    identity.require_staff()?;
    let body = body.into_inner();

    let awarded = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let client = find_client_by_email(conn, &body.client_email)?;
            find_employee(conn, identity.user_id)?;
            confirm_current_order(conn, &client)
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Order confirmed",
        "points_awarded": awarded
    })))
}

/// PUT /orders/{id}
///
/// Clients may edit only their own order and never its owner; staff may
/// reassign owner and sales rep after the references are validated. The write
/// is a compare-and-swap on `version`.
#[utoipa::path(
    put,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Invalid client or sales rep reference"),
        (status = 403, description = "Not entitled to edit this order"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order was modified concurrently"),
    ),
    tag = "orders"
)]
pub async fn update_order(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<UpdateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let body = body.into_inner();
    let price = BigDecimal::from_str(&body.price)
        .map_err(|e| AppError::BadRequest(format!("Invalid price '{}': {}", body.price, e)))?;

    let row = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let existing = find_order(conn, order_id)?;

            if identity.is_client() {
                if existing.client_id != Some(identity.user_id) {
                    return Err(AppError::Forbidden(
                        "You do not have permission to edit this order".to_string(),
                    ));
                }
                if body.client_id != existing.client_id {
                    return Err(AppError::Forbidden(
                        "You do not have permission to change the order's owner".to_string(),
                    ));
                }
            }

            if body.client_id != existing.client_id {
                let new_client = body.client_id.ok_or_else(|| {
                    AppError::BadRequest("An order owner cannot be removed".to_string())
                })?;
                find_client(conn, new_client)
                    .map_err(|_| AppError::BadRequest("Invalid new client id".to_string()))?;
            }

            if body.sales_rep_id != existing.sales_rep_id {
                if let Some(rep_id) = body.sales_rep_id {
                    find_employee(conn, rep_id)
                        .map_err(|_| AppError::BadRequest("Invalid sales rep id".to_string()))?;
                }
            }

            let updated = diesel::update(
                orders::table
                    .find(order_id)
                    .filter(orders::version.eq(body.version)),
            )
            .set((
                orders::client_id.eq(body.client_id),
                orders::sales_rep_id.eq(body.sales_rep_id),
                orders::order_date.eq(body.order_date),
                orders::price.eq(&price),
                orders::version.eq(body.version + 1),
            ))
            .execute(conn)?;

            if updated == 0 {
                // The row was there a moment ago; decide between gone and
                // version-bumped.
                return match find_order(conn, order_id) {
                    Ok(_) => Err(AppError::Conflict(
                        "The order was modified concurrently".to_string(),
                    )),
                    Err(_) => Err(AppError::NotFound("Order not found".to_string())),
                };
            }

            find_order(conn, order_id)
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(row)))
}

/// DELETE /orders/{id}
///
/// Hard removal: line items cascade away and stock is NOT restored, unlike
/// removing a single line item. A deleted open order clears the owner's
/// `current_order_id` through the FK.
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order deleted"),
        (status = 403, description = "Not the caller's order"),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn delete_order(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let order = find_order(conn, order_id)?;
            if identity.is_client() && order.client_id != Some(identity.user_id) {
                return Err(AppError::Forbidden(
                    "You do not have permission to delete this order".to_string(),
                ));
            }
            diesel::delete(orders::table.find(order_id)).execute(conn)?;
            Ok(())
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": format!("Order {} deleted", order_id) })))
}
