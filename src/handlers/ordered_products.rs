//! Line-item ledger: every mutation keeps `products.stock` and
//! `orders.price` consistent with the line items, inside one transaction.

use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Identity;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::product_order::{NewProductOrderRow, ProductOrderRow};
use crate::models::user::UserRow;
use crate::schema::{orders, product_orders, products};

use super::lookup::{find_client, find_order, find_product, product_order_exists};
use super::orders::create_open_order;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddLineItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LineItemResponse {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub ordered_at: DateTime<Utc>,
    pub unit_price: String,
}

fn line_item_response(row: ProductOrderRow, name: String, price: BigDecimal) -> LineItemResponse {
    LineItemResponse {
        order_id: row.order_id,
        product_id: row.product_id,
        product_name: name,
        quantity: row.quantity,
        ordered_at: row.ordered_at,
        unit_price: price.to_string(),
    }
}

// ── Shared ledger primitives ─────────────────────────────────────────────────

fn find_line_item(
    conn: &mut PgConnection,
    order_id: Uuid,
    product_id: Uuid,
) -> Result<ProductOrderRow, AppError> {
    product_orders::table
        .find((order_id, product_id))
        .select(ProductOrderRow::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::NotFound("Product order not found".to_string()))
}

fn current_order_of(client: &UserRow) -> Result<Uuid, AppError> {
    client
        .current_order_id
        .ok_or_else(|| AppError::BadRequest("No active order".to_string()))
}

/// Moves order price by `delta` in place. The expression-level update keeps
/// the adjustment atomic against concurrent price changes on the same row.
fn adjust_order_price(
    conn: &mut PgConnection,
    order_id: Uuid,
    delta: BigDecimal,
) -> Result<(), AppError> {
    diesel::update(orders::table.find(order_id))
        .set((
            orders::price.eq(orders::price + delta),
            orders::version.eq(orders::version + 1),
        ))
        .execute(conn)?;
    Ok(())
}

/// Conditionally takes `delta` units of stock (negative delta gives stock
/// back). Returns false when the product row has less than `delta` left, in
/// which case nothing was written.
fn take_stock(conn: &mut PgConnection, product_id: Uuid, delta: i32) -> Result<bool, AppError> {
    let updated = diesel::update(
        products::table
            .find(product_id)
            .filter(products::stock.ge(delta)),
    )
    .set((
        products::stock.eq(products::stock - delta),
        products::updated_at.eq(Utc::now()),
    ))
    .execute(conn)?;
    Ok(updated == 1)
}

/// Sets a line item's quantity and propagates the delta to stock and order
/// price. The line-item write is a compare-and-swap on its version; losing
/// the race surfaces as `Conflict` (row still there) or `NotFound` (row
/// deleted meanwhile).
fn apply_quantity_update(
    conn: &mut PgConnection,
    order_id: Uuid,
    product_id: Uuid,
    new_quantity: i32,
) -> Result<LineItemResponse, AppError> {
    if new_quantity < 1 {
        return Err(AppError::BadRequest(
            "Quantity must be at least 1".to_string(),
        ));
    }

    let item = find_line_item(conn, order_id, product_id)?;
    let product = find_product(conn, product_id)?;
    find_order(conn, order_id)?;

    let delta = new_quantity - item.quantity;
    if product.stock < delta {
        return Err(AppError::BadRequest(format!(
            "Not enough stock of {}: {} available",
            product.name, product.stock
        )));
    }

    let updated = diesel::update(
        product_orders::table
            .find((order_id, product_id))
            .filter(product_orders::version.eq(item.version)),
    )
    .set((
        product_orders::quantity.eq(new_quantity),
        product_orders::version.eq(item.version + 1),
    ))
    .execute(conn)?;

    if updated == 0 {
        return if product_order_exists(conn, order_id, product_id)? {
            Err(AppError::Conflict(
                "The order item was modified concurrently".to_string(),
            ))
        } else {
            Err(AppError::NotFound(
                "The order item was deleted in the meantime".to_string(),
            ))
        };
    }

    if !take_stock(conn, product_id, delta)? {
        return Err(AppError::BadRequest(format!(
            "Not enough stock of {}: {} available",
            product.name, product.stock
        )));
    }
    adjust_order_price(conn, order_id, product.price.clone() * BigDecimal::from(delta))?;

    let row = find_line_item(conn, order_id, product_id)?;
    Ok(line_item_response(row, product.name, product.price))
}

/// Removes a line item, giving its quantity back to stock and subtracting its
/// contribution from the order total.
fn remove_line_item(
    conn: &mut PgConnection,
    order_id: Uuid,
    product_id: Uuid,
) -> Result<(), AppError> {
    let item = find_line_item(conn, order_id, product_id)?;
    let product = find_product(conn, product_id)?;
    find_order(conn, order_id)?;

    take_stock(conn, product_id, -item.quantity)?;
    adjust_order_price(
        conn,
        order_id,
        -(product.price * BigDecimal::from(item.quantity)),
    )?;
    diesel::delete(product_orders::table.find((order_id, product_id))).execute(conn)?;
    Ok(())
}

type DetailRow = (ProductOrderRow, String, BigDecimal);

fn details_for_order(conn: &mut PgConnection, order_id: Uuid) -> Result<Vec<DetailRow>, AppError> {
    product_orders::table
        .inner_join(products::table)
        .filter(product_orders::order_id.eq(order_id))
        .select((
            ProductOrderRow::as_select(),
            products::name,
            products::price,
        ))
        .load(conn)
        .map_err(AppError::from)
}

fn into_responses(rows: Vec<DetailRow>) -> Vec<LineItemResponse> {
    rows.into_iter()
        .map(|(row, name, price)| line_item_response(row, name, price))
        .collect()
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /ordered-products
///
/// Adds a product to the caller's current order, creating the order first
/// when none is open. Within one transaction: the line item is inserted,
/// stock is taken through a conditional decrement (`stock >= quantity`
/// enforced in the UPDATE itself, so two racing adds cannot drive it
/// negative), and the order total grows by `price × quantity`.
#[utoipa::path(
    post,
    path = "/ordered-products",
    request_body = AddLineItemRequest,
    responses(
        (status = 201, description = "Line item added", body = LineItemResponse),
        (status = 400, description = "Quantity below 1 or not enough stock"),
        (status = 403, description = "Order belongs to another client"),
        (status = 404, description = "Client or product not found"),
        (status = 409, description = "Product already in the order"),
    ),
    tag = "ordered-products"
)]
pub async fn add_line_item(
    pool: web::Data<DbPool>,
    identity: Identity,
    body: web::Json<AddLineItemRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    if body.quantity < 1 {
        return Err(AppError::BadRequest(
            "Quantity must be at least 1".to_string(),
        ));
    }
    let is_client = identity.is_client();
    let caller_id = identity.user_id;

    let item = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let client = find_client(conn, caller_id)?;
            let order = match client.current_order_id {
                Some(id) => find_order(conn, id)?,
                None => create_open_order(conn, &client, None)?,
            };
            let product = find_product(conn, body.product_id)?;

            if is_client && order.client_id != Some(caller_id) {
                return Err(AppError::Forbidden(
                    "You can only add products to your own orders".to_string(),
                ));
            }
            if product.stock < body.quantity {
                return Err(AppError::BadRequest(format!(
                    "Not enough stock of {}: {} available",
                    product.name, product.stock
                )));
            }
            if product_order_exists(conn, order.id, product.id)? {
                return Err(AppError::Conflict(
                    "Product is already in the order; update its quantity instead".to_string(),
                ));
            }

            // The read check above gives the deterministic 400; this guarded
            // decrement closes the window against a concurrent add.
            if !take_stock(conn, product.id, body.quantity)? {
                return Err(AppError::BadRequest(format!(
                    "Not enough stock of {}: {} available",
                    product.name, product.stock
                )));
            }

            let new_row = NewProductOrderRow {
                order_id: order.id,
                product_id: product.id,
                quantity: body.quantity,
                ordered_at: Utc::now(),
            };
            diesel::insert_into(product_orders::table)
                .values(&new_row)
                .execute(conn)?;

            adjust_order_price(
                conn,
                order.id,
                product.price.clone() * BigDecimal::from(body.quantity),
            )?;

            let row = find_line_item(conn, order.id, product.id)?;
            Ok(line_item_response(row, product.name, product.price))
        })
    })
    .await??;

    let location = format!(
        "/ordered-products/orders/{}/products/{}",
        item.order_id, item.product_id
    );
    Ok(HttpResponse::Created()
        .insert_header(("Location", location))
        .json(item))
}

/// GET /ordered-products/for-order/{order_id} (employee/admin)
#[utoipa::path(
    get,
    path = "/ordered-products/for-order/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Line items of the order", body = [LineItemResponse]),
        (status = 403, description = "Employee or admin role required"),
        (status = 404, description = "Order has no line items"),
    ),
    tag = "ordered-products"
)]
pub async fn list_for_order(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    identity.require_staff()?;
    let order_id = path.into_inner();

    let rows = web::block(move || {
        let mut conn = pool.get()?;
        details_for_order(&mut conn, order_id)
    })
    .await??;

    if rows.is_empty() {
        return Err(AppError::NotFound(format!(
            "No products found for order {}",
            order_id
        )));
    }
    Ok(HttpResponse::Ok().json(into_responses(rows)))
}

/// GET /ordered-products/orders/{order_id}/products/{product_id} (employee/admin)
#[utoipa::path(
    get,
    path = "/ordered-products/orders/{order_id}/products/{product_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order id"),
        ("product_id" = Uuid, Path, description = "Product id"),
    ),
    responses(
        (status = 200, description = "Line item", body = LineItemResponse),
        (status = 403, description = "Employee or admin role required"),
        (status = 404, description = "Line item not found"),
    ),
    tag = "ordered-products"
)]
pub async fn get_line_item(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    identity.require_staff()?;
    let (order_id, product_id) = path.into_inner();

    let item = web::block(move || {
        let mut conn = pool.get()?;
        let row = find_line_item(&mut conn, order_id, product_id)?;
        let product = find_product(&mut conn, product_id)?;
        Ok::<_, AppError>(line_item_response(row, product.name, product.price))
    })
    .await??;

    Ok(HttpResponse::Ok().json(item))
}

/// GET /ordered-products/user/all — every line item across the caller's orders.
#[utoipa::path(
    get,
    path = "/ordered-products/user/all",
    responses(
        (status = 200, description = "All of the caller's line items", body = [LineItemResponse]),
        (status = 404, description = "Caller has no ordered products"),
    ),
    tag = "ordered-products"
)]
pub async fn list_user_all(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    let rows = web::block(move || {
        let mut conn = pool.get()?;
        product_orders::table
            .inner_join(orders::table)
            .inner_join(products::table)
            .filter(orders::client_id.eq(identity.user_id))
            .select((
                ProductOrderRow::as_select(),
                products::name,
                products::price,
            ))
            .load::<DetailRow>(&mut conn)
            .map_err(AppError::from)
    })
    .await??;

    if rows.is_empty() {
        return Err(AppError::NotFound(
            "No ordered products found for this user".to_string(),
        ));
    }
    Ok(HttpResponse::Ok().json(into_responses(rows)))
}

/// GET /ordered-products/user/for-order/{order_id} — items of one of the
/// caller's orders; 404 when the order does not exist or is not theirs.
#[utoipa::path(
    get,
    path = "/ordered-products/user/for-order/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Line items of the order", body = [LineItemResponse]),
        (status = 404, description = "Order not found for this user"),
    ),
    tag = "ordered-products"
)]
pub async fn list_user_for_order(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let rows = web::block(move || {
        let mut conn = pool.get()?;
        let owned: i64 = orders::table
            .filter(orders::id.eq(order_id))
            .filter(orders::client_id.eq(identity.user_id))
            .count()
            .get_result(&mut conn)?;
        if owned == 0 {
            return Err(AppError::NotFound(format!("Order {} not found", order_id)));
        }
        details_for_order(&mut conn, order_id)
    })
    .await??;

    Ok(HttpResponse::Ok().json(into_responses(rows)))
}

/// GET /ordered-products/user/current — items of the caller's open order.
#[utoipa::path(
    get,
    path = "/ordered-products/user/current",
    responses(
        (status = 200, description = "Line items of the current order", body = [LineItemResponse]),
        (status = 400, description = "No active order"),
        (status = 404, description = "Caller is not a client"),
    ),
    tag = "ordered-products"
)]
pub async fn list_user_current(
    pool: web::Data<DbPool>,
    identity: Identity,
) -> Result<HttpResponse, AppError> {
    let rows = web::block(move || {
        let mut conn = pool.get()?;
        let client = find_client(&mut conn, identity.user_id)?;
        let order_id = current_order_of(&client)?;
        details_for_order(&mut conn, order_id)
    })
    .await??;

    Ok(HttpResponse::Ok().json(into_responses(rows)))
}

/// GET /ordered-products/user/current/{product_id}
#[utoipa::path(
    get,
    path = "/ordered-products/user/current/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Line item", body = LineItemResponse),
        (status = 400, description = "No active order"),
        (status = 404, description = "Product not in the current order"),
    ),
    tag = "ordered-products"
)]
pub async fn get_user_current_item(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();

    let item = web::block(move || {
        let mut conn = pool.get()?;
        let client = find_client(&mut conn, identity.user_id)?;
        let order_id = current_order_of(&client)?;
        let row = find_line_item(&mut conn, order_id, product_id)?;
        let product = find_product(&mut conn, product_id)?;
        Ok::<_, AppError>(line_item_response(row, product.name, product.price))
    })
    .await??;

    Ok(HttpResponse::Ok().json(item))
}

/// GET /ordered-products/user/orders/{order_id}/products/{product_id}
#[utoipa::path(
    get,
    path = "/ordered-products/user/orders/{order_id}/products/{product_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order id"),
        ("product_id" = Uuid, Path, description = "Product id"),
    ),
    responses(
        (status = 200, description = "Line item", body = LineItemResponse),
        (status = 403, description = "Item belongs to another client's order"),
        (status = 404, description = "Line item not found"),
    ),
    tag = "ordered-products"
)]
pub async fn get_user_line_item(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (order_id, product_id) = path.into_inner();

    let item = web::block(move || {
        let mut conn = pool.get()?;
        let row = find_line_item(&mut conn, order_id, product_id)?;
        let order = find_order(&mut conn, order_id)?;
        if identity.is_client() && order.client_id != Some(identity.user_id) {
            return Err(AppError::Forbidden(
                "You do not have permission to view this item".to_string(),
            ));
        }
        let product = find_product(&mut conn, product_id)?;
        Ok(line_item_response(row, product.name, product.price))
    })
    .await??;

    Ok(HttpResponse::Ok().json(item))
}

/// PUT /ordered-products/orders/{order_id}/products/{product_id} (employee/admin)
#[utoipa::path(
    put,
    path = "/ordered-products/orders/{order_id}/products/{product_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order id"),
        ("product_id" = Uuid, Path, description = "Product id"),
    ),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Quantity updated", body = LineItemResponse),
        (status = 400, description = "Quantity below 1 or not enough stock"),
        (status = 403, description = "Employee or admin role required"),
        (status = 404, description = "Line item not found"),
        (status = 409, description = "Line item was modified concurrently"),
    ),
    tag = "ordered-products"
)]
pub async fn update_line_item(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<UpdateQuantityRequest>,
) -> Result<HttpResponse, AppError> {
    identity.require_staff()?;
    let (order_id, product_id) = path.into_inner();
    let quantity = body.into_inner().quantity;

    let item = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            apply_quantity_update(conn, order_id, product_id, quantity)
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(item))
}

/// PATCH /ordered-products/quantity/{product_id} — quantity change on the
/// caller's current order.
#[utoipa::path(
    patch,
    path = "/ordered-products/quantity/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product id")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Quantity updated", body = LineItemResponse),
        (status = 400, description = "No active order, quantity below 1 or not enough stock"),
        (status = 404, description = "Product not in the current order"),
        (status = 409, description = "Line item was modified concurrently"),
    ),
    tag = "ordered-products"
)]
pub async fn update_current_quantity(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<UpdateQuantityRequest>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    let quantity = body.into_inner().quantity;

    let item = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let client = find_client(conn, identity.user_id)?;
            let order_id = current_order_of(&client)?;
            apply_quantity_update(conn, order_id, product_id, quantity)
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(item))
}

/// DELETE /ordered-products/orders/{order_id}/products/{product_id}
#[utoipa::path(
    delete,
    path = "/ordered-products/orders/{order_id}/products/{product_id}",
    params(
        ("order_id" = Uuid, Path, description = "Order id"),
        ("product_id" = Uuid, Path, description = "Product id"),
    ),
    responses(
        (status = 200, description = "Line item removed, stock restored"),
        (status = 403, description = "Item belongs to another client's order"),
        (status = 404, description = "Line item not found"),
    ),
    tag = "ordered-products"
)]
pub async fn delete_line_item(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (order_id, product_id) = path.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let order = find_order(conn, order_id)?;
            if identity.is_client() && order.client_id != Some(identity.user_id) {
                return Err(AppError::Forbidden(
                    "You do not have permission to delete this item".to_string(),
                ));
            }
            remove_line_item(conn, order_id, product_id)
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Product {} removed from order {}", product_id, order_id)
    })))
}

/// DELETE /ordered-products/user/current/{product_id}
#[utoipa::path(
    delete,
    path = "/ordered-products/user/current/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Line item removed, stock restored"),
        (status = 400, description = "No active order"),
        (status = 404, description = "Product not in the current order"),
    ),
    tag = "ordered-products"
)]
pub async fn delete_user_current_item(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();

    let order_id = web::block(move || {
        let mut conn = pool.get()?;
        conn.transaction::<_, AppError, _>(|conn| {
            let client = find_client(conn, identity.user_id)?;
            let order_id = current_order_of(&client)?;
            remove_line_item(conn, order_id, product_id)?;
            Ok(order_id)
        })
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Product {} removed from order {}", product_id, order_id)
    })))
}
