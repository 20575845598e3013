use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Identity;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::product::{NewProductRow, ProductRow};
use crate::schema::products;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub price: String,
    pub stock: i32,
    pub points: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub stock: i32,
    pub price: String,
    pub points: i32,
}

impl From<ProductRow> for ProductResponse {
    fn from(row: ProductRow) -> Self {
        ProductResponse {
            id: row.id,
            name: row.name,
            description: row.description,
            image: row.image,
            stock: row.stock,
            price: row.price.to_string(),
            points: row.points,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RestockRequest {
    pub amount: i32,
}

fn parse_price(raw: &str) -> Result<BigDecimal, AppError> {
    let price = BigDecimal::from_str(raw)
        .map_err(|e| AppError::BadRequest(format!("Invalid price '{}': {}", raw, e)))?;
    if price < BigDecimal::from(0) {
        return Err(AppError::BadRequest("Price must not be negative".to_string()));
    }
    Ok(price)
}

fn validate_product(body: &ProductRequest) -> Result<BigDecimal, AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Product name is required".to_string()));
    }
    if body.stock < 0 {
        return Err(AppError::BadRequest("Stock must not be negative".to_string()));
    }
    if body.points < 0 {
        return Err(AppError::BadRequest("Points must not be negative".to_string()));
    }
    parse_price(&body.price)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /products
#[utoipa::path(
    get,
    path = "/products",
    responses(
        (status = 200, description = "All products", body = [ProductResponse]),
        (status = 404, description = "Catalog is empty"),
    ),
    tag = "products"
)]
pub async fn list_products(pool: web::Data<DbPool>) -> Result<HttpResponse, AppError> {
    let rows = web::block(move || {
        let mut conn = pool.get()?;
        products::table
            .order(products::name.asc())
            .select(ProductRow::as_select())
            .load(&mut conn)
            .map_err(AppError::from)
    })
    .await??;

    if rows.is_empty() {
        return Err(AppError::NotFound("There are no products".to_string()));
    }

    let items: Vec<ProductResponse> = rows.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(items))
}

/// GET /products/{id}
#[utoipa::path(
    get,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ProductResponse),
        (status = 404, description = "Product not found"),
    ),
    tag = "products"
)]
pub async fn get_product(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();

    let row = web::block(move || {
        let mut conn = pool.get()?;
        products::table
            .find(product_id)
            .select(ProductRow::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
    })
    .await??;

    Ok(HttpResponse::Ok().json(ProductResponse::from(row)))
}

/// POST /products (employee/admin)
#[utoipa::path(
    post,
    path = "/products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid product data"),
        (status = 403, description = "Employee or admin role required"),
    ),
    tag = "products"
)]
pub async fn create_product(
    pool: web::Data<DbPool>,
    identity: Identity,
    body: web::Json<ProductRequest>,
) -> Result<HttpResponse, AppError> {
    identity.require_staff()?;
    let body = body.into_inner();
    let price = validate_product(&body)?;

    let row = web::block(move || {
        let mut conn = pool.get()?;
        let new_row = NewProductRow {
            id: Uuid::new_v4(),
            name: body.name,
            description: body.description,
            image: body.image,
            stock: body.stock,
            price,
            points: body.points,
        };
        diesel::insert_into(products::table)
            .values(&new_row)
            .execute(&mut conn)?;
        products::table
            .find(new_row.id)
            .select(ProductRow::as_select())
            .first(&mut conn)
            .map_err(AppError::from)
    })
    .await??;

    let location = format!("/products/{}", row.id);
    Ok(HttpResponse::Created()
        .insert_header(("Location", location))
        .json(ProductResponse::from(row)))
}

/// PUT /products/{id} (employee/admin) — full replace.
#[utoipa::path(
    put,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 403, description = "Employee or admin role required"),
        (status = 404, description = "Product not found"),
    ),
    tag = "products"
)]
pub async fn update_product(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<ProductRequest>,
) -> Result<HttpResponse, AppError> {
    identity.require_staff()?;
    let product_id = path.into_inner();
    let body = body.into_inner();
    let price = validate_product(&body)?;

    let row = web::block(move || {
        let mut conn = pool.get()?;
        let updated = diesel::update(products::table.find(product_id))
            .set((
                products::name.eq(&body.name),
                products::description.eq(&body.description),
                products::image.eq(body.image.clone()),
                products::stock.eq(body.stock),
                products::price.eq(&price),
                products::points.eq(body.points),
                products::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(AppError::NotFound("Product not found".to_string()));
        }
        products::table
            .find(product_id)
            .select(ProductRow::as_select())
            .first(&mut conn)
            .map_err(AppError::from)
    })
    .await??;

    Ok(HttpResponse::Ok().json(ProductResponse::from(row)))
}

/// DELETE /products/{id} (employee/admin)
#[utoipa::path(
    delete,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 403, description = "Employee or admin role required"),
        (status = 404, description = "Product not found"),
    ),
    tag = "products"
)]
pub async fn delete_product(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    identity.require_staff()?;
    let product_id = path.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;
        let deleted = diesel::delete(products::table.find(product_id)).execute(&mut conn)?;
        if deleted == 0 {
            return Err(AppError::NotFound("Product not found".to_string()));
        }
        Ok(())
    })
    .await??;

    Ok(HttpResponse::Ok().json(json!({ "message": format!("Product {} deleted", product_id) })))
}

/// PATCH /products/restock/{id} (employee/admin)
///
/// Additive stock adjustment, separate from the ordering decrement path.
#[utoipa::path(
    patch,
    path = "/products/restock/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = RestockRequest,
    responses(
        (status = 200, description = "Product restocked", body = ProductResponse),
        (status = 400, description = "Amount must be at least 1"),
        (status = 403, description = "Employee or admin role required"),
        (status = 404, description = "Product not found"),
    ),
    tag = "products"
)]
pub async fn restock_product(
    pool: web::Data<DbPool>,
    identity: Identity,
    path: web::Path<Uuid>,
    body: web::Json<RestockRequest>,
) -> Result<HttpResponse, AppError> {
    identity.require_staff()?;
    let product_id = path.into_inner();
    let amount = body.into_inner().amount;
    if amount < 1 {
        return Err(AppError::BadRequest(
            "Restock amount must be at least 1".to_string(),
        ));
    }

    let row = web::block(move || {
        let mut conn = pool.get()?;
        let updated = diesel::update(products::table.find(product_id))
            .set((
                products::stock.eq(products::stock + amount),
                products::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;
        if updated == 0 {
            return Err(AppError::NotFound("Product not found".to_string()));
        }
        products::table
            .find(product_id)
            .select(ProductRow::as_select())
            .first(&mut conn)
            .map_err(AppError::from)
    })
    .await??;

    Ok(HttpResponse::Ok().json(ProductResponse::from(row)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(price: &str, stock: i32, points: i32) -> ProductRequest {
        ProductRequest {
            name: "Fair-trade coffee".to_string(),
            description: "250g beans".to_string(),
            image: None,
            price: price.to_string(),
            stock,
            points,
        }
    }

    #[test]
    fn valid_product_parses_price() {
        let price = validate_product(&request("9.99", 10, 2)).unwrap();
        assert_eq!(price, BigDecimal::from_str("9.99").unwrap());
    }

    #[test]
    fn negative_price_is_rejected() {
        assert!(validate_product(&request("-1.00", 10, 2)).is_err());
    }

    #[test]
    fn malformed_price_is_rejected() {
        assert!(validate_product(&request("ten euros", 10, 2)).is_err());
    }

    #[test]
    fn negative_stock_is_rejected() {
        assert!(validate_product(&request("9.99", -1, 2)).is_err());
    }

    #[test]
    fn negative_points_are_rejected() {
        assert!(validate_product(&request("9.99", 10, -2)).is_err());
    }
}
