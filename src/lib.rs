pub mod auth;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod schema;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use auth::TokenConfig;
pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) {
    let mut conn = pool.get().expect("Failed to get DB connection for migrations");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run database migrations");
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::register_employee,
        handlers::auth::register_admin,
        handlers::auth::login,
        handlers::auth::get_profile,
        handlers::auth::get_profile_by_id,
        handlers::auth::list_profiles,
        handlers::auth::update_profile,
        handlers::auth::change_password,
        handlers::auth::delete_account,
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::create_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::products::restock_product,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::list_user_orders,
        handlers::orders::get_user_order,
        handlers::orders::create_admin_order,
        handlers::orders::create_online_order,
        handlers::orders::create_shop_order,
        handlers::orders::confirm_online_order,
        handlers::orders::confirm_shop_order,
        handlers::orders::update_order,
        handlers::orders::delete_order,
        handlers::ordered_products::add_line_item,
        handlers::ordered_products::list_for_order,
        handlers::ordered_products::get_line_item,
        handlers::ordered_products::list_user_all,
        handlers::ordered_products::list_user_for_order,
        handlers::ordered_products::list_user_current,
        handlers::ordered_products::get_user_current_item,
        handlers::ordered_products::get_user_line_item,
        handlers::ordered_products::update_line_item,
        handlers::ordered_products::update_current_quantity,
        handlers::ordered_products::delete_line_item,
        handlers::ordered_products::delete_user_current_item,
    ),
    tags(
        (name = "auth", description = "Registration, login and profiles"),
        (name = "products", description = "Catalog management"),
        (name = "orders", description = "Order lifecycle"),
        (name = "ordered-products", description = "Order line items"),
    )
)]
struct ApiDoc;

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    pool: DbPool,
    token_config: TokenConfig,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(token_config.clone()))
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(handlers::auth::register))
                    .route(
                        "/employee/register",
                        web::post().to(handlers::auth::register_employee),
                    )
                    .route(
                        "/admin/register",
                        web::post().to(handlers::auth::register_admin),
                    )
                    .route("/login", web::post().to(handlers::auth::login))
                    .route("/profiles", web::get().to(handlers::auth::list_profiles))
                    .route("/profile", web::get().to(handlers::auth::get_profile))
                    .route("/profile", web::put().to(handlers::auth::update_profile))
                    .route("/profile", web::delete().to(handlers::auth::delete_account))
                    .route(
                        "/profile/password",
                        web::patch().to(handlers::auth::change_password),
                    )
                    .route(
                        "/profile/{id}",
                        web::get().to(handlers::auth::get_profile_by_id),
                    ),
            )
            .service(
                web::scope("/products")
                    .route("", web::get().to(handlers::products::list_products))
                    .route("", web::post().to(handlers::products::create_product))
                    .route(
                        "/restock/{id}",
                        web::patch().to(handlers::products::restock_product),
                    )
                    .route("/{id}", web::get().to(handlers::products::get_product))
                    .route("/{id}", web::put().to(handlers::products::update_product))
                    .route("/{id}", web::delete().to(handlers::products::delete_product)),
            )
            .service(
                web::scope("/orders")
                    .route("", web::get().to(handlers::orders::list_orders))
                    .route("/user", web::get().to(handlers::orders::list_user_orders))
                    .route("/user/{id}", web::get().to(handlers::orders::get_user_order))
                    .route("/admin", web::post().to(handlers::orders::create_admin_order))
                    .route(
                        "/online",
                        web::post().to(handlers::orders::create_online_order),
                    )
                    .route("/shop", web::post().to(handlers::orders::create_shop_order))
                    .route(
                        "/confirm-online",
                        web::patch().to(handlers::orders::confirm_online_order),
                    )
                    .route(
                        "/confirm-shop",
                        web::patch().to(handlers::orders::confirm_shop_order),
                    )
                    .route("/{id}", web::get().to(handlers::orders::get_order))
                    .route("/{id}", web::put().to(handlers::orders::update_order))
                    .route("/{id}", web::delete().to(handlers::orders::delete_order)),
            )
            .service(
                web::scope("/ordered-products")
                    .route(
                        "",
                        web::post().to(handlers::ordered_products::add_line_item),
                    )
                    .route(
                        "/for-order/{order_id}",
                        web::get().to(handlers::ordered_products::list_for_order),
                    )
                    .route(
                        "/user/all",
                        web::get().to(handlers::ordered_products::list_user_all),
                    )
                    .route(
                        "/user/for-order/{order_id}",
                        web::get().to(handlers::ordered_products::list_user_for_order),
                    )
                    .route(
                        "/user/current",
                        web::get().to(handlers::ordered_products::list_user_current),
                    )
                    .route(
                        "/user/current/{product_id}",
                        web::get().to(handlers::ordered_products::get_user_current_item),
                    )
                    .route(
                        "/user/current/{product_id}",
                        web::delete().to(handlers::ordered_products::delete_user_current_item),
                    )
                    .route(
                        "/user/orders/{order_id}/products/{product_id}",
                        web::get().to(handlers::ordered_products::get_user_line_item),
                    )
                    .route(
                        "/quantity/{product_id}",
                        web::patch().to(handlers::ordered_products::update_current_quantity),
                    )
                    .route(
                        "/orders/{order_id}/products/{product_id}",
                        web::get().to(handlers::ordered_products::get_line_item),
                    )
                    .route(
                        "/orders/{order_id}/products/{product_id}",
                        web::put().to(handlers::ordered_products::update_line_item),
                    )
                    .route(
                        "/orders/{order_id}/products/{product_id}",
                        web::delete().to(handlers::ordered_products::delete_line_item),
                    ),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
