pub mod auth;
pub mod orders;
pub mod ordered_products;
pub mod products;

mod lookup;
