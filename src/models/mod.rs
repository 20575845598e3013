pub mod order;
pub mod product;
pub mod product_order;
pub mod user;
