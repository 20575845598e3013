pub mod identity;
pub mod password;
pub mod token;

pub use identity::Identity;
pub use token::TokenConfig;
