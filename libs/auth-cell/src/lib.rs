pub mod error;
pub mod services;

pub use error::AuthError;
pub use services::*;
