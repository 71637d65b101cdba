pub mod error;
pub mod models;
pub mod services;

pub use error::{BookingError, ValidationError};
pub use models::*;
pub use services::*;
