pub mod error;
pub mod models;
pub mod services;

pub use error::DoctorError;
pub use models::*;
pub use services::*;
