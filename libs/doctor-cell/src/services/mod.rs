pub mod search;

pub use search::{DoctorDirectory, HttpDoctorDirectory};
