pub mod provider;
pub mod session;

pub use provider::{AuthProvider, HttpAuthProvider};
pub use session::SessionContext;
