//! Configuration Management
//!
//! API credentials and endpoint URLs, loaded from the environment.

pub mod credentials;
pub mod endpoints;

// Re-export
pub use credentials::{Credentials, SecretString};
pub use endpoints::Endpoints;
