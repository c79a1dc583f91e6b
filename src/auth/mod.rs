//! Credentials and request authorization.

pub mod credentials;
pub mod gate;

pub use credentials::{Claims, CredentialError, Credentials, resolve_role};
pub use gate::{AdminOnly, Authenticated};
