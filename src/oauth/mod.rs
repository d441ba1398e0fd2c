//! OAuth token issuance
//!
//! Registered clients exchange their credentials for an access token taken
//! from a fresh portal login.

pub mod generator;
pub mod registry;
mod router;
pub mod types;

pub use generator::AccessGenerator;
pub use registry::CredentialRegistry;
pub use router::{TokenState, create_token_router};
