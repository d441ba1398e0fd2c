//! Admin API module
//!
//! Provides HTTP API for OAuth client management
//!
//! # Features
//! - List registered clients
//! - Register a client with its portal account
//! - Revoke a client
//!
//! # Usage
//! ```ignore
//! let admin_service = AdminService::new(registry.clone());
//! let admin_state = AdminState::new(admin_api_key, admin_service);
//! let admin_router = create_admin_router(admin_state);
//! ```

mod error;
mod handlers;
mod middleware;
mod router;
mod service;
pub mod types;

pub use middleware::AdminState;
pub use router::create_admin_router;
pub use service::AdminService;
