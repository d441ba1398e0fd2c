//! Admin API routing configuration

use axum::{
    Router, middleware,
    routing::{delete, get},
};

use super::{
    handlers::{list_clients, register_client, revoke_client},
    middleware::{AdminState, admin_auth_middleware},
};

/// Create Admin API router
///
/// # Endpoints
/// - `GET /clients` - List registered clients
/// - `POST /clients` - Register client
/// - `DELETE /clients/:id` - Revoke client
///
/// # Authentication
/// Requires Admin API Key authentication, supports:
/// - `x-api-key` header
/// - `Authorization: Bearer <token>` header
pub fn create_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/clients", get(list_clients).post(register_client))
        .route("/clients/{id}", delete(revoke_client))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
