//! Admin API HTTP handlers

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use super::{
    middleware::AdminState,
    types::{RegisterClientRequest, SuccessResponse},
};

/// GET /api/admin/clients
/// List registered clients
pub async fn list_clients(State(state): State<AdminState>) -> impl IntoResponse {
    Json(state.service.list_clients())
}

/// POST /api/admin/clients
/// Register or replace a client
pub async fn register_client(
    State(state): State<AdminState>,
    Json(payload): Json<RegisterClientRequest>,
) -> impl IntoResponse {
    match state.service.register_client(payload) {
        Ok(response) => Json(response).into_response(),
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}

/// DELETE /api/admin/clients/:id
/// Revoke a client
pub async fn revoke_client(
    State(state): State<AdminState>,
    Path(client_id): Path<String>,
) -> impl IntoResponse {
    match state.service.revoke_client(&client_id) {
        Ok(_) => {
            Json(SuccessResponse::new(format!("Client {} revoked", client_id))).into_response()
        }
        Err(e) => (e.status_code(), Json(e.into_response())).into_response(),
    }
}
