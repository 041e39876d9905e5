//! Registration intake and listing.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use icvk_common::error::AppError;
use icvk_common::types::Registration;

use crate::middleware::auth::AdminUser;
use crate::response::{committed, committed_json};
use crate::state::AppState;
use crate::validation::RegisterRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/icvk/register", post(register))
        .route("/api/icvk/registrations", get(list_registrations))
}

/// Response for an accepted registration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub registration_id: Uuid,
}

/// POST /api/icvk/register: Validate, persist, respond, then notify.
///
/// The confirmation email is dispatched in the background and only starts
/// once the 201 response body has been written. Its outcome never changes
/// the response.
async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = body.map_err(|e| {
        tracing::warn!(error = %e, "Rejected malformed registration body");
        AppError::Validation(e.body_text())
    })?;

    let new_registration = request
        .validate(state.config.cloudinary_cloud_name.as_deref())
        .inspect_err(|e| tracing::warn!(error = %e, "Registration failed validation"))?;

    let registration: Registration = state.store.save(new_registration).await?;

    let (response, signal) = committed_json(
        StatusCode::CREATED,
        &RegisterResponse {
            success: true,
            message: "Registration successful".to_string(),
            registration_id: registration.id,
        },
    )?;

    tracing::debug!(registration_id = %registration.id, "Scheduling confirmation email");
    state
        .dispatcher
        .dispatch_after(registration, committed(signal));

    Ok(response)
}

/// GET /api/icvk/registrations: Every registration, newest first. Admin only.
async fn list_registrations(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<Json<Vec<Registration>>, AppError> {
    let registrations = state.store.find_all().await?;
    tracing::debug!(admin = %admin.email, count = registrations.len(), "Listed registrations");
    Ok(Json(registrations))
}
