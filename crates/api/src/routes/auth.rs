//! Admin login.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use icvk_common::error::AppError;

use crate::middleware::auth::encode_jwt;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/auth/login", post(login))
}

/// Request body for admin login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /api/auth/login: Check admin credentials, return a JWT.
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(req) = body.map_err(|e| AppError::Validation(e.body_text()))?;

    let (Some(admin_email), Some(admin_password)) =
        (&state.config.admin_email, &state.config.admin_password)
    else {
        return Err(AppError::Config(
            "Admin login is not configured".to_string(),
        ));
    };

    let email_ok = req.email.trim().eq_ignore_ascii_case(admin_email);
    let password_ok = constant_time_eq(req.password.as_bytes(), admin_password.as_bytes());
    if !(email_ok && password_ok) {
        tracing::warn!(email = %req.email, "Rejected admin login");
        return Err(AppError::Auth("Invalid email or password".to_string()));
    }

    let token = encode_jwt(admin_email, &state.config.jwt_secret, state.config.jwt_expiry_hours)?;
    tracing::info!(email = %admin_email, "Admin authenticated");

    Ok(Json(LoginResponse { token }))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
