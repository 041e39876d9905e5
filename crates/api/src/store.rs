//! Registration persistence.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use icvk_common::error::AppError;
use icvk_common::types::{NewRegistration, Registration};

/// Storage for registrations.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Persist a registration, assigning its id and creation time.
    async fn save(&self, registration: NewRegistration) -> Result<Registration, AppError>;

    /// All registrations, newest first.
    async fn find_all(&self) -> Result<Vec<Registration>, AppError>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgRegistrationStore {
    pool: PgPool,
}

impl PgRegistrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistrationStore for PgRegistrationStore {
    async fn save(&self, registration: NewRegistration) -> Result<Registration, AppError> {
        let saved: Registration = sqlx::query_as(
            r#"
            INSERT INTO registrations (
                id, child_name, batch, center, father_name, mother_name, dob,
                media_consent, email, child_photo_url, payment_screenshot_url, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&registration.child_name)
        .bind(&registration.batch)
        .bind(&registration.center)
        .bind(&registration.father_name)
        .bind(&registration.mother_name)
        .bind(registration.dob)
        .bind(registration.media_consent)
        .bind(&registration.email)
        .bind(&registration.child_photo_url)
        .bind(&registration.payment_screenshot_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            registration_id = %saved.id,
            center = %saved.center,
            batch = %saved.batch,
            "Registration saved"
        );

        Ok(saved)
    }

    async fn find_all(&self) -> Result<Vec<Registration>, AppError> {
        let registrations: Vec<Registration> =
            sqlx::query_as("SELECT * FROM registrations ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;

        Ok(registrations)
    }
}
