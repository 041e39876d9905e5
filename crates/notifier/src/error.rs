use thiserror::Error;

/// Failures on the detached notification path.
///
/// None of these ever reach the HTTP caller. The dispatcher only uses them
/// to decide between retrying and giving up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// The payload cannot be built or addressed, whatever the attempt count.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A message template failed to register or render.
    #[error("Template error: {0}")]
    Template(String),

    /// Mail credentials or relay settings are missing or unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network or relay failure that may succeed on a later attempt.
    #[error("Channel error: {0}")]
    Channel(String),
}

impl NotifyError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, NotifyError::Channel(_))
    }
}
