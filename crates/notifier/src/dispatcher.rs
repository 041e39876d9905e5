//! Retrying dispatcher: fire-and-forget confirmation delivery.
//!
//! Each dispatch runs as its own tokio task and walks a small state machine:
//!
//! ```text
//! Pending -> Sending -> Success
//!                    -> ConfigFailure
//!                    -> WaitingToRetry -> Sending
//!                    -> RetriesExhausted
//! ```
//!
//! The delay between attempts is fixed (no jitter, no growth) and the total
//! number of attempts is bounded by [`RetryPolicy::max_attempts`]. Nothing is
//! reported back to the HTTP caller; outcomes are logged and returned through
//! the task's `JoinHandle` for whoever wants to observe them.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use uuid::Uuid;

use icvk_common::config::AppConfig;
use icvk_common::types::Registration;

use crate::channel::DeliveryChannel;
use crate::error::NotifyError;
use crate::payload::{self, NotificationRequest};

/// Default total attempts, first try included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default fixed pause between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Attempt bound and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.notify_max_attempts,
            Duration::from_millis(config.notify_retry_delay_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Per-dispatch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Pending,
    Sending,
    WaitingToRetry,
    Success,
    ConfigFailure,
    RetriesExhausted,
}

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { attempts: u32 },
    /// The payload could not be built; nothing was sent.
    InvalidPayload,
    /// A non-retryable error stopped the sequence.
    ConfigFailure { attempts: u32 },
    RetriesExhausted { attempts: u32 },
}

/// In-flight delivery of one notification. Lives only inside the task.
struct DeliveryAttempt {
    request: NotificationRequest,
    attempts_remaining: u32,
    attempts_made: u32,
    last_error: Option<NotifyError>,
}

impl DeliveryAttempt {
    fn new(request: NotificationRequest, max_attempts: u32) -> Self {
        Self {
            request,
            attempts_remaining: max_attempts,
            attempts_made: 0,
            last_error: None,
        }
    }
}

/// Spawns detached delivery tasks over a shared channel.
#[derive(Clone)]
pub struct Dispatcher {
    channel: Arc<dyn DeliveryChannel>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(channel: Arc<dyn DeliveryChannel>, policy: RetryPolicy) -> Self {
        Self { channel, policy }
    }

    /// Start delivery in the background right away.
    pub fn dispatch_async(&self, registration: Registration) -> JoinHandle<DispatchOutcome> {
        self.dispatch_after(registration, std::future::ready(()))
    }

    /// Start delivery in the background once `gate` resolves.
    ///
    /// The intake handler passes a future that completes when its response
    /// has been handed to the client, so no delivery I/O starts before the
    /// caller has its answer.
    pub fn dispatch_after<G>(&self, registration: Registration, gate: G) -> JoinHandle<DispatchOutcome>
    where
        G: Future<Output = ()> + Send + 'static,
    {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            gate.await;
            dispatcher.run(&registration).await
        })
    }

    /// Build the payload and drive it to a terminal state.
    pub async fn run(&self, registration: &Registration) -> DispatchOutcome {
        match payload::build(registration) {
            Ok(request) => self.deliver(registration.id, request).await,
            Err(e) => {
                tracing::error!(
                    registration_id = %registration.id,
                    error = %e,
                    "Cannot build confirmation email, dropping notification"
                );
                DispatchOutcome::InvalidPayload
            }
        }
    }

    /// Send `request` until it succeeds, hits a non-retryable error, or the
    /// attempt budget runs out.
    pub async fn deliver(&self, registration_id: Uuid, request: NotificationRequest) -> DispatchOutcome {
        let mut attempt = DeliveryAttempt::new(request, self.policy.max_attempts);
        let mut state = DispatchState::Pending;

        loop {
            state = match state {
                DispatchState::Pending => DispatchState::Sending,
                DispatchState::Sending => self.send_once(registration_id, &mut attempt).await,
                DispatchState::WaitingToRetry => {
                    tracing::debug!(
                        registration_id = %registration_id,
                        delay_ms = self.policy.delay.as_millis() as u64,
                        attempts_remaining = attempt.attempts_remaining,
                        "Waiting before next delivery attempt"
                    );
                    tokio::time::sleep(self.policy.delay).await;
                    DispatchState::Sending
                }
                DispatchState::Success => {
                    return DispatchOutcome::Delivered {
                        attempts: attempt.attempts_made,
                    };
                }
                DispatchState::ConfigFailure => {
                    tracing::error!(
                        registration_id = %registration_id,
                        attempts = attempt.attempts_made,
                        error = ?attempt.last_error,
                        "Confirmation email abandoned, delivery is not possible"
                    );
                    return DispatchOutcome::ConfigFailure {
                        attempts: attempt.attempts_made,
                    };
                }
                DispatchState::RetriesExhausted => {
                    tracing::error!(
                        registration_id = %registration_id,
                        attempts = attempt.attempts_made,
                        error = ?attempt.last_error,
                        "Confirmation email failed after all attempts"
                    );
                    return DispatchOutcome::RetriesExhausted {
                        attempts: attempt.attempts_made,
                    };
                }
            };
        }
    }

    async fn send_once(&self, registration_id: Uuid, attempt: &mut DeliveryAttempt) -> DispatchState {
        attempt.attempts_remaining -= 1;
        attempt.attempts_made += 1;

        tracing::info!(
            registration_id = %registration_id,
            channel = self.channel.name(),
            attempt = attempt.attempts_made,
            max_attempts = self.policy.max_attempts,
            "Delivering confirmation email"
        );

        match self.channel.send(&attempt.request).await {
            Ok(()) => {
                tracing::info!(
                    registration_id = %registration_id,
                    attempt = attempt.attempts_made,
                    "Confirmation email delivered"
                );
                DispatchState::Success
            }
            Err(e) if !e.is_retryable() => {
                attempt.last_error = Some(e);
                DispatchState::ConfigFailure
            }
            Err(e) => {
                tracing::warn!(
                    registration_id = %registration_id,
                    attempt = attempt.attempts_made,
                    error = %e,
                    "Delivery attempt failed"
                );
                attempt.last_error = Some(e);
                if attempt.attempts_remaining > 0 {
                    DispatchState::WaitingToRetry
                } else {
                    DispatchState::RetriesExhausted
                }
            }
        }
    }
}
