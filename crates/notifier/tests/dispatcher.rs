//! Dispatcher behaviour against scripted channels.
//!
//! Runs on tokio's paused clock, so retry delays are virtual and the
//! recorded send instants can be compared exactly.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

use icvk_common::types::{NewRegistration, Registration};
use icvk_notifier::{
    DeliveryChannel, DispatchOutcome, Dispatcher, NotificationRequest, NotifyError, RetryPolicy,
};

// ============================================================
// Helpers
// ============================================================

/// Channel that replays a script of results and records when it was called.
/// Once the script runs out it keeps returning `fallback`.
struct ScriptedChannel {
    script: Mutex<VecDeque<Result<(), NotifyError>>>,
    fallback: Result<(), NotifyError>,
    calls: Mutex<Vec<(Instant, NotificationRequest)>>,
}

impl ScriptedChannel {
    fn new(script: Vec<Result<(), NotifyError>>, fallback: Result<(), NotifyError>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn always(result: Result<(), NotifyError>) -> Arc<Self> {
        Self::new(Vec::new(), result)
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }
}

#[async_trait]
impl DeliveryChannel for ScriptedChannel {
    async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn transient() -> NotifyError {
    NotifyError::Channel("connection reset by relay".to_string())
}

fn registration(email: &str) -> Registration {
    Registration::from_new(
        Uuid::new_v4(),
        Utc::now(),
        NewRegistration {
            child_name: "Asha".into(),
            batch: "B1".into(),
            center: "C1".into(),
            father_name: "Ram".into(),
            mother_name: "Sita".into(),
            dob: NaiveDate::from_ymd_opt(2016, 8, 15).unwrap(),
            media_consent: true,
            email: email.into(),
            child_photo_url: "https://res.cloudinary.com/demo/image/upload/v1/icvk/registrations/a.jpg"
                .into(),
            payment_screenshot_url:
                "https://res.cloudinary.com/demo/image/upload/v1/icvk/registrations/b.jpg".into(),
        },
    )
}

fn dispatcher(channel: Arc<ScriptedChannel>, attempts: u32, delay: Duration) -> Dispatcher {
    Dispatcher::new(channel, RetryPolicy::new(attempts, delay))
}

// ============================================================
// Retry bound and timing
// ============================================================

#[tokio::test(start_paused = true)]
async fn test_always_failing_channel_gets_exactly_n_attempts() {
    let channel = ScriptedChannel::always(Err(transient()));
    let delay = Duration::from_secs(2);
    let dispatcher = dispatcher(channel.clone(), 3, delay);

    let outcome = dispatcher.dispatch_async(registration("parent@example.com")).await.unwrap();
    assert_eq!(outcome, DispatchOutcome::RetriesExhausted { attempts: 3 });

    let instants = channel.call_instants();
    assert_eq!(instants.len(), 3);
    assert_eq!(instants[1] - instants[0], delay);
    assert_eq!(instants[2] - instants[1], delay);

    // Nothing else is scheduled after exhaustion.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(channel.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_custom_bound_and_delay() {
    let channel = ScriptedChannel::always(Err(transient()));
    let delay = Duration::from_secs(5);
    let dispatcher = dispatcher(channel.clone(), 4, delay);

    let started = Instant::now();
    let outcome = dispatcher.run(&registration("parent@example.com")).await;

    assert_eq!(outcome, DispatchOutcome::RetriesExhausted { attempts: 4 });
    assert_eq!(channel.call_count(), 4);
    assert_eq!(started.elapsed(), delay * 3);
}

#[tokio::test(start_paused = true)]
async fn test_fail_once_then_succeed() {
    let channel = ScriptedChannel::new(vec![Err(transient())], Ok(()));
    let dispatcher = dispatcher(channel.clone(), 3, Duration::from_secs(2));

    let outcome = dispatcher.dispatch_async(registration("parent@example.com")).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Delivered { attempts: 2 });
    assert_eq!(channel.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_first_try_success_has_no_delay() {
    let channel = ScriptedChannel::always(Ok(()));
    let dispatcher = dispatcher(channel.clone(), 3, Duration::from_secs(2));

    let started = Instant::now();
    let outcome = dispatcher.run(&registration("parent@example.com")).await;

    assert_eq!(outcome, DispatchOutcome::Delivered { attempts: 1 });
    assert_eq!(started.elapsed(), Duration::ZERO);
}

// ============================================================
// Non-retryable failures
// ============================================================

#[tokio::test(start_paused = true)]
async fn test_configuration_error_is_not_retried() {
    let channel = ScriptedChannel::always(Err(NotifyError::Configuration(
        "Missing EMAIL_USER or EMAIL_PASS".to_string(),
    )));
    let dispatcher = dispatcher(channel.clone(), 3, Duration::from_secs(2));

    let outcome = dispatcher.dispatch_async(registration("parent@example.com")).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::ConfigFailure { attempts: 1 });
    assert_eq!(channel.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_configuration_error_after_transient_stops_immediately() {
    let channel = ScriptedChannel::new(
        vec![Err(transient())],
        Err(NotifyError::Configuration("relay rejected credentials".to_string())),
    );
    let dispatcher = dispatcher(channel.clone(), 3, Duration::from_secs(2));

    let outcome = dispatcher.run(&registration("parent@example.com")).await;

    assert_eq!(outcome, DispatchOutcome::ConfigFailure { attempts: 2 });
    assert_eq!(channel.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_payload_never_reaches_channel() {
    let channel = ScriptedChannel::always(Ok(()));
    let dispatcher = dispatcher(channel.clone(), 3, Duration::from_secs(2));

    let outcome = dispatcher.dispatch_async(registration("")).await.unwrap();

    assert_eq!(outcome, DispatchOutcome::InvalidPayload);
    assert_eq!(channel.call_count(), 0);
}

// ============================================================
// Payload identity and gating
// ============================================================

#[tokio::test(start_paused = true)]
async fn test_retries_resend_identical_payload() {
    let channel = ScriptedChannel::new(vec![Err(transient()), Err(transient())], Ok(()));
    let dispatcher = dispatcher(channel.clone(), 3, Duration::from_secs(2));

    dispatcher.run(&registration("parent@example.com")).await;

    let calls = channel.calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(_, request)| *request == calls[0].1));
    assert_eq!(calls[0].1.recipient(), "parent@example.com");
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_waits_for_gate() {
    let channel = ScriptedChannel::always(Ok(()));
    let dispatcher = dispatcher(channel.clone(), 3, Duration::from_secs(2));
    let (committed_tx, committed_rx) = oneshot::channel::<()>();

    let handle = dispatcher.dispatch_after(registration("parent@example.com"), async move {
        let _ = committed_rx.await;
    });

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(channel.call_count(), 0, "no send before the gate opens");

    committed_tx.send(()).unwrap();
    let outcome = handle.await.unwrap();

    assert_eq!(outcome, DispatchOutcome::Delivered { attempts: 1 });
    assert_eq!(channel.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_dispatches_are_independent() {
    let failing = ScriptedChannel::always(Err(transient()));
    let dispatcher = dispatcher(failing.clone(), 2, Duration::from_secs(1));

    let handles: Vec<_> = (0..5)
        .map(|i| dispatcher.dispatch_async(registration(&format!("parent{i}@example.com"))))
        .collect();

    for handle in handles {
        assert_eq!(
            handle.await.unwrap(),
            DispatchOutcome::RetriesExhausted { attempts: 2 }
        );
    }
    assert_eq!(failing.call_count(), 10);
}
