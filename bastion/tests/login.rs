use std::sync::Arc;
use std::time::Duration as StdDuration;

use bastion::{
    Bastion, BastionBuilder, Clock, Event, FailureReason, IpAddress, LoginError, LoginRequest,
    PasswordVerifier, Severity, SqliteRepositoryProvider, UnlockReason,
    config::{BackoffConfig, LockoutConfig, RateLimitConfig},
};
use bastion_core::{ManualClock, RecordingDelay, RecordingEventHandler};
use chrono::{DateTime, Duration};

/// Stores passwords as `plain:<password>` so tests skip Argon2.
struct PlainVerifier;

impl PasswordVerifier for PlainVerifier {
    fn verify(&self, password: &str, hash: &str) -> Result<bool, bastion_core::Error> {
        Ok(hash == format!("plain:{password}"))
    }

    fn hash(&self, password: &str) -> Result<String, bastion_core::Error> {
        Ok(format!("plain:{password}"))
    }

    fn dummy_hash(&self) -> &str {
        "plain:"
    }
}

struct Harness {
    bastion: Bastion<SqliteRepositoryProvider>,
    clock: Arc<ManualClock>,
    delay: Arc<RecordingDelay>,
    events: Arc<RecordingEventHandler>,
}

async fn setup_with(
    configure: impl FnOnce(
        BastionBuilder<bastion::builder::NoStorage>,
    ) -> BastionBuilder<bastion::builder::NoStorage>,
) -> Harness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    // Whole seconds, matching the resolution storage keeps.
    let clock = Arc::new(ManualClock::new(
        DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
    ));
    let delay = Arc::new(RecordingDelay::new());
    let events = Arc::new(RecordingEventHandler::new());

    let builder = configure(
        BastionBuilder::new()
            .with_identifier_salt("integration-test-salt")
            .with_clock(clock.clone())
            .with_delay(delay.clone())
            .with_password_verifier(Arc::new(PlainVerifier)),
    );
    let bastion = builder
        .with_sqlite_pool(pool)
        .apply_migrations(true)
        .build()
        .await
        .unwrap();
    bastion.event_bus().register(events.clone()).await;

    Harness {
        bastion,
        clock,
        delay,
        events,
    }
}

async fn setup() -> Harness {
    setup_with(|builder| builder).await
}

fn ip(value: &str) -> IpAddress {
    IpAddress::create(value).unwrap()
}

fn request(identifier: &str, password: &str, from: &str) -> LoginRequest {
    LoginRequest::new(identifier, password, ip(from))
}

#[tokio::test]
async fn test_successful_login() {
    let h = setup().await;
    let user = h
        .bastion
        .create_user("carol", "carol@example.test", "correct-horse")
        .await
        .unwrap();

    let by_username = h
        .bastion
        .login(request("carol", "correct-horse", "10.0.0.1").with_device_id(Some("dev-1".into())))
        .await
        .unwrap();
    let by_email = h
        .bastion
        .login(request("carol@example.test", "correct-horse", "10.0.0.1"))
        .await
        .unwrap();

    assert_eq!(by_username.user_id, user.id);
    assert_eq!(by_username.username, "carol");
    assert_eq!(by_email.user_id, user.id);

    let attempts = h
        .bastion
        .recent_attempts_by_identifier("carol", 10)
        .await
        .unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].success);
    assert_eq!(attempts[0].user_id, Some(user.id.clone()));
    assert_eq!(attempts[0].device_id.as_deref(), Some("dev-1"));

    assert!(matches!(
        h.events.events().await.first(),
        Some(Event::LoginSucceeded { user_id, .. }) if *user_id == user.id
    ));
}

#[tokio::test]
async fn test_unknown_and_wrong_password_are_indistinguishable() {
    let h = setup().await;
    h.bastion
        .create_user("carol", "carol@example.test", "correct-horse")
        .await
        .unwrap();

    let unknown = h
        .bastion
        .login(request("bob", "some-password", "10.0.0.1"))
        .await
        .unwrap_err();
    let wrong = h
        .bastion
        .login(request("carol", "wrong-password", "10.0.0.2"))
        .await
        .unwrap_err();

    assert_eq!(unknown, LoginError::InvalidCredentials);
    assert_eq!(unknown, wrong);
    assert_eq!(unknown.to_string(), wrong.to_string());
    assert_eq!(unknown.code(), "INVALID_CREDENTIALS");

    for (identifier, known) in [("bob", false), ("carol", true)] {
        let attempts = h
            .bastion
            .recent_attempts_by_identifier(identifier, 10)
            .await
            .unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(
            attempts[0].failure_reason,
            Some(FailureReason::InvalidCredentials)
        );
        assert_eq!(attempts[0].user_id.is_some(), known);
        assert_ne!(attempts[0].identifier_hash, identifier);
    }
}

#[tokio::test]
async fn test_fifth_failure_locks_and_emits_event() {
    let h = setup().await;
    h.bastion
        .create_user("carol", "carol@example.test", "correct-horse")
        .await
        .unwrap();

    for _ in 0..4 {
        let result = h
            .bastion
            .login(request("carol", "wrong-password", "10.0.0.1"))
            .await;
        assert_eq!(result, Err(LoginError::InvalidCredentials));
    }

    let fifth = h
        .bastion
        .login(request("carol", "wrong-password", "10.0.0.1"))
        .await;
    assert_eq!(fifth, Err(LoginError::AccountLocked { lock_duration: 900 }));
    assert!(h.bastion.is_locked("carol").await.unwrap());

    let carol_hash = h.bastion.hash_identifier("carol");
    let locked: Vec<_> = h
        .events
        .events()
        .await
        .into_iter()
        .filter_map(|event| match event {
            Event::AccountLocked {
                identifier_hash,
                failure_count,
                ..
            } => Some((identifier_hash, failure_count)),
            _ => None,
        })
        .collect();
    assert_eq!(locked, vec![(carol_hash, 5)]);

    let failed = h
        .events
        .events()
        .await
        .into_iter()
        .filter(|event| matches!(event, Event::LoginFailed { .. }))
        .count();
    assert_eq!(failed, 5);
}

#[tokio::test]
async fn test_locked_account_refuses_correct_password() {
    let h = setup().await;
    h.bastion
        .create_user("alice", "alice@example.test", "correct-horse")
        .await
        .unwrap();
    for _ in 0..5 {
        let _ = h
            .bastion
            .login(request("alice@example.test", "wrong-password", "10.0.0.1"))
            .await;
    }
    let lock = h
        .bastion
        .active_lock("alice@example.test")
        .await
        .unwrap()
        .expect("alice should be locked");

    h.clock.advance(Duration::minutes(5));
    let result = h
        .bastion
        .login(request("alice@example.test", "correct-horse", "10.0.0.2"))
        .await;

    assert_eq!(result, Err(LoginError::AccountLocked { lock_duration: 600 }));
    let still = h
        .bastion
        .active_lock("alice@example.test")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still.id, lock.id);

    let latest = h
        .bastion
        .recent_attempts_by_ip(&ip("10.0.0.2"), 1)
        .await
        .unwrap();
    assert_eq!(
        latest[0].failure_reason,
        Some(FailureReason::AccountLocked)
    );
}

#[tokio::test]
async fn test_lock_taken_by_email_blocks_username_login() {
    let h = setup().await;
    h.bastion
        .create_user("alice", "alice@example.test", "correct-horse")
        .await
        .unwrap();
    for _ in 0..5 {
        let _ = h
            .bastion
            .login(request("alice@example.test", "wrong-password", "10.0.0.1"))
            .await;
    }

    let result = h
        .bastion
        .login(request("alice", "correct-horse", "10.0.0.2"))
        .await;

    assert!(!h.bastion.is_locked("alice").await.unwrap());
    assert_eq!(result, Err(LoginError::AccountLocked { lock_duration: 900 }));
}

#[tokio::test]
async fn test_lock_expires_and_login_succeeds() {
    let h = setup_with(|b| b.with_rate_limit(RateLimitConfig::disabled())).await;
    h.bastion
        .create_user("carol", "carol@example.test", "correct-horse")
        .await
        .unwrap();
    for _ in 0..5 {
        let _ = h
            .bastion
            .login(request("carol", "wrong-password", "10.0.0.1"))
            .await;
    }

    h.clock.advance(Duration::minutes(15));

    let result = h
        .bastion
        .login(request("carol", "correct-horse", "10.0.0.1"))
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_sixth_request_is_rate_limited() {
    let h = setup().await;

    for _ in 0..5 {
        let result = h
            .bastion
            .login(request("mallory", "some-password", "10.0.0.9"))
            .await;
        assert_ne!(result.as_ref().err().map(LoginError::code), Some("RATE_LIMITED"));
    }

    h.clock.advance(Duration::minutes(1));
    let sixth = h
        .bastion
        .login(request("mallory", "some-password", "10.0.0.9"))
        .await;
    assert_eq!(sixth, Err(LoginError::RateLimited { retry_after: 840 }));

    let other_ip = h
        .bastion
        .login(request("mallory", "some-password", "10.0.0.10"))
        .await;
    assert_ne!(other_ip, Err(LoginError::RateLimited { retry_after: 840 }));

    assert!(h.events.events().await.iter().any(|event| matches!(
        event,
        Event::RateLimitExceeded { retry_after: 840, .. }
    )));

    h.clock.advance(Duration::minutes(14));
    let after_window = h
        .bastion
        .login(request("nobody", "some-password", "10.0.0.9"))
        .await;
    assert_eq!(after_window, Err(LoginError::InvalidCredentials));
}

#[tokio::test]
async fn test_reset_ip_clears_rate_limit_and_backoff() {
    let h = setup().await;
    for n in 0..5 {
        let _ = h
            .bastion
            .login(request(&format!("mallory{n}"), "some-password", "10.0.0.5"))
            .await;
    }
    assert!(matches!(
        h.bastion
            .login(request("mallory5", "some-password", "10.0.0.5"))
            .await,
        Err(LoginError::RateLimited { .. })
    ));
    let delays_before = h.delay.recorded().len();

    h.bastion.reset_ip(&ip("10.0.0.5")).await.unwrap();

    let outcome = h
        .bastion
        .login(request("trudy", "some-password", "10.0.0.5"))
        .await;
    assert!(matches!(outcome, Err(LoginError::InvalidCredentials)));
    assert_eq!(h.delay.recorded().len(), delays_before);
}

#[tokio::test]
async fn test_rate_limited_requests_are_not_ledgered() {
    let h = setup().await;
    for _ in 0..8 {
        let _ = h
            .bastion
            .login(request("mallory", "some-password", "10.0.0.9"))
            .await;
    }

    let attempts = h
        .bastion
        .recent_attempts_by_ip(&ip("10.0.0.9"), 100)
        .await
        .unwrap();
    assert!(attempts.len() <= 5);
}

#[tokio::test]
async fn test_backoff_sequence_and_reset() {
    let h = setup_with(|b| {
        b.with_rate_limit(RateLimitConfig::disabled())
            .with_lockout(LockoutConfig::disabled())
    })
    .await;
    h.bastion
        .create_user("carol", "carol@example.test", "correct-horse")
        .await
        .unwrap();

    for _ in 0..5 {
        let _ = h
            .bastion
            .login(request("carol", "wrong-password", "10.0.0.1"))
            .await;
    }
    h.bastion
        .login(request("carol", "correct-horse", "10.0.0.1"))
        .await
        .unwrap();
    let _ = h
        .bastion
        .login(request("carol", "wrong-password", "10.0.0.1"))
        .await;

    let ms = |n| StdDuration::from_millis(n);
    assert_eq!(
        h.delay.recorded(),
        vec![ms(500), ms(1000), ms(2000), ms(2000), ms(2000)]
    );
}

#[tokio::test]
async fn test_backoff_disabled_never_sleeps() {
    let h = setup_with(|b| b.with_backoff(BackoffConfig::disabled())).await;
    for _ in 0..4 {
        let _ = h
            .bastion
            .login(request("mallory", "some-password", "10.0.0.9"))
            .await;
    }
    assert!(h.delay.recorded().is_empty());
}

#[tokio::test]
async fn test_spray_across_identifiers_is_reported() {
    let h = setup_with(|b| b.with_rate_limit(RateLimitConfig::disabled())).await;

    for n in 0..10 {
        let _ = h
            .bastion
            .login(request(&format!("user{n}"), "some-password", "10.0.0.66"))
            .await;
    }

    let detections: Vec<_> = h
        .events
        .events()
        .await
        .into_iter()
        .filter_map(|event| match event {
            Event::BruteForceDetected {
                attempt_count,
                distinct_identifiers,
                severity,
                ..
            } => Some((attempt_count, distinct_identifiers, severity)),
            _ => None,
        })
        .collect();
    assert_eq!(detections, vec![(10, 10, Severity::Low)]);
}

#[tokio::test]
async fn test_validation_error_skips_every_stage_after_backoff() {
    let h = setup().await;

    let result = h.bastion.login(request("carol", "short", "10.0.0.1")).await;

    assert_eq!(result.unwrap_err().code(), "INVALID_REQUEST");
    assert!(
        h.bastion
            .recent_attempts_by_ip(&ip("10.0.0.1"), 10)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(h.events.events().await.is_empty());
}

#[tokio::test]
async fn test_unlock_user_and_identifier() {
    let h = setup().await;
    let user = h
        .bastion
        .create_user("carol", "carol@example.test", "correct-horse")
        .await
        .unwrap();
    for _ in 0..5 {
        let _ = h
            .bastion
            .login(request("carol", "wrong-password", "10.0.0.1"))
            .await;
    }
    assert!(h.bastion.is_locked("carol").await.unwrap());

    assert_eq!(
        h.bastion
            .unlock_user(&user.id, UnlockReason::AdminAction)
            .await
            .unwrap(),
        1
    );
    assert!(!h.bastion.is_locked("carol").await.unwrap());
    assert_eq!(
        h.bastion
            .unlock_identifier("carol", UnlockReason::AdminAction)
            .await
            .unwrap(),
        0
    );
    assert!(h.events.events().await.iter().any(|event| matches!(
        event,
        Event::AccountUnlocked {
            reason: UnlockReason::AdminAction,
            released: 1,
            ..
        }
    )));
}

#[tokio::test]
async fn test_unlock_identifier_without_user() {
    let h = setup().await;
    for _ in 0..5 {
        let _ = h
            .bastion
            .login(request("ghost", "some-password", "10.0.0.1"))
            .await;
    }
    let lock = h.bastion.active_lock("ghost").await.unwrap().unwrap();
    assert_eq!(lock.user_id, None);
    assert_eq!(lock.locked_by_ip.as_deref(), Some("10.0.0.1"));
    assert_eq!(lock.locked_until, h.clock.now() + Duration::minutes(15));

    let released = h
        .bastion
        .unlock_identifier("ghost", UnlockReason::AdminAction)
        .await
        .unwrap();
    assert_eq!(released, 1);
    assert!(!h.bastion.is_locked("ghost").await.unwrap());
}
