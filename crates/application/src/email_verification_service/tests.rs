use chrono::TimeDelta;
use oasreg_core::AppError;
use oasreg_domain::{FamilyLevel, VerificationPurpose, VerificationState};

use super::EmailVerificationService;
use crate::GuardOutcome;
use crate::SecurityEventType;
use crate::test_support::{Harness, ISSUED_CODE, base_time};

fn service(harness: &Harness) -> EmailVerificationService {
    EmailVerificationService::new(
        harness.users.clone(),
        harness.states.clone(),
        harness.email.clone(),
        harness.clock.clone(),
        harness.code_issuer(),
        harness.security_events(),
        harness.settings,
    )
}

#[tokio::test]
async fn fourth_send_warns_and_fifth_is_denied() {
    let harness = Harness::new();
    let service = service(&harness);
    let user = harness.users.insert("resident@example.com", FamilyLevel::None);

    for _ in 0..3 {
        let outcome = service.send_code(user.id).await;
        assert_eq!(outcome.ok(), Some(GuardOutcome::Ok));
        harness.clock.advance(TimeDelta::seconds(10));
    }

    let fourth = service.send_code(user.id).await;
    assert!(matches!(fourth, Ok(GuardOutcome::WillLockNow { .. })));
    assert_eq!(harness.email.sent().len(), 4);

    harness.clock.advance(TimeDelta::seconds(90));
    let fifth = service.send_code(user.id).await;
    assert_eq!(
        fifth.ok(),
        Some(GuardOutcome::DeniedLocked {
            remaining_seconds: 210
        })
    );
    assert_eq!(harness.email.sent().len(), 4);
    assert_eq!(
        harness.events.event_types(),
        vec![SecurityEventType::VerificationLocked]
    );
}

#[tokio::test]
async fn send_stores_code_before_delivery() {
    let harness = Harness::new();
    let service = service(&harness);
    let user = harness.users.insert("resident@example.com", FamilyLevel::None);
    harness.email.fail_sends();

    let result = service.send_code(user.id).await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));

    let state = harness.states.get(user.id, VerificationPurpose::EmailAuth);
    assert_eq!(state.attempt_count, 1);
    assert_eq!(state.code.as_deref(), Some(ISSUED_CODE));
    assert_eq!(state.code_issued_at, Some(base_time()));
}

#[tokio::test]
async fn ghost_lock_is_repaired_and_logged() {
    let harness = Harness::new();
    let service = service(&harness);
    let user = harness.users.insert("resident@example.com", FamilyLevel::None);
    harness.states.put(
        user.id,
        VerificationPurpose::EmailAuth,
        VerificationState {
            attempt_count: 2,
            locked: true,
            locked_at: None,
            ..VerificationState::default()
        },
    );

    let outcome = service.send_code(user.id).await;
    assert_eq!(outcome.ok(), Some(GuardOutcome::Ok));

    let state = harness.states.get(user.id, VerificationPurpose::EmailAuth);
    assert_eq!(state.attempt_count, 1);
    assert!(state.is_consistent());
    assert_eq!(
        harness.events.event_types(),
        vec![SecurityEventType::StateInconsistent]
    );
}

#[tokio::test]
async fn verified_user_cannot_request_code() {
    let harness = Harness::new();
    let service = service(&harness);
    let user = harness.users.insert("resident@example.com", FamilyLevel::None);
    harness.users.update(user.id, |record| record.email_verified = true);

    assert!(matches!(
        service.send_code(user.id).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn confirm_accepts_code_once_then_reports_no_active_code() {
    let harness = Harness::new();
    let service = service(&harness);
    let user = harness.users.insert("resident@example.com", FamilyLevel::None);

    assert!(service.send_code(user.id).await.is_ok());
    harness.clock.advance(TimeDelta::minutes(2));

    let first = service.confirm_code(user.id, ISSUED_CODE).await;
    assert_eq!(first.ok(), Some(GuardOutcome::Ok));
    assert!(
        harness
            .users
            .get(user.id)
            .is_some_and(|record| record.email_verified)
    );
    assert_eq!(
        harness.states.get(user.id, VerificationPurpose::EmailAuth),
        VerificationState::default()
    );

    let second = service.confirm_code(user.id, ISSUED_CODE).await;
    assert_eq!(second.ok(), Some(GuardOutcome::NoActiveCode));
}

#[tokio::test]
async fn confirm_reports_expiry_and_mismatch_without_counting() {
    let harness = Harness::new();
    let service = service(&harness);
    let user = harness.users.insert("resident@example.com", FamilyLevel::None);
    assert!(service.send_code(user.id).await.is_ok());

    let mismatch = service.confirm_code(user.id, "000000").await;
    assert_eq!(
        mismatch.ok(),
        Some(GuardOutcome::Mismatch {
            remaining_attempts: None
        })
    );
    assert_eq!(
        harness
            .states
            .get(user.id, VerificationPurpose::EmailAuth)
            .attempt_count,
        1
    );

    harness.clock.advance(TimeDelta::minutes(6));
    let expired = service.confirm_code(user.id, ISSUED_CODE).await;
    assert_eq!(expired.ok(), Some(GuardOutcome::Expired));
}

#[tokio::test]
async fn failed_verification_write_keeps_code_active() {
    let harness = Harness::new();
    let service = service(&harness);
    let user = harness.users.insert("resident@example.com", FamilyLevel::None);
    assert!(service.send_code(user.id).await.is_ok());
    harness.users.set_unavailable(true);

    let outcome = service.confirm_code(user.id, ISSUED_CODE).await;
    assert!(matches!(outcome, Err(AppError::Unavailable(_))));
    let state = harness.states.get(user.id, VerificationPurpose::EmailAuth);
    assert_eq!(state.code.as_deref(), Some(ISSUED_CODE));

    harness.users.set_unavailable(false);
    let retry = service.confirm_code(user.id, ISSUED_CODE).await;
    assert_eq!(retry.ok(), Some(GuardOutcome::Ok));
}
