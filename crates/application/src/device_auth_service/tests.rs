use chrono::TimeDelta;
use oasreg_core::AppError;
use oasreg_domain::FamilyLevel;

use super::{DeviceAuthOutcome, DeviceAuthService};
use crate::SecurityEventType;
use crate::test_support::Harness;

/// Stamped 20 seconds before the harness start time, in UTC+09:00.
const FRESH_PAYLOAD: &str = r#"{"site":"SEOUL01","dong":"101","ho":"1203","id":"01","deviceId":"OAS-7F3A9C","time":"2025.10.09.17.53"}"#;

fn service(harness: &Harness) -> DeviceAuthService {
    DeviceAuthService::new(
        harness.users.clone(),
        harness.locks.clone(),
        harness.decryptor.clone(),
        harness.registry.clone(),
        harness.clock.clone(),
        harness.security_events(),
        harness.settings,
    )
}

fn verified_user(harness: &Harness) -> oasreg_domain::UserId {
    let user = harness.users.insert("resident@example.com", FamilyLevel::Master);
    harness.users.update(user.id, |record| record.email_verified = true);
    harness.decryptor.register("cipher-ok", FRESH_PAYLOAD);
    user.id
}

#[tokio::test]
async fn registered_controller_is_accepted() {
    let harness = Harness::new();
    let service = service(&harness);
    let user_id = verified_user(&harness);

    let outcome = service.authenticate(user_id, "cipher-ok").await;
    let Ok(DeviceAuthOutcome::Accepted(payload)) = outcome else {
        panic!("expected accepted payload, got {outcome:?}");
    };
    assert_eq!(payload.dev_id(), "SEOUL01101120301");
}

#[tokio::test]
async fn four_undecryptable_payloads_suspend_before_decryption() {
    let harness = Harness::new();
    let service = service(&harness);
    let user_id = verified_user(&harness);

    for remaining_attempts in [3, 2, 1] {
        let outcome = service.authenticate(user_id, "garbage").await;
        assert_eq!(
            outcome.ok(),
            Some(DeviceAuthOutcome::InvalidPayload { remaining_attempts })
        );
    }

    let fourth = service.authenticate(user_id, "garbage").await;
    assert_eq!(
        fourth.ok(),
        Some(DeviceAuthOutcome::Suspended {
            remaining_seconds: 900
        })
    );
    assert_eq!(harness.decryptor.calls(), 4);

    let blocked = service.authenticate(user_id, "cipher-ok").await;
    assert!(matches!(blocked, Ok(DeviceAuthOutcome::Suspended { .. })));
    assert_eq!(harness.decryptor.calls(), 4);

    let events = harness.events.event_types();
    assert_eq!(
        events
            .iter()
            .filter(|event| **event == SecurityEventType::QrDecryptFailed)
            .count(),
        4
    );
    assert!(events.contains(&SecurityEventType::AccountSuspended));
}

#[tokio::test]
async fn successful_decrypt_resets_counter() {
    let harness = Harness::new();
    let service = service(&harness);
    let user_id = verified_user(&harness);

    assert!(service.authenticate(user_id, "garbage").await.is_ok());
    assert_eq!(harness.locks.get(user_id).fail_count, 1);

    assert!(service.authenticate(user_id, "cipher-ok").await.is_ok());
    assert_eq!(harness.locks.get(user_id).fail_count, 0);
}

#[tokio::test]
async fn stale_qr_code_is_rejected() {
    let harness = Harness::new();
    let service = service(&harness);
    let user_id = verified_user(&harness);
    harness.clock.advance(TimeDelta::seconds(40));

    let outcome = service.authenticate(user_id, "cipher-ok").await;
    assert_eq!(outcome.ok(), Some(DeviceAuthOutcome::QrExpired));
}

#[tokio::test]
async fn unverified_email_and_unknown_controller_are_rejected() {
    let harness = Harness::new();
    let service = service(&harness);
    let user_id = verified_user(&harness);

    harness.registry.set_registered(false);
    assert_eq!(
        service.authenticate(user_id, "cipher-ok").await.ok(),
        Some(DeviceAuthOutcome::NotRegistered)
    );

    harness.users.update(user_id, |record| record.email_verified = false);
    assert_eq!(
        service.authenticate(user_id, "cipher-ok").await.ok(),
        Some(DeviceAuthOutcome::EmailNotVerified)
    );
}

#[tokio::test]
async fn empty_payload_is_invalid_input() {
    let harness = Harness::new();
    let service = service(&harness);
    let user_id = verified_user(&harness);

    assert!(matches!(
        service.authenticate(user_id, "  ").await,
        Err(AppError::Validation(_))
    ));
    assert_eq!(harness.locks.get(user_id).fail_count, 0);
}
