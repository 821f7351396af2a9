use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use oasreg_core::{AppError, AppResult};
use oasreg_domain::{
    AccountLockState, ApprovalRequest, ApprovalRequestId, ApprovalStatus, CooldownRecord,
    EmailAddress, FamilyLevel, RequestType, UserId, VerificationPurpose, VerificationState,
};

use crate::{
    AccountLockRepository, ApprovalRepository, Clock, CodeIssuer, CooldownRepository,
    DeviceRegistry, EmailService, GuardSettings, NewUser, PasswordHasher, QrPayloadDecryptor,
    RandomSource, Revisioned, SecurityEvent, SecurityEventRepository, SecurityEventService,
    UserRecord, UserRepository, VerificationStateRepository,
};

fn guard<T>(mutex: &Mutex<T>) -> AppResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|error| AppError::Internal(format!("failed to lock test state: {error}")))
}

pub(crate) fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_000_000, 0).unwrap_or_default()
}

pub(crate) fn email(value: &str) -> EmailAddress {
    EmailAddress::new(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(crate) fn advance(&self, delta: TimeDelta) {
        if let Ok(mut now) = self.now.lock() {
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_default()
    }
}

/// Yields bytes 1, 2, 3, ... so every issued code is `123456`.
pub(crate) struct CountingRandom;

impl RandomSource for CountingRandom {
    fn fill_bytes(&self, buffer: &mut [u8]) -> AppResult<()> {
        for (index, byte) in buffer.iter_mut().enumerate() {
            *byte = u8::try_from(index % 9 + 1).unwrap_or(1);
        }
        Ok(())
    }
}

pub(crate) const ISSUED_CODE: &str = "123456";

#[derive(Default)]
pub(crate) struct FakeVerificationStates {
    rows: Mutex<HashMap<(UserId, VerificationPurpose), Revisioned<VerificationState>>>,
}

impl FakeVerificationStates {
    pub(crate) fn get(&self, user_id: UserId, purpose: VerificationPurpose) -> VerificationState {
        guard(&self.rows)
            .ok()
            .and_then(|rows| rows.get(&(user_id, purpose)).map(|row| row.value.clone()))
            .unwrap_or_default()
    }

    pub(crate) fn put(&self, user_id: UserId, purpose: VerificationPurpose, state: VerificationState) {
        if let Ok(mut rows) = guard(&self.rows) {
            let revision = rows
                .get(&(user_id, purpose))
                .map_or(1, |row| row.revision + 1);
            rows.insert((user_id, purpose), Revisioned::new(state, revision));
        }
    }
}

#[async_trait]
impl VerificationStateRepository for FakeVerificationStates {
    async fn load(
        &self,
        user_id: UserId,
        purpose: VerificationPurpose,
    ) -> AppResult<Revisioned<VerificationState>> {
        Ok(guard(&self.rows)?
            .get(&(user_id, purpose))
            .cloned()
            .unwrap_or_else(Revisioned::absent))
    }

    async fn store(
        &self,
        user_id: UserId,
        purpose: VerificationPurpose,
        state: &VerificationState,
        expected_revision: i64,
    ) -> AppResult<i64> {
        let mut rows = guard(&self.rows)?;
        let current = rows.get(&(user_id, purpose)).map_or(0, |row| row.revision);
        if current != expected_revision {
            return Err(AppError::Conflict("stale verification state".to_owned()));
        }
        rows.insert(
            (user_id, purpose),
            Revisioned::new(state.clone(), current + 1),
        );
        Ok(current + 1)
    }
}

#[derive(Default)]
pub(crate) struct FakeAccountLocks {
    rows: Mutex<HashMap<UserId, Revisioned<AccountLockState>>>,
}

impl FakeAccountLocks {
    pub(crate) fn get(&self, user_id: UserId) -> AccountLockState {
        guard(&self.rows)
            .ok()
            .and_then(|rows| rows.get(&user_id).map(|row| row.value.clone()))
            .unwrap_or_default()
    }

    pub(crate) fn put(&self, user_id: UserId, state: AccountLockState) {
        if let Ok(mut rows) = guard(&self.rows) {
            let revision = rows.get(&user_id).map_or(1, |row| row.revision + 1);
            rows.insert(user_id, Revisioned::new(state, revision));
        }
    }
}

#[async_trait]
impl AccountLockRepository for FakeAccountLocks {
    async fn load(&self, user_id: UserId) -> AppResult<Revisioned<AccountLockState>> {
        Ok(guard(&self.rows)?
            .get(&user_id)
            .cloned()
            .unwrap_or_else(Revisioned::absent))
    }

    async fn store(
        &self,
        user_id: UserId,
        state: &AccountLockState,
        expected_revision: i64,
    ) -> AppResult<i64> {
        let mut rows = guard(&self.rows)?;
        let current = rows.get(&user_id).map_or(0, |row| row.revision);
        if current != expected_revision {
            return Err(AppError::Conflict("stale account lock".to_owned()));
        }
        rows.insert(user_id, Revisioned::new(state.clone(), current + 1));
        Ok(current + 1)
    }
}

#[derive(Default)]
pub(crate) struct FakeCooldowns {
    rows: Mutex<HashMap<(UserId, RequestType), CooldownRecord>>,
}

impl FakeCooldowns {
    pub(crate) fn len(&self) -> usize {
        guard(&self.rows).map(|rows| rows.len()).unwrap_or_default()
    }
}

#[async_trait]
impl CooldownRepository for FakeCooldowns {
    async fn find(
        &self,
        user_id: UserId,
        request_type: RequestType,
    ) -> AppResult<Option<CooldownRecord>> {
        Ok(guard(&self.rows)?.get(&(user_id, request_type)).copied())
    }

    async fn upsert(
        &self,
        user_id: UserId,
        request_type: RequestType,
        record: CooldownRecord,
    ) -> AppResult<()> {
        guard(&self.rows)?.insert((user_id, request_type), record);
        Ok(())
    }

    async fn remove(
        &self,
        user_id: UserId,
        request_type: RequestType,
        record: CooldownRecord,
    ) -> AppResult<bool> {
        let mut rows = guard(&self.rows)?;
        if rows.get(&(user_id, request_type)) == Some(&record) {
            rows.remove(&(user_id, request_type));
            return Ok(true);
        }
        Ok(false)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut rows = guard(&self.rows)?;
        let before = rows.len();
        rows.retain(|_, record| record.deleted_at > cutoff);
        Ok(u64::try_from(before - rows.len()).unwrap_or_default())
    }
}

#[derive(Default)]
pub(crate) struct FakeUsers {
    rows: Mutex<HashMap<UserId, UserRecord>>,
    unavailable: Mutex<bool>,
}

impl FakeUsers {
    pub(crate) fn insert(&self, address: &str, family_level: FamilyLevel) -> UserRecord {
        let record = UserRecord {
            id: UserId::new(),
            email: email(address),
            nick_name: "resident".to_owned(),
            password_hash: "hashed:correct-horse-42".to_owned(),
            email_verified: false,
            pending_email: None,
            family_level,
        };
        if let Ok(mut rows) = guard(&self.rows) {
            rows.insert(record.id, record.clone());
        }
        record
    }

    pub(crate) fn update(&self, user_id: UserId, change: impl FnOnce(&mut UserRecord)) {
        if let Ok(mut rows) = guard(&self.rows)
            && let Some(record) = rows.get_mut(&user_id)
        {
            change(record);
        }
    }

    pub(crate) fn get(&self, user_id: UserId) -> Option<UserRecord> {
        guard(&self.rows)
            .ok()
            .and_then(|rows| rows.get(&user_id).cloned())
    }

    /// Makes verification writes fail with `AppError::Unavailable`.
    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut value) = guard(&self.unavailable) {
            *value = unavailable;
        }
    }

    fn check_available(&self) -> AppResult<()> {
        if *guard(&self.unavailable)? {
            return Err(AppError::Unavailable("user store unreachable".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for FakeUsers {
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        Ok(guard(&self.rows)?.get(&user_id).cloned())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> AppResult<Option<UserRecord>> {
        Ok(guard(&self.rows)?
            .values()
            .find(|record| &record.email == email)
            .cloned())
    }

    async fn find_by_pending_email(&self, email: &EmailAddress) -> AppResult<Option<UserRecord>> {
        Ok(guard(&self.rows)?
            .values()
            .find(|record| record.pending_email.as_ref() == Some(email))
            .cloned())
    }

    async fn create(&self, user: &NewUser) -> AppResult<()> {
        let mut rows = guard(&self.rows)?;
        if rows.values().any(|record| record.email == user.email) {
            return Err(AppError::Conflict("email already registered".to_owned()));
        }
        rows.insert(
            user.id,
            UserRecord {
                id: user.id,
                email: user.email.clone(),
                nick_name: user.nick_name.clone(),
                password_hash: user.password_hash.clone(),
                email_verified: false,
                pending_email: None,
                family_level: FamilyLevel::None,
            },
        );
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: UserId) -> AppResult<()> {
        self.check_available()?;
        let mut rows = guard(&self.rows)?;
        let record = rows
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;
        record.email_verified = true;
        Ok(())
    }

    async fn set_pending_email(
        &self,
        user_id: UserId,
        pending_email: Option<&EmailAddress>,
    ) -> AppResult<()> {
        let mut rows = guard(&self.rows)?;
        let record = rows
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;
        record.pending_email = pending_email.cloned();
        Ok(())
    }

    async fn commit_email_change(
        &self,
        user_id: UserId,
        new_email: &EmailAddress,
    ) -> AppResult<()> {
        self.check_available()?;
        let mut rows = guard(&self.rows)?;
        if rows
            .values()
            .any(|record| record.id != user_id && &record.email == new_email)
        {
            return Err(AppError::Conflict("email already registered".to_owned()));
        }
        let record = rows
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("user not found".to_owned()))?;
        record.email = new_email.clone();
        record.pending_email = None;
        record.email_verified = true;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeApprovals {
    rows: Mutex<Vec<ApprovalRequest>>,
}

#[async_trait]
impl ApprovalRepository for FakeApprovals {
    async fn insert(&self, request: &ApprovalRequest) -> AppResult<()> {
        guard(&self.rows)?.push(request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ApprovalRequestId) -> AppResult<Option<ApprovalRequest>> {
        Ok(guard(&self.rows)?
            .iter()
            .find(|request| request.id == id)
            .cloned())
    }

    async fn find_pending(
        &self,
        requestee: UserId,
        request_type: RequestType,
    ) -> AppResult<Option<ApprovalRequest>> {
        Ok(guard(&self.rows)?
            .iter()
            .find(|request| {
                request.requestee == requestee
                    && request.request_type == request_type
                    && request.status == ApprovalStatus::Pending
            })
            .cloned())
    }

    async fn list_pending_for_approver(
        &self,
        approver: UserId,
    ) -> AppResult<Vec<ApprovalRequest>> {
        Ok(guard(&self.rows)?
            .iter()
            .filter(|request| {
                request.approver == approver && request.status == ApprovalStatus::Pending
            })
            .cloned()
            .collect())
    }

    async fn delete(&self, id: ApprovalRequestId) -> AppResult<bool> {
        let mut rows = guard(&self.rows)?;
        let before = rows.len();
        rows.retain(|request| request.id != id);
        Ok(rows.len() != before)
    }

    async fn save_resolution(&self, request: &ApprovalRequest) -> AppResult<()> {
        let mut rows = guard(&self.rows)?;
        let stored = rows
            .iter_mut()
            .find(|stored| stored.id == request.id && stored.status == ApprovalStatus::Pending)
            .ok_or_else(|| AppError::Conflict("request is no longer pending".to_owned()))?;
        *stored = request.clone();
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingEmail {
    sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<bool>,
}

impl RecordingEmail {
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        guard(&self.sent).map(|sent| sent.clone()).unwrap_or_default()
    }

    pub(crate) fn fail_sends(&self) {
        if let Ok(mut failing) = guard(&self.failing) {
            *failing = true;
        }
    }
}

#[async_trait]
impl EmailService for RecordingEmail {
    async fn send_email(
        &self,
        to: &str,
        _subject: &str,
        text_body: &str,
        _html_body: Option<&str>,
    ) -> AppResult<()> {
        if *guard(&self.failing)? {
            return Err(AppError::Unavailable("mail relay unreachable".to_owned()));
        }
        guard(&self.sent)?.push((to.to_owned(), text_body.to_owned()));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct CountingHasher {
    verifications: Mutex<usize>,
}

impl CountingHasher {
    pub(crate) fn verifications(&self) -> usize {
        guard(&self.verifications)
            .map(|count| *count)
            .unwrap_or_default()
    }
}

impl PasswordHasher for CountingHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(format!("hashed:{password}"))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        *guard(&self.verifications)? += 1;
        Ok(hash == format!("hashed:{password}"))
    }
}

#[derive(Default)]
pub(crate) struct FakeDecryptor {
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<usize>,
}

impl FakeDecryptor {
    pub(crate) fn register(&self, encrypted: &str, plaintext: &str) {
        if let Ok(mut payloads) = guard(&self.payloads) {
            payloads.insert(encrypted.to_owned(), plaintext.as_bytes().to_vec());
        }
    }

    pub(crate) fn calls(&self) -> usize {
        guard(&self.calls).map(|calls| *calls).unwrap_or_default()
    }
}

impl QrPayloadDecryptor for FakeDecryptor {
    fn decrypt(&self, _user_id: UserId, encrypted: &str) -> AppResult<Option<Vec<u8>>> {
        *guard(&self.calls)? += 1;
        Ok(guard(&self.payloads)?.get(encrypted).cloned())
    }
}

pub(crate) struct FakeRegistry {
    registered: Mutex<bool>,
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self {
            registered: Mutex::new(true),
        }
    }
}

impl FakeRegistry {
    pub(crate) fn set_registered(&self, registered: bool) {
        if let Ok(mut value) = guard(&self.registered) {
            *value = registered;
        }
    }
}

#[async_trait]
impl DeviceRegistry for FakeRegistry {
    async fn is_registered(&self, _dev_id: &str, _device_id: &str) -> AppResult<bool> {
        Ok(*guard(&self.registered)?)
    }
}

#[derive(Default)]
pub(crate) struct RecordingSecurityEvents {
    events: Mutex<Vec<SecurityEvent>>,
}

impl RecordingSecurityEvents {
    pub(crate) fn event_types(&self) -> Vec<crate::SecurityEventType> {
        guard(&self.events)
            .map(|events| events.iter().map(|event| event.event_type).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SecurityEventRepository for RecordingSecurityEvents {
    async fn append_event(&self, event: SecurityEvent) -> AppResult<()> {
        guard(&self.events)?.push(event);
        Ok(())
    }
}

/// Every fake wired together at a fixed starting time.
pub(crate) struct Harness {
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) states: Arc<FakeVerificationStates>,
    pub(crate) locks: Arc<FakeAccountLocks>,
    pub(crate) cooldowns: Arc<FakeCooldowns>,
    pub(crate) users: Arc<FakeUsers>,
    pub(crate) approvals: Arc<FakeApprovals>,
    pub(crate) email: Arc<RecordingEmail>,
    pub(crate) hasher: Arc<CountingHasher>,
    pub(crate) decryptor: Arc<FakeDecryptor>,
    pub(crate) registry: Arc<FakeRegistry>,
    pub(crate) events: Arc<RecordingSecurityEvents>,
    pub(crate) settings: GuardSettings,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::new(base_time())),
            states: Arc::default(),
            locks: Arc::default(),
            cooldowns: Arc::default(),
            users: Arc::default(),
            approvals: Arc::default(),
            email: Arc::default(),
            hasher: Arc::default(),
            decryptor: Arc::default(),
            registry: Arc::default(),
            events: Arc::default(),
            settings: GuardSettings::default(),
        }
    }

    pub(crate) fn code_issuer(&self) -> CodeIssuer {
        CodeIssuer::new(Arc::new(CountingRandom))
    }

    pub(crate) fn security_events(&self) -> SecurityEventService {
        SecurityEventService::new(self.events.clone())
    }
}
