//! Household controller QR payloads.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, TimeZone, Utc};
use oasreg_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Minutes a QR payload stays usable after its stamped time.
pub const QR_CODE_TTL_MINUTES: i64 = 1;

/// Time format stamped into QR payloads by the controller.
pub const QR_TIME_FORMAT: &str = "%Y.%m.%d.%H.%M";

const SITE_MAX_LENGTH: usize = 10;
const DONG_MAX_LENGTH: usize = 4;
const HO_MAX_LENGTH: usize = 4;
const CONTROLLER_ID_MAX_LENGTH: usize = 2;
const DEVICE_ID_MAX_LENGTH: usize = 20;

#[derive(Debug, Deserialize)]
struct RawQrPayload {
    site: String,
    dong: String,
    ho: String,
    id: String,
    #[serde(rename = "deviceId")]
    device_id: String,
    time: String,
}

/// Decrypted controller registration payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrPayload {
    /// Installation site code.
    pub site: String,
    /// Apartment building number.
    pub dong: String,
    /// Apartment unit number.
    pub ho: String,
    /// Controller number within the unit.
    pub controller_id: String,
    /// Hardware device identifier.
    pub device_id: String,
    /// Time the controller rendered the QR code.
    pub issued_at: DateTime<Utc>,
}

impl QrPayload {
    /// Parses decrypted JSON. The stamped time is local to `offset`.
    pub fn parse(json: &[u8], offset: FixedOffset) -> AppResult<Self> {
        let raw: RawQrPayload = serde_json::from_slice(json)
            .map_err(|error| AppError::Validation(format!("invalid QR payload: {error}")))?;

        let naive = NaiveDateTime::parse_from_str(raw.time.trim(), QR_TIME_FORMAT)
            .map_err(|error| AppError::Validation(format!("invalid QR time '{}': {error}", raw.time)))?;
        let issued_at = offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| AppError::Validation(format!("ambiguous QR time '{}'", raw.time)))?
            .with_timezone(&Utc);

        Ok(Self {
            site: bounded("site", raw.site, SITE_MAX_LENGTH)?,
            dong: bounded("dong", raw.dong, DONG_MAX_LENGTH)?,
            ho: bounded("ho", raw.ho, HO_MAX_LENGTH)?,
            controller_id: bounded("id", raw.id, CONTROLLER_ID_MAX_LENGTH)?,
            device_id: bounded("deviceId", raw.device_id, DEVICE_ID_MAX_LENGTH)?,
            issued_at,
        })
    }

    /// Identifier the registry knows the controller by.
    #[must_use]
    pub fn dev_id(&self) -> String {
        format!("{}{}{}{}", self.site, self.dong, self.ho, self.controller_id)
    }

    /// A payload is expired from `issued_at + ttl` onwards.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now >= self.issued_at + ttl
    }
}

/// Default QR payload time-to-live.
#[must_use]
pub fn qr_code_ttl() -> TimeDelta {
    TimeDelta::minutes(QR_CODE_TTL_MINUTES)
}

fn bounded(field: &str, value: String, max_length: usize) -> AppResult<String> {
    let value = value.trim().to_owned();
    if value.is_empty() {
        return Err(AppError::Validation(format!(
            "QR field '{field}' must not be empty"
        )));
    }

    if value.chars().count() > max_length {
        return Err(AppError::Validation(format!(
            "QR field '{field}' must not exceed {max_length} characters"
        )));
    }

    Ok(value)
}
