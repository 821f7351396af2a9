//! Remote controller registry reached over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use oasreg_application::DeviceRegistry;
use oasreg_core::{AppError, AppResult};
use reqwest::header;
use serde::{Deserialize, Serialize};

/// Request timeout used when none is configured.
pub const DEFAULT_DEVICE_REGISTRY_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for the remote registry endpoint.
#[derive(Debug, Clone)]
pub struct HttpDeviceRegistryConfig {
    /// Comparison endpoint URL.
    pub endpoint: String,
    /// Bearer key for the remote backend.
    pub api_key: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct DeviceCheckRequest<'a> {
    dev_id: &'a str,
    #[serde(rename = "deviceId")]
    device_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct DeviceCheckResponse {
    status: Option<bool>,
}

/// HTTP implementation of the device registry port.
#[derive(Clone)]
pub struct HttpDeviceRegistry {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpDeviceRegistry {
    /// Creates a registry client. Fails when the key is blank.
    pub fn new(config: HttpDeviceRegistryConfig) -> AppResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::Validation(
                "device registry api key must not be empty".to_owned(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint,
            api_key: config.api_key,
        })
    }
}

#[async_trait]
impl DeviceRegistry for HttpDeviceRegistry {
    async fn is_registered(&self, dev_id: &str, device_id: &str) -> AppResult<bool> {
        let response = self
            .http_client
            .post(self.endpoint.as_str())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&DeviceCheckRequest { dev_id, device_id })
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to call device registry: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::Unavailable(format!(
                "device registry returned status {}: {body}",
                status.as_u16()
            )));
        }

        let body = response.json::<DeviceCheckResponse>().await.map_err(|error| {
            AppError::Unavailable(format!("failed to parse device registry response: {error}"))
        })?;

        // Only an explicit `false` means unknown.
        Ok(body.status != Some(false))
    }
}

#[cfg(test)]
mod tests;
