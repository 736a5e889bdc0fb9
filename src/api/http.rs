//! reqwest-backed herd backend client

use crate::api::types::*;
use crate::api::HerdApi;
use crate::error::{AppError, FetchError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Paths the unassigned-device collection has been published under
const UNASSIGNED_PATHS: [&str; 2] = ["/unassigned", "/unassigned-devices"];

/// HTTP implementation of [`HerdApi`]
pub struct HttpHerdApi {
    client: Client,
    base_url: String,
    /// Path that last answered for unassigned devices
    unassigned_path: RwLock<String>,
}

impl HttpHerdApi {
    pub fn new(base_url: &str, unassigned_path: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Self::with_client(client, base_url, unassigned_path)
    }

    pub fn with_client(client: Client, base_url: &str, unassigned_path: &str) -> Result<Self> {
        url::Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("Invalid API base URL '{}': {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            unassigned_path: RwLock::new(normalize_path(unassigned_path)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, FetchError> {
        let response = self.client.get(self.url(path)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::invalid_response(e.to_string()))
    }

    async fn post_json<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<(), FetchError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[async_trait]
impl HerdApi for HttpHerdApi {
    async fn fetch_horses(&self) -> std::result::Result<Vec<HorseRecord>, FetchError> {
        let envelope: HorsesEnvelope = self.get_json("/horses").await?;
        Ok(envelope.into_records())
    }

    async fn fetch_unassigned_devices(&self) -> std::result::Result<Vec<DeviceRecord>, FetchError> {
        let preferred = self.unassigned_path.read().clone();

        match self.get_json::<DevicesEnvelope>(&preferred).await {
            Ok(envelope) => Ok(envelope.into_records()),
            Err(FetchError::Http { status }) if status == StatusCode::NOT_FOUND.as_u16() => {
                let Some(alternate) = UNASSIGNED_PATHS.iter().find(|p| **p != preferred) else {
                    return Err(FetchError::Http { status });
                };

                tracing::debug!("{} returned 404, trying {}", preferred, alternate);
                let envelope: DevicesEnvelope = self.get_json(alternate).await?;
                tracing::info!("Unassigned devices are served from {}", alternate);
                *self.unassigned_path.write() = alternate.to_string();
                Ok(envelope.into_records())
            }
            Err(e) => Err(e),
        }
    }

    async fn assign_horse(&self, request: &AssignHorseRequest) -> std::result::Result<(), FetchError> {
        self.post_json("/assign-horse", request).await
    }

    async fn report_location(&self, report: LocationReport) -> std::result::Result<(), FetchError> {
        self.post_json("/location", &report).await
    }
}
