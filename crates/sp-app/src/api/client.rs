use std::time::Duration;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sp_core::{Job, PaymentAck, PaymentInfo, SplitRequest, SplitResponse};
use crate::api::{AudioKind, Endpoints, StatusChannel, StemApi};
use crate::config::AppConfig;
use crate::error::{AppError, Result};

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// HTTP client for the splitter backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    endpoints: Endpoints,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoints: Endpoints::new(&config.api_base_url),
            request_timeout: config.request_timeout,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn read_json<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
        let response = Self::check(response, fallback).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Turns a non-success response into [`AppError::Request`].
    async fn check(response: Response, fallback: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        let message = error_detail(&body).unwrap_or_else(|| fallback.to_string());
        debug!("Backend answered {}: {}", status, message);

        Err(AppError::Request {
            status: status.as_u16(),
            message,
        })
    }
}

/// Pulls the `detail` message out of an error body.
fn error_detail(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    match parsed.detail? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl StemApi for ApiClient {
    async fn start_split(&self, request: &SplitRequest) -> Result<SplitResponse> {
        let response = self
            .http
            .post(self.endpoints.split())
            .json(request)
            .send()
            .await?;

        Self::read_json(response, "Failed to start split").await
    }

    async fn get_status(&self, job_id: &str) -> Result<Job> {
        let response = self.http.get(self.endpoints.job(job_id)).send().await?;
        Self::read_json(response, "Failed to get job status").await
    }

    async fn get_payment_info(&self, job_id: &str) -> Result<PaymentInfo> {
        let response = self.http.get(self.endpoints.payment(job_id)).send().await?;
        Self::read_json(response, "Failed to get payment info").await
    }

    async fn complete_payment(&self, job_id: &str) -> Result<PaymentAck> {
        let response = self
            .http
            .post(self.endpoints.complete_payment(job_id))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        Self::read_json(response, "Failed to complete payment").await
    }

    async fn open_status_channel(&self, job_id: &str) -> Result<StatusChannel> {
        StatusChannel::connect(&self.endpoints.status_channel(job_id), self.request_timeout).await
    }

    async fn fetch_audio(&self, kind: AudioKind, job_id: &str, filename: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(self.endpoints.audio(kind, job_id, filename))
            .send()
            .await?;

        let response = Self::check(response, "Failed to download file").await?;
        Ok(response.bytes().await?.to_vec())
    }
}
