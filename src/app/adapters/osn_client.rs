//! HTTP client for the opensense sensor API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::sensor_api::{ApiError, ApiResult, SensorApi};
use crate::app::models::{CatalogEntry, RemoteSensorSpec, ValueBatch};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedSensor {
    id: u64,
}

/// Sensor API over HTTP
pub struct OsnClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl OsnClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| Error::configuration(format!("Invalid API url '{}': {}", base_url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::configuration(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authorized(&self, request: RequestBuilder) -> ApiResult<RequestBuilder> {
        let token = self.token.read().await.clone().ok_or_else(|| {
            ApiError::Permission("not logged in".to_string())
        })?;
        Ok(request.header(AUTHORIZATION, token))
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<reqwest::Response> {
        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ApiError::Other(format!("unexpected response body: {}", e)))
    }
}

fn classify_transport(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout(error.to_string())
    } else {
        ApiError::Other(error.to_string())
    }
}

/// Map a non-success HTTP status onto the API failure classes
pub fn classify_status(status: StatusCode, body: String) -> ApiError {
    let message = format!("{}: {}", status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::INTERNAL_SERVER_ERROR => ApiError::Permission(message),
        StatusCode::REQUEST_TIMEOUT => ApiError::Timeout(message),
        _ => ApiError::Other(message),
    }
}

#[async_trait]
impl SensorApi for OsnClient {
    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> ApiResult<String> {
        let body = serde_json::json!({ "username": username, "password": password });
        let response: LoginResponse = self
            .send_json(self.client.post(self.url("/users/login")).json(&body))
            .await?;
        *self.token.write().await = Some(response.id.clone());
        debug!("Logged in as {}", username);
        Ok(response.id)
    }

    async fn add_sensor(&self, spec: &RemoteSensorSpec) -> ApiResult<u64> {
        let request = self
            .authorized(self.client.post(self.url("/sensors/addSensor")).json(spec))
            .await?;
        let created: CreatedSensor = self.send_json(request).await?;
        Ok(created.id)
    }

    async fn get_measurands(&self, name: &str) -> ApiResult<Vec<CatalogEntry>> {
        self.send_json(self.client.get(self.url("/measurands")).query(&[("name", name)]))
            .await
    }

    async fn get_units(&self, name: &str, measurand_id: u64) -> ApiResult<Vec<CatalogEntry>> {
        let measurand_id = measurand_id.to_string();
        self.send_json(
            self.client
                .get(self.url("/units"))
                .query(&[("name", name), ("measurandId", measurand_id.as_str())]),
        )
        .await
    }

    async fn get_licenses(&self, short_name: &str) -> ApiResult<Vec<CatalogEntry>> {
        self.send_json(
            self.client
                .get(self.url("/licenses"))
                .query(&[("shortName", short_name)]),
        )
        .await
    }

    #[instrument(skip(self, batch), fields(values = batch.len()))]
    async fn add_multiple_values(&self, batch: &ValueBatch) -> ApiResult<String> {
        let request = self
            .authorized(
                self.client
                    .post(self.url("/sensors/addMultipleValues"))
                    .json(batch),
            )
            .await?;
        let text = self
            .send(request)
            .await?
            .text()
            .await
            .map_err(classify_transport)?;
        // The status comes back either bare or as a JSON string
        Ok(text.trim().trim_matches('"').to_string())
    }
}
