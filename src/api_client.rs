//! api_client.rs
//!
//! Тонкая обёртка над `reqwest` для REST API консоли: bearer-токен,
//! базовый URL, таймаут транспорта и разбор кодов ответа в `ApiError`.
//! Доменные клиенты (`RestBookingGateway`, `RestMemberDirectory`) строятся
//! поверх неё и сами решают, как ошибки превращаются в пользовательские.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::ApiConfig;
use crate::gateway::BookingError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(_) | ApiError::Decode(_) => None,
        }
    }
}

impl From<ApiError> for BookingError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, message } => match status {
                401 => BookingError::Unauthorized,
                404 => BookingError::NotFound,
                // 419: так старый бэкенд отвечал на занятые места
                409 | 419 => BookingError::Conflict(message),
                400..=499 => BookingError::Validation(message),
                _ => BookingError::Server(message),
            },
            ApiError::Transport(e) => BookingError::Network(e.to_string()),
            ApiError::Decode(message) => BookingError::Server(message),
        }
    }
}

// Тело ошибки от сервера, если он его прислал
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: String,
    http_client: reqwest::Client,
}

impl ApiClient {
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let request = self.request(Method::GET, path).query(query);
        self.execute_json(request).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.request(Method::POST, path).json(body);
        self.execute_json(request).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.request(Method::PATCH, path).json(body);
        self.execute_json(request).await
    }

    /// DELETE; тело ответа (если есть) игнорируется.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, path);
        self.execute(request).await.map(|_| ())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("{} {}", method, url);
        self.http_client.request(method, url).bearer_auth(&self.token)
    }

    async fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to decode API response: {:?}", e);
            ApiError::Decode(e.to_string())
        })
    }

    /// Отправляет запрос и превращает неуспешный статус в `ApiError::Status`.
    async fn execute(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await.map_err(|e| {
            error!("API request failed: {:?}", e);
            ApiError::Transport(e)
        })?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = Self::error_message(status, &body);
        if status == StatusCode::UNAUTHORIZED {
            warn!("API rejected bearer token (401)");
        } else if status.is_server_error() {
            error!("API server error {}: {}", status, message);
        } else {
            debug!("API client error {}: {}", status, message);
        }

        Err(ApiError::Status { status: status.as_u16(), message })
    }

    fn error_message(status: StatusCode, body: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body.trim().to_string()
                }
            })
    }
}
