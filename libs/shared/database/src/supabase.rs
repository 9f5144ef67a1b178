use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// PostgREST request failure.
///
/// Callers need to distinguish three situations: the store rejected the
/// request (status), the network did (transport), and the response did not
/// parse (decode). Conflict detection in particular relies on seeing the
/// raw 409 from a unique-constraint violation.
#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("supabase returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl SupabaseError {
    /// True when the store refused a write because it would violate a
    /// unique constraint (PostgREST surfaces Postgres 23505 as HTTP 409).
    pub fn is_conflict(&self) -> bool {
        match self {
            SupabaseError::Status { status, body } => {
                *status == StatusCode::CONFLICT || body.contains("23505")
            }
            _ => false,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, SupabaseError::Transport(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SupabaseError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None)
            .await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseError::Status {
                status,
                body: error_text,
            });
        }

        // DELETE without a Prefer header returns an empty body.
        let text = response.text().await?;
        if text.is_empty() {
            return serde_json::from_str("null")
                .or_else(|_| serde_json::from_str("[]"))
                .map_err(|e| SupabaseError::Decode(e.to_string()));
        }

        serde_json::from_str(&text).map_err(|e| SupabaseError::Decode(e.to_string()))
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
