use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use shared_config::AppConfig;

/// Remote invocation failure.
#[derive(Debug, Error)]
pub enum FunctionsError {
    /// The function ran and rejected the request. Business rejections are
    /// never retried through the fallback channel.
    #[error("function rejected the request ({status}): {body}")]
    Rejected { status: StatusCode, body: String },

    /// Neither the gateway nor the fallback host could be reached.
    #[error("function unreachable on all channels: {0}")]
    Unreachable(String),

    #[error("unexpected function response: {0}")]
    Decode(String),
}

impl FunctionsError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, FunctionsError::Rejected { status, .. } if *status == StatusCode::CONFLICT)
    }
}

/// Gateway for named remote operations (edge functions).
///
/// The primary channel is the functions gateway behind the project URL;
/// when it fails at the transport level the call is retried exactly once
/// against the dedicated functions host with the same bearer token.
pub struct FunctionsClient {
    client: Client,
    primary_base: String,
    fallback_base: String,
    anon_key: String,
}

impl FunctionsClient {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_bases(
            format!("{}/functions/v1", config.supabase_url),
            config.supabase_functions_url.clone(),
            config.supabase_anon_key.clone(),
        )
    }

    pub fn with_bases(primary_base: String, fallback_base: String, anon_key: String) -> Self {
        Self {
            client: Client::new(),
            primary_base,
            fallback_base,
            anon_key,
        }
    }

    pub async fn invoke<T>(
        &self,
        name: &str,
        body: Value,
        auth_token: &str,
    ) -> Result<T, FunctionsError>
    where
        T: DeserializeOwned,
    {
        let primary_url = format!("{}/{}", self.primary_base, name);

        match self.post(&primary_url, &body, auth_token).await {
            Ok(response) => self.decode(response).await,
            Err(primary_err) => {
                warn!(
                    "Function {} unreachable on primary channel ({}), trying fallback",
                    name, primary_err
                );

                let fallback_url = format!("{}/{}", self.fallback_base, name);
                match self.post(&fallback_url, &body, auth_token).await {
                    Ok(response) => self.decode(response).await,
                    Err(fallback_err) => Err(FunctionsError::Unreachable(format!(
                        "primary: {}; fallback: {}",
                        primary_err, fallback_err
                    ))),
                }
            }
        }
    }

    async fn post(
        &self,
        url: &str,
        body: &Value,
        auth_token: &str,
    ) -> Result<reqwest::Response, reqwest::Error> {
        debug!("Invoking remote function at {}", url);

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", auth_token)) {
            headers.insert(AUTHORIZATION, value);
        }

        self.client.post(url).headers(headers).json(body).send().await
    }

    async fn decode<T>(&self, response: reqwest::Response) -> Result<T, FunctionsError>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FunctionsError::Decode(e.to_string()))?;

        if !status.is_success() {
            return Err(FunctionsError::Rejected { status, body: text });
        }

        serde_json::from_str(&text).map_err(|e| FunctionsError::Decode(e.to_string()))
    }
}
