//! HTTP client for another validator's API.

use std::time::Duration;

use phonelink_types::NodeInfo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::NetworkError;

/// Success code of the response envelope.
const CODE_SUCCESS: u32 = 200;

/// The `{code, data, error}` envelope every validator answers with.
#[derive(Debug, Deserialize)]
struct Reply<T> {
    code: u32,
    data: Option<T>,
    error: Option<ReplyError>,
}

#[derive(Debug, Deserialize)]
struct ReplyError {
    message: String,
}

impl<T> Reply<T> {
    fn into_data(self) -> Result<Option<T>, NetworkError> {
        if self.code == CODE_SUCCESS {
            return Ok(self.data);
        }
        Err(NetworkError::Rejected {
            code: self.code,
            message: self.error.map(|e| e.message).unwrap_or_default(),
        })
    }
}

#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

fn url(endpoint: &str, path: &str) -> Result<String, NetworkError> {
    if endpoint.is_empty() {
        return Err(NetworkError::NoEndpoint);
    }
    Ok(format!("{}/{path}", endpoint.trim_end_matches('/')))
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { http }
    }

    async fn read<T: DeserializeOwned>(
        endpoint: &str,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<Option<T>, NetworkError> {
        let transport = |e: reqwest::Error| NetworkError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        };
        let response = response.map_err(transport)?;
        if !response.status().is_success() {
            return Err(NetworkError::Transport {
                endpoint: endpoint.to_string(),
                reason: format!("HTTP status {}", response.status()),
            });
        }
        let reply: Reply<T> = response
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))?;
        reply.into_data()
    }

    /// `GET /info` on the peer.
    pub async fn info(&self, endpoint: &str) -> Result<NodeInfo, NetworkError> {
        let response = self.http.get(url(endpoint, "info")?).send().await;
        Self::read::<NodeInfo>(endpoint, response)
            .await?
            .ok_or_else(|| NetworkError::InvalidResponse("info reply without data".into()))
    }

    /// POST `body` to `path` on the peer; succeeds when the envelope reports success.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        path: &str,
        body: &B,
    ) -> Result<(), NetworkError> {
        let response = self.http.post(url(endpoint, path)?).json(body).send().await;
        Self::read::<serde_json::Value>(endpoint, response)
            .await
            .map(drop)
    }
}
