//! Delivery of challenge fragments by SMS.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::SmsConfig;
use crate::NodeError;

const GATEWAY_SUCCESS: u32 = 200;
const DELIVERED: &str = "1";

#[derive(Debug, Serialize)]
struct SmsMessage<'a> {
    receiver: &'a str,
    msg: String,
}

#[derive(Debug, Deserialize)]
struct GatewayReply {
    code: u32,
    #[serde(default)]
    data: Option<GatewayData>,
}

#[derive(Debug, Deserialize)]
struct GatewayData {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// An SMS gateway reached over HTTP.
pub struct LiveSms {
    endpoint: String,
    access_key: String,
    http: reqwest::Client,
}

/// How challenge fragments reach the user's phone.
pub enum SmsSender {
    Live(LiveSms),
    /// Modes without SMS: the challenge is recorded but never delivered.
    NoOp,
}

impl SmsSender {
    pub fn live(config: &SmsConfig, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self::Live(LiveSms {
            endpoint: config.endpoint.clone(),
            access_key: config.access_key.clone(),
            http,
        })
    }

    /// Send `code` to `phone` on behalf of the validator at `index`.
    ///
    /// Returns whether the gateway accepted the message. Failures are
    /// logged here; callers carry on regardless.
    pub async fn send(&self, index: u32, total: usize, code: &str, phone: &str) -> bool {
        match self {
            Self::NoOp => true,
            Self::Live(live) => match live.deliver(index, code, phone).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(validator_index = index, total, error = %e, "SMS not sent");
                    false
                }
            },
        }
    }
}

impl LiveSms {
    async fn deliver(&self, index: u32, code: &str, phone: &str) -> Result<(), NodeError> {
        if self.endpoint.is_empty() {
            return Err(NodeError::Sms("the endpoint for SMS is not set up".into()));
        }
        if self.access_key.is_empty() {
            return Err(NodeError::Sms("the access key for SMS is not set up".into()));
        }

        let message = SmsMessage {
            receiver: phone,
            msg: format!("#{}\nCode: {code}", index + 1),
        };
        let reply: GatewayReply = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::AUTHORIZATION, &self.access_key)
            .json(&message)
            .send()
            .await
            .map_err(|e| NodeError::Sms(e.to_string()))?
            .json()
            .await
            .map_err(|e| NodeError::Sms(format!("invalid gateway reply: {e}")))?;

        if reply.code != GATEWAY_SUCCESS {
            return Err(NodeError::Sms(format!("gateway answered {}", reply.code)));
        }
        match reply.data {
            Some(data) if data.code == DELIVERED => {
                tracing::info!(validator_index = index, message = %data.message, "SMS delivered");
            }
            Some(data) => {
                tracing::warn!(
                    validator_index = index,
                    code = %data.code,
                    message = %data.message,
                    "SMS accepted but not delivered"
                );
            }
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(String, Value)>>>;

    async fn gateway(reply_code: u32) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let sink = Arc::clone(&captured);
        let app = Router::new().route(
            "/sms",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let sink = Arc::clone(&sink);
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    sink.lock().unwrap().push((auth, body));
                    Json(json!({"code": reply_code, "data": {"code": "1", "message": "ok"}}))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}/sms"), captured)
    }

    fn live(endpoint: &str, key: &str) -> SmsSender {
        SmsSender::live(
            &SmsConfig {
                endpoint: endpoint.into(),
                access_key: key.into(),
            },
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn sends_numbered_fragment() {
        let (endpoint, captured) = gateway(200).await;
        let sender = live(&endpoint, "secret");

        assert!(sender.send(1, 3, "42", "+82 10-1234-1000").await);

        let captured = captured.lock().unwrap();
        let (auth, body) = &captured[0];
        assert_eq!(auth, "secret");
        assert_eq!(body["receiver"], "+82 10-1234-1000");
        assert_eq!(body["msg"], "#2\nCode: 42");
    }

    #[tokio::test]
    async fn gateway_rejection_is_a_failure() {
        let (endpoint, _) = gateway(500).await;
        assert!(!live(&endpoint, "secret").send(0, 1, "07", "+1 202-555-0100").await);
    }

    #[tokio::test]
    async fn missing_settings_fail_without_network() {
        assert!(!live("", "secret").send(0, 1, "07", "+1").await);
        assert!(!live("http://127.0.0.1:9/sms", "").send(0, 1, "07", "+1").await);
    }

    #[tokio::test]
    async fn noop_always_succeeds() {
        assert!(SmsSender::NoOp.send(0, 1, "00", "+1").await);
    }
}
