//! Route handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use phonelink_types::{NodeInfo, PeerInfo};
use serde::Serialize;

use crate::params::{BroadcastBody, RequestBody, SubmitBody};
use crate::{ApiResponse, FieldError, RpcError, ValidatorApi};

pub type ApiState = Arc<dyn ValidatorApi>;

type ApiResult<T> = Result<ApiResponse<T>, RpcError>;

/// Content type of the Prometheus text format.
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdData {
    pub request_id: String,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, RpcError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        RpcError::InvalidParameters(vec![FieldError::new("body", rejection.body_text())])
    })
}

fn logged<T>(route: &'static str, result: ApiResult<T>) -> ApiResult<T> {
    if let Err(e) = &result {
        tracing::warn!(route, code = e.code(), error = %e, "request refused");
    }
    result
}

pub async fn health() -> Json<&'static str> {
    Json("OK")
}

pub async fn info(State(api): State<ApiState>) -> ApiResponse<NodeInfo> {
    ApiResponse::ok(api.node_info())
}

pub async fn peers(State(api): State<ApiState>) -> ApiResponse<Vec<PeerInfo>> {
    ApiResponse::ok(api.peers())
}

pub async fn metrics(State(api): State<ApiState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], api.metrics())
}

pub async fn request(
    State(api): State<ApiState>,
    payload: Result<Json<RequestBody>, JsonRejection>,
) -> ApiResult<RequestIdData> {
    let result = async {
        let checked = body(payload)?.check()?;
        let id = api
            .request(checked.phone, checked.address, checked.signature)
            .await?;
        Ok::<_, RpcError>(ApiResponse::ok(RequestIdData {
            request_id: id.to_string(),
        }))
    }
    .await;
    logged("/request", result)
}

pub async fn broadcast(
    State(api): State<ApiState>,
    payload: Result<Json<BroadcastBody>, JsonRejection>,
) -> ApiResult<RequestIdData> {
    let result = async {
        let tx = body(payload)?.check()?;
        let id = api.broadcast(tx).await?;
        Ok::<_, RpcError>(ApiResponse::ok(RequestIdData {
            request_id: id.to_string(),
        }))
    }
    .await;
    logged("/broadcast", result)
}

pub async fn submit(
    State(api): State<ApiState>,
    payload: Result<Json<SubmitBody>, JsonRejection>,
) -> ApiResult<&'static str> {
    let result = async {
        let checked = body(payload)?.check_submit()?;
        api.submit(checked.request_id, checked.code).await?;
        Ok::<_, RpcError>(ApiResponse::ok("OK"))
    }
    .await;
    logged("/submit", result)
}

pub async fn broadcast_submit(
    State(api): State<ApiState>,
    payload: Result<Json<SubmitBody>, JsonRejection>,
) -> ApiResult<&'static str> {
    let result = async {
        let data = body(payload)?.check_relayed()?;
        api.broadcast_submit(data).await?;
        Ok::<_, RpcError>(ApiResponse::ok("OK"))
    }
    .await;
    logged("/broadcastSubmit", result)
}
