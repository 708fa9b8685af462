//! The `{code, data, error}` response envelope.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::codes;
use crate::RpcError;

/// One rejected request field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub param: String,
    pub msg: String,
}

impl FieldError {
    pub fn new(param: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            msg: msg.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<FieldError>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: codes::SUCCESS,
            data: Some(data),
            error: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let code = self.code();
        let message = self.to_string();
        let validation = match self {
            RpcError::InvalidParameters(fields) => fields,
            _ => Vec::new(),
        };
        ApiResponse::<()> {
            code,
            data: None,
            error: Some(ErrorBody {
                message,
                validation,
            }),
        }
        .into_response()
    }
}
