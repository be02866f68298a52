//! Success envelope
//!
//! Every successful response is `{status: "success", message?, data?}`.
//! `data` is left out entirely when the payload is null or a blank string.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug)]
pub struct ApiResponse {
    status_code: StatusCode,
    message: Option<String>,
    data: Option<Value>,
}

/// Wire form of [`ApiResponse`]
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SuccessBody {
    /// Always "success"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn non_empty(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(ref s) if s.trim().is_empty() => None,
        other => Some(other),
    }
}

impl ApiResponse {
    /// 200 with data
    pub fn ok<T: Serialize>(data: T) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    /// 201 with data
    pub fn created<T: Serialize>(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, data)
    }

    /// 200 with only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::OK,
            message: Some(message.into()),
            data: None,
        }
    }

    fn with_status<T: Serialize>(status_code: StatusCode, data: T) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(value) => non_empty(value),
            Err(e) => {
                tracing::error!("Failed to serialize response: {}", e);
                return Self {
                    status_code: StatusCode::INTERNAL_SERVER_ERROR,
                    message: None,
                    data: None,
                };
            }
        };

        Self {
            status_code,
            message: None,
            data,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn body(self) -> (StatusCode, SuccessBody) {
        (
            self.status_code,
            SuccessBody {
                status: "success".to_string(),
                message: self.message,
                data: self.data,
            },
        )
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            return crate::error::AppError::Internal("response serialization failed".to_string())
                .into_response();
        }
        let (status, body) = self.body();
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_json(response: ApiResponse) -> (StatusCode, Value) {
        let (status, body) = response.body();
        (status, serde_json::to_value(body).unwrap())
    }

    #[test]
    fn test_ok_wraps_data() {
        let (status, body) = to_json(ApiResponse::ok(json!({"user_id": "x"})));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "success", "data": {"user_id": "x"}}));
    }

    #[test]
    fn test_created_status() {
        let (status, _) = to_json(ApiResponse::created(vec![1, 2]));
        assert_eq!(status, StatusCode::CREATED);
    }

    #[test]
    fn test_empty_data_is_omitted() {
        let (_, body) = to_json(ApiResponse::ok(()));
        assert!(body.get("data").is_none());

        let (_, body) = to_json(ApiResponse::ok(Option::<String>::None));
        assert!(body.get("data").is_none());

        let (_, body) = to_json(ApiResponse::ok("   "));
        assert!(body.get("data").is_none());
    }

    #[test]
    fn test_empty_collections_are_kept() {
        let (_, body) = to_json(ApiResponse::ok(Vec::<u8>::new()));
        assert_eq!(body["data"], json!([]));
    }

    #[test]
    fn test_message_only() {
        let (_, body) = to_json(ApiResponse::message("Logged out"));
        assert_eq!(body, json!({"status": "success", "message": "Logged out"}));
    }

    #[test]
    fn test_message_with_data() {
        let (_, body) = to_json(ApiResponse::ok(json!({"a": 1})).with_message("done"));
        assert_eq!(body["message"], "done");
        assert_eq!(body["data"]["a"], 1);
    }
}
