//! Success response body.
//!
//! Every successful JSON response carries `"status": "success"` next to its
//! payload fields:
//! ```json
//! { "status": "success", "account_id": "main", "contacts": [] }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Success<T: Serialize> {
    status: &'static str,
    #[serde(flatten)]
    data: T,
    #[serde(skip)]
    code: StatusCode,
}

impl<T: Serialize> Success<T> {
    /// 200 with `data` flattened next to `status`. `data` must serialize as a map.
    pub fn ok(data: T) -> Self {
        Self {
            status: "success",
            data,
            code: StatusCode::OK,
        }
    }

    /// 201 Created.
    pub fn created(data: T) -> Self {
        Self {
            code: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_is_flattened_with_payload() {
        let body = serde_json::to_value(Success::ok(json!({"account_id": "main"}))).unwrap();
        assert_eq!(body, json!({"status": "success", "account_id": "main"}));
    }

    #[test]
    fn created_sets_status_code() {
        let response = Success::created(json!({})).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
