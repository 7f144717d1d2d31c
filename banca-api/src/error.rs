use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use banca_core::CoreError;
use banca_lottery::LotteryError;
use serde_json::{json, Map, Value};
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Lottery(#[from] LotteryError),

    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

fn body(code: &str, message: impl Into<String>) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("code".to_string(), Value::String(code.to_string()));
    map.insert("message".to_string(), Value::String(message.into()));
    map
}

fn core_response(err: CoreError) -> (StatusCode, Map<String, Value>) {
    match err {
        CoreError::Validation(errors) => {
            let mut map = body("validation-failed", "One or more fields are invalid");
            map.insert("errors".to_string(), json!(errors));
            (StatusCode::BAD_REQUEST, map)
        }
        CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, body("not-found", err.to_string())),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, body("conflict", msg)),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, body("unauthorized", msg)),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, body("forbidden", msg)),
        CoreError::Rule {
            code,
            message,
            details,
        } => {
            let mut map = body(&code, message);
            if let Value::Object(details) = details {
                map.extend(details);
            }
            (StatusCode::UNPROCESSABLE_ENTITY, map)
        }
        other => {
            tracing::error!("Request failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                body("internal-error", "An unexpected error occurred"),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, map) = match self {
            ApiError::Core(err) | ApiError::Lottery(LotteryError::Core(err)) => core_response(err),
            ApiError::Lottery(LotteryError::Play(err)) => {
                (StatusCode::BAD_REQUEST, body("play/invalid", err.to_string()))
            }
            ApiError::Lottery(LotteryError::BetsRejected {
                code,
                message,
                lines,
            }) => {
                let mut map = body(code, message);
                map.insert("lines".to_string(), json!(lines));
                (StatusCode::BAD_REQUEST, map)
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, body("bad-request", msg)),
            ApiError::RateLimited { retry_after_secs } => {
                let mut map = body("rate-limited", "Too many requests, slow down");
                map.insert("retryAfter".to_string(), json!(retry_after_secs));
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(Value::Object(map))).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                return response;
            }
            ApiError::Io(err) => {
                tracing::error!("Request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    body("internal-error", "An unexpected error occurred"),
                )
            }
        };

        (status, Json(Value::Object(map))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banca_lottery::PlayError;
    use http_body_util::BodyExt;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let (status, body) = render(CoreError::invalid("name", "is required").into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "name");

        let (status, _) = render(CoreError::not_found("Zone", 3).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = render(CoreError::forbidden("no").into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = render(LotteryError::Play(PlayError::Empty).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "play/invalid");
    }

    #[tokio::test]
    async fn test_rule_details_are_merged() {
        let err = CoreError::rule_with(
            "CANCELLATION_TIME_EXPIRED",
            "Too late",
            json!({ "maxMinutes": 5 }),
        );
        let (status, body) = render(LotteryError::Core(err).into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "CANCELLATION_TIME_EXPIRED");
        assert_eq!(body["maxMinutes"], 5);
    }

    #[tokio::test]
    async fn test_internal_errors_are_hidden() {
        let (status, body) = render(CoreError::internal("disk on fire").into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An unexpected error occurred");
    }
}
