use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Success envelope: `{"message": "...", ...data}`.
#[derive(Debug, Serialize)]
pub struct ApiMessage<T> {
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

/// Marker for envelopes that carry only a message.
#[derive(Debug, Serialize)]
pub struct Empty {}

impl<T: Serialize> ApiMessage<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }

    /// Same envelope answered with `201 Created`.
    pub fn created(self) -> Response {
        (StatusCode::CREATED, Json(self)).into_response()
    }
}

impl ApiMessage<Empty> {
    pub fn only(message: impl Into<String>) -> Self {
        Self::new(message, Empty {})
    }
}

impl<T: Serialize> IntoResponse for ApiMessage<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct StatsBody<T> {
    pub stats: T,
}

/// Error envelope: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Payload {
        count: u32,
    }

    #[test]
    fn test_message_envelope_is_flat() {
        let body = serde_json::to_value(ApiMessage::new("OK", Payload { count: 3 })).unwrap();
        assert_eq!(body, serde_json::json!({"message": "OK", "count": 3}));

        let only = serde_json::to_value(ApiMessage::only("Done")).unwrap();
        assert_eq!(only, serde_json::json!({"message": "Done"}));
    }
}
