//! The two response shapes every API route produces.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    ValidationError,
    ServiceUnavailable,
    InternalError,
    AuthError,
}

impl ErrorCode {
    /// HTTP status the code is normally sent with. `AuthError` varies by
    /// route and callers override it.
    pub fn default_status(&self) -> u16 {
        match self {
            ErrorCode::Unauthorized => 401,
            ErrorCode::NotFound => 404,
            ErrorCode::ValidationError => 400,
            ErrorCode::ServiceUnavailable => 503,
            ErrorCode::InternalError => 500,
            ErrorCode::AuthError => 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: ErrorCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorBody,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
                code,
            },
        }
    }
}

/// Either envelope shape, for clients decoding a response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiEnvelope<T> {
    Data(ApiResponse<T>),
    Error(ApiError),
}

impl<T> ApiEnvelope<T> {
    pub fn into_result(self) -> Result<T, ErrorBody> {
        match self {
            ApiEnvelope::Data(response) => Ok(response.data),
            ApiEnvelope::Error(error) => Err(error.error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(ErrorCode::Unauthorized, "UNAUTHORIZED", 401)]
    #[case(ErrorCode::NotFound, "NOT_FOUND", 404)]
    #[case(ErrorCode::ValidationError, "VALIDATION_ERROR", 400)]
    #[case(ErrorCode::ServiceUnavailable, "SERVICE_UNAVAILABLE", 503)]
    #[case(ErrorCode::InternalError, "INTERNAL_ERROR", 500)]
    fn error_codes_serialize_with_status(
        #[case] code: ErrorCode,
        #[case] wire: &str,
        #[case] status: u16,
    ) {
        assert_eq!(serde_json::to_value(code).unwrap(), json!(wire));
        assert_eq!(code.default_status(), status);
    }

    #[test]
    fn error_shape_matches_contract() {
        let error = ApiError::new(ErrorCode::NotFound, "Task not found");
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({ "error": { "message": "Task not found", "code": "NOT_FOUND" } })
        );
    }

    #[test]
    fn envelope_decodes_both_shapes() {
        let ok: ApiEnvelope<Vec<u32>> = serde_json::from_value(json!({ "data": [1, 2] })).unwrap();
        assert_eq!(ok.into_result().unwrap(), vec![1, 2]);

        let err: ApiEnvelope<Vec<u32>> = serde_json::from_value(json!({
            "error": { "message": "Authentication required", "code": "UNAUTHORIZED" }
        }))
        .unwrap();
        assert_eq!(err.into_result().unwrap_err().code, ErrorCode::Unauthorized);
    }
}
