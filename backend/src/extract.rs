//! Request extractors that report failures in the error envelope.

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use taskdeck_shared::{Schema, TaskQuery, ValidationError};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// A JSON body decoded and validated through its [`Schema`].
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: Schema,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(request, state)
            .await
            .map_err(|_| AppError::from(ValidationError::invalid_json()))?;
        Ok(Self(T::parse_slice(&body)?))
    }
}

/// Task list filters from the URL query string.
#[derive(Debug)]
pub struct ListQuery(pub TaskQuery);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ListQuery
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|_| AppError::Validation("Invalid query string".to_string()))?;
        Ok(Self(TaskQuery::from_pairs(pairs)?))
    }
}

/// Path ids that are not UUIDs cannot name an existing row.
pub fn resource_id(raw: &str, entity: &'static str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(entity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;
    use taskdeck_shared::{CreateCategory, SortOrder, TaskStatus};

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let request = HttpRequest::builder()
            .uri("/api/categories")
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let error = ValidJson::<CreateCategory>::from_request(request, &())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Invalid JSON body");
    }

    #[tokio::test]
    async fn schema_rules_apply_to_body() {
        let request = HttpRequest::builder()
            .body(axum::body::Body::from(r##"{"name":"Work","color":"red"}"##))
            .unwrap();
        let error = ValidJson::<CreateCategory>::from_request(request, &())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Invalid hex color");
    }

    #[tokio::test]
    async fn list_query_parses_filters() {
        let (mut parts, _) = HttpRequest::builder()
            .uri("/api/tasks?status=done&sort=&order=asc")
            .body(())
            .unwrap()
            .into_parts();
        let ListQuery(query) = ListQuery::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(query.status, Some(TaskStatus::Done));
        assert_eq!(query.sort, None);
        assert_eq!(query.order, SortOrder::Asc);
    }

    #[test]
    fn non_uuid_ids_are_not_found() {
        assert!(matches!(
            resource_id("42", "Task"),
            Err(AppError::NotFound("Task"))
        ));
        assert!(resource_id("5b6f1a52-3f4c-4c3e-9d6e-2f1c1b0a9e11", "Task").is_ok());
    }
}
