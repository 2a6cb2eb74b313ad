//! HTTP handlers for the EV Service Center Platform API

pub mod catalog;
pub mod checklist;
pub mod health;
pub mod inventory;
pub mod transfer;

pub use catalog::*;
pub use checklist::*;
pub use health::*;
pub use inventory::*;
pub use transfer::*;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::{header::CONTENT_TYPE, request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON body extractor whose rejections use the standard error envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(AppError::ValidationError(rejection.body_text())),
        }
    }
}

/// JSON body that may be left out entirely.
///
/// Only an empty body yields `None`; a body that is present must be valid JSON
/// sent as `application/json`.
#[derive(Debug, Clone, Default)]
pub struct OptionalAppJson<T>(pub Option<T>);

fn is_json_content(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(';').next().unwrap_or_default().trim())
        .is_some_and(|mime| mime == "application/json" || mime.ends_with("+json"))
}

#[axum::async_trait]
impl<S, T> FromRequest<S> for OptionalAppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let json_content = is_json_content(req.headers());
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::ValidationError(rejection.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalAppJson(None));
        }
        if !json_content {
            return Err(AppError::ValidationError(
                "Expected request with `Content-Type: application/json`".to_string(),
            ));
        }

        serde_json::from_slice(&bytes)
            .map(|value| OptionalAppJson(Some(value)))
            .map_err(|e| {
                AppError::ValidationError(format!("Failed to deserialize the JSON body: {}", e))
            })
    }
}

/// Path extractor whose rejections use the standard error envelope
#[derive(Debug, Clone, Copy)]
pub struct AppPath<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(AppPath(value)),
            Err(rejection) => Err(AppError::ValidationError(rejection.body_text())),
        }
    }
}

/// Query string extractor whose rejections use the standard error envelope
#[derive(Debug, Clone, Copy)]
pub struct AppQuery<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(AppQuery(value)),
            Err(rejection) => Err(AppError::ValidationError(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::StatusCode,
        routing::put,
        Router,
    };
    use shared::CancelChecklistRequest;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::handlers::transfer::ListTransfersQuery;
    use crate::models::TransferDirection;

    fn json_request(body: &'static str) -> Request {
        axum::http::Request::builder()
            .method("PUT")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn bare_request(body: &'static str) -> Request {
        axum::http::Request::builder()
            .method("PUT")
            .uri("/")
            .body(Body::from(body))
            .unwrap()
    }

    fn cancel_body(request: Request) -> Result<Option<CancelChecklistRequest>, AppError> {
        tokio_test::block_on(OptionalAppJson::<CancelChecklistRequest>::from_request(
            request,
            &(),
        ))
        .map(|OptionalAppJson(body)| body)
    }

    #[test]
    fn test_app_json_accepts_valid_body() {
        let request = json_request(r#"{"note":"customer declined","restore_inventory":true}"#);
        let AppJson(parsed) =
            tokio_test::block_on(AppJson::<CancelChecklistRequest>::from_request(request, &()))
                .unwrap();

        assert_eq!(parsed.note.as_deref(), Some("customer declined"));
        assert_eq!(parsed.restore_inventory, Some(true));
    }

    #[test]
    fn test_app_json_rejection_is_validation_error() {
        let request = json_request(r#"{"restore_inventory":"yes"}"#);
        let err =
            tokio_test::block_on(AppJson::<CancelChecklistRequest>::from_request(request, &()))
                .unwrap_err();

        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_optional_body_missing_is_none() {
        assert!(cancel_body(bare_request("")).unwrap().is_none());
        assert!(cancel_body(json_request("")).unwrap().is_none());
    }

    #[test]
    fn test_optional_body_parses_restore_choice() {
        let body = cancel_body(json_request(r#"{"restore_inventory":false}"#))
            .unwrap()
            .unwrap();
        assert_eq!(body.restore_inventory, Some(false));
    }

    #[test]
    fn test_optional_body_malformed_is_rejected() {
        let err = cancel_body(json_request(r#"{"restore_inventory":"yes"}"#)).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = cancel_body(json_request("{not json")).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_optional_body_requires_json_content_type() {
        let err = cancel_body(bare_request(r#"{"restore_inventory":true}"#)).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_invalid_path_uses_error_envelope() {
        let app = Router::new().route(
            "/checklist/:id/accept",
            put(|AppPath(id): AppPath<Uuid>| async move { id.to_string() }),
        );
        let request = axum::http::Request::builder()
            .method("PUT")
            .uri("/checklist/not-a-uuid/accept")
            .body(Body::empty())
            .unwrap();

        let response = tokio_test::block_on(app.oneshot(request)).unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes =
            tokio_test::block_on(axum::body::to_bytes(response.into_body(), usize::MAX)).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }

    #[test]
    fn test_query_rejection_is_validation_error() {
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/transfer?direction=sideways")
            .body(())
            .unwrap()
            .into_parts();
        let err = tokio_test::block_on(AppQuery::<ListTransfersQuery>::from_request_parts(
            &mut parts,
            &(),
        ))
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let (mut parts, _) = axum::http::Request::builder()
            .uri("/transfer?direction=incoming")
            .body(())
            .unwrap()
            .into_parts();
        let AppQuery(query) = tokio_test::block_on(
            AppQuery::<ListTransfersQuery>::from_request_parts(&mut parts, &()),
        )
        .unwrap();
        assert_eq!(query.direction, TransferDirection::Incoming);
    }
}
