//! Extractors that turn axum rejections into structured `AppError` responses.
//!
//! `AppJson<T>` replaces `axum::Json<T>` and `AppQuery<T>` replaces
//! `axum::extract::Query<T>` in handler signatures, so a bad body or query
//! string yields the same JSON error envelope as every other failure.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Query, Request,
        rejection::{JsonRejection, QueryRejection},
    },
    http::request::Parts,
};

use crate::error::AppError;

pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(map_json_rejection(rejection)),
        }
    }
}

pub struct AppQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(AppQuery(value)),
            Err(rejection) => {
                let body_text = rejection.body_text();
                Err(AppError::Validation {
                    message: format!("Invalid query string: {body_text}"),
                    field: Some(field_from_serde_message(&body_text).unwrap_or("query".to_string())),
                    received: parts.uri.query().map(|q| serde_json::Value::String(q.to_string())),
                    docs_hint: Some("Boolean flags take 'true' or 'false'.".to_string()),
                })
            }
        }
    }
}

/// Convert a `JsonRejection` to `AppError::Validation`.
pub fn map_json_rejection(rejection: JsonRejection) -> AppError {
    let docs_hint = match &rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Send the body with 'Content-Type: application/json'."
        }
        _ => "Check the request body against the endpoint schema at /api-doc/openapi.json.",
    };
    let body_text = rejection.body_text();

    AppError::Validation {
        field: Some(field_from_serde_message(&body_text).unwrap_or("body".to_string())),
        message: format!("Invalid request body: {body_text}"),
        received: None,
        docs_hint: Some(docs_hint.to_string()),
    }
}

/// Pull the offending field out of serde messages such as
/// "missing field `assessmentReference`" or "unknown field `foo`".
fn field_from_serde_message(msg: &str) -> Option<String> {
    ["missing field `", "unknown field `"]
        .iter()
        .find_map(|marker| {
            let start = msg.find(marker)? + marker.len();
            let rest = &msg[start..];
            rest.find('`').map(|end| rest[..end].to_string())
        })
}
