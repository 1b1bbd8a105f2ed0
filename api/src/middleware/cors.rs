use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::CorsLayer;

/// Build the CORS layer for the configured browser origins.
///
/// Unparseable origins are skipped with a warning. The identity header is
/// allowed so a same-site gateway can forward it from browser requests.
pub fn build_cors_layer(origins: &[String], identity_header: &HeaderName) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            identity_header.clone(),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    fn app() -> Router {
        let origins = vec!["https://app.example".to_string(), "bad\norigin".to_string()];
        Router::new()
            .route("/v1/recommendations", get(|| async { StatusCode::OK }))
            .layer(build_cors_layer(
                &origins,
                &HeaderName::from_static("x-subject-id"),
            ))
    }

    #[tokio::test]
    async fn configured_origin_is_echoed() {
        let req = Request::get("/v1/recommendations")
            .header(header::ORIGIN, "https://app.example")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(req).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://app.example"
        );
    }

    #[tokio::test]
    async fn unknown_origin_gets_no_allow_header() {
        let req = Request::get("/v1/recommendations")
            .header(header::ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(req).await.unwrap();
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
