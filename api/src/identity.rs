use std::task::{Context, Poll};

use axum::extract::{FromRequestParts, Request};
use axum::http::HeaderName;
use axum::http::request::Parts;
use tower::{Layer, Service};

use crate::error::AppError;

/// Longest subject id accepted from the identity header.
const MAX_SUBJECT_LEN: usize = 256;

/// Caller identity as verified by the upstream identity provider.
///
/// Two-phase resolution:
/// 1. `InjectIdentityLayer` copies the trusted header into request extensions
/// 2. Handlers extract it; a missing identity is a 401
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub subject: String,
}

// --- Tower Layer/Service for identity injection ---

/// Tower Layer that injects `CallerIdentity` into request extensions.
/// Silently continues when the header is absent (health, docs).
#[derive(Clone)]
pub struct InjectIdentityLayer {
    header: HeaderName,
}

impl InjectIdentityLayer {
    pub fn new(header: HeaderName) -> Self {
        Self { header }
    }
}

impl<S> Layer<S> for InjectIdentityLayer {
    type Service = InjectIdentityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        InjectIdentityService {
            inner,
            header: self.header.clone(),
        }
    }
}

#[derive(Clone)]
pub struct InjectIdentityService<S> {
    inner: S,
    header: HeaderName,
}

impl<S> Service<Request> for InjectIdentityService<S>
where
    S: Service<Request>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        // Never trust an identity the client put in extensions itself.
        req.extensions_mut().remove::<CallerIdentity>();
        if let Some(subject) = subject_from_header(&req, &self.header) {
            req.extensions_mut().insert(CallerIdentity { subject });
        }
        self.inner.call(req)
    }
}

fn subject_from_header(req: &Request, header: &HeaderName) -> Option<String> {
    let value = req.headers().get(header)?.to_str().ok()?.trim();
    if value.is_empty() || value.len() > MAX_SUBJECT_LEN {
        return None;
    }
    Some(value.to_owned())
}

// --- Extractor (used by handlers) ---

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized {
                message: "Caller identity could not be established".to_string(),
                docs_hint: Some(
                    "Requests must pass through the identity gateway, which sets the \
                     verified subject header."
                        .to_string(),
                ),
            })
    }
}
