//! HTTP Basic authentication against the user registry

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use record_store::RecordStore;

use crate::error::ApiError;
use crate::routes::with_store;

/// The user a request was authenticated as
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

/// Reject requests without valid credentials; others carry an [`AuthUser`]
pub async fn require_user(
    State(store): State<Arc<RecordStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some((user, password)) = basic_credentials(request.headers()) else {
        return ApiError::Unauthorized.into_response();
    };

    let name = user.clone();
    let verified =
        with_store(&store, move |store| store.verify_credentials(&name, &password)).await;

    match verified {
        Ok(true) => {
            request.extensions_mut().insert(AuthUser(user));
            next.run(request).await
        }
        Ok(false) => {
            tracing::info!(%user, "wrong password");
            ApiError::Forbidden.into_response()
        }
        Err(ApiError::NotFound(_)) => {
            tracing::info!(%user, "unknown user");
            ApiError::Forbidden.into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Decode `Authorization: Basic <base64(user:password)>`
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}
