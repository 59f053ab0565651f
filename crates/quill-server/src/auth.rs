//! Bearer-token authentication middleware.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use quill_core::{EntityId, Error};

use crate::error::ApiError;
use crate::AppState;

/// The verified owner of the request, inserted by [`require_auth`].
#[derive(Clone)]
pub struct CurrentUser(pub EntityId);

/// Resolve the `Authorization: Bearer` header to an owner id, or reject
/// the request before it reaches a handler.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError(Error::Authentication("missing bearer token".into())))?;

    let user_id = state.service.verify_token(token).await?;
    request.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(request).await)
}
