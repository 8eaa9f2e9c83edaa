use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::policy::{access, Operation, Resource};
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub is_staff: bool,
}

// No header at all is anonymous; a header that is present but unusable is a 401.
async fn resolve_caller(headers: &HeaderMap, state: &AppState) -> AppResult<Option<AuthUser>> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized("Invalid Authorization format. Expected: Bearer <token>".into())
        })?;

    let claims = state.tokens.verify(token.trim())?;

    // Re-read the account so deleted users and revoked staff rights take effect at once.
    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    Ok(Some(AuthUser {
        user_id: user.id,
        is_staff: user.is_staff,
    }))
}

// Bearer extractor; reuses the identity already resolved by `enforce_policy`
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }
        resolve_caller(&parts.headers, state)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Authentication credentials were not provided.".into()))
    }
}

// Runs before the body is read, so an anonymous write with a garbage payload is still a 401.
pub async fn enforce_policy(
    State((state, resource)): State<(Arc<AppState>, Resource)>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();

    let item_route = resource == Resource::Profile
        || parts
            .extensions
            .get::<MatchedPath>()
            .is_some_and(|path| path.as_str().contains('{'));

    let operation = Operation::from_request(&parts.method, item_route)
        .ok_or_else(|| AppError::Forbidden("This operation is not available.".into()))?;

    let caller = resolve_caller(&parts.headers, &state).await?;
    access(resource, operation).check(caller.as_ref())?;

    if let Some(user) = caller {
        tracing::debug!(user_id = user.user_id, ?resource, ?operation, "authorized");
        parts.extensions.insert(user);
    }
    Ok(next.run(Request::from_parts(parts, body)).await)
}
