use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;

use crate::error::AppError;
use crate::utils::jwt::decode;
use crate::utils::state::AppState;

/// Verifies the Bearer token and injects the claims for handlers.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let bearer = bearer.ok_or_else(|| {
        AppError::Unauthorized("Missing or malformed Bearer token".to_string())
    })?;
    let claims = decode(&state.config.jwt_secret, bearer.token())?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
