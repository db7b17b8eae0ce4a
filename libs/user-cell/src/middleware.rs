use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};
use tracing::debug;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::services::UserService;

/// Resolves the validated identity to a stored user (creating it on first
/// contact) and attaches the `Actor` with its capabilities.
pub async fn actor_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let identity = request
        .extensions()
        .get::<User>()
        .cloned()
        .ok_or_else(|| AppError::Auth("User not found in request extensions".to_string()))?;

    let profile = UserService::new(&state).ensure_user(&identity).await?;
    debug!("Request authenticated as {} ({})", profile.id, profile.role);

    request.extensions_mut().insert(profile.to_actor());
    request.extensions_mut().insert(profile);

    Ok(next.run(request).await)
}

/// Wraps a router with token validation followed by actor resolution.
pub fn authenticated<S>(router: Router<S>, state: &AppState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(middleware::from_fn_with_state(state.clone(), actor_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
