pub mod domes;
pub mod presenters;
pub mod reservations;
pub mod sessions;
pub mod shows;
pub mod themes;
pub mod users;

use axum::{
    extract::{FromRequest, FromRequestParts},
    middleware, Router,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::enforce_policy;
use crate::policy::Resource;
use crate::AppState;

/// JSON body whose rejections render as [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Puts every route registered so far on `router` behind the access rules of `resource`.
pub(crate) fn guarded(
    router: Router<Arc<AppState>>,
    state: &Arc<AppState>,
    resource: Resource,
) -> Router<Arc<AppState>> {
    router.route_layer(middleware::from_fn_with_state(
        (state.clone(), resource),
        enforce_policy,
    ))
}

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(shows::routes(&state))
        .merge(themes::routes(&state))
        .merge(presenters::routes(&state))
        .merge(domes::routes(&state))
        .merge(sessions::routes(&state))
        .merge(reservations::routes(&state))
        .merge(users::routes(&state))
}
