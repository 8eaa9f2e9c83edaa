//! Shared helpers for the HTTP integration tests.
//!
//! Every test gets a fresh router over a [`MemoryStore`], so tests never share
//! rows and need no database.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::Fake;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use planetarium::config::Config;
use planetarium::models::{
    NewAstronomyShow, NewPlanetariumDome, NewShowSession, NewShowTheme, NewUser,
};
use planetarium::store::MemoryStore;
use planetarium::{build_router, AppState};

pub const PASSWORD: &str = "pasha22335";

pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
}

pub fn build_test_app() -> TestApp {
    let state = AppState::new(Config::for_tests(), Arc::new(MemoryStore::new()));
    TestApp { router: build_router(state.clone()), state }
}

pub fn random_email() -> String {
    SafeEmail().fake()
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: &Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(app: &Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Creates an account directly in the store and returns a valid access token for it.
pub async fn create_user(state: &AppState, is_staff: bool) -> (i64, String) {
    let user = state
        .store
        .create_user(NewUser {
            email: random_email(),
            password_hash: state.passwords.hash(PASSWORD).unwrap(),
            is_staff,
        })
        .await
        .unwrap();
    let token = state.tokens.issue(user.id, user.is_staff).unwrap();
    (user.id, token)
}

pub async fn staff_token(state: &AppState) -> String {
    create_user(state, true).await.1
}

pub async fn user_token(state: &AppState) -> String {
    create_user(state, false).await.1
}

pub struct Catalogue {
    pub show_id: i64,
    pub dome_id: i64,
}

/// One show and one 5x10 dome.
pub async fn seed_catalogue(state: &AppState) -> Catalogue {
    let theme = state
        .store
        .create_theme(NewShowTheme { name: "Planets".into() })
        .await
        .unwrap();
    let show = state
        .store
        .create_show(NewAstronomyShow {
            title: "Mars Odyssey".into(),
            description: "A trip to the red planet".into(),
            themes: vec![theme.id],
            presenter: None,
        })
        .await
        .unwrap();
    let dome = state
        .store
        .create_dome(NewPlanetariumDome { name: "Main Dome".into(), rows: 5, seats_in_row: 10 })
        .await
        .unwrap();
    Catalogue { show_id: show.id, dome_id: dome.id }
}

pub async fn seed_session(state: &AppState, catalogue: &Catalogue, show_time: DateTime<Utc>) -> i64 {
    state
        .store
        .create_session(NewShowSession {
            astronomy_show: catalogue.show_id,
            planetarium_dome: catalogue.dome_id,
            show_time,
        })
        .await
        .unwrap()
        .id
}

pub fn tomorrow() -> DateTime<Utc> {
    Utc::now() + Duration::days(1)
}

pub fn yesterday() -> DateTime<Utc> {
    Utc::now() - Duration::days(1)
}
