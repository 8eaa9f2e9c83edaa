//! Session listing filters and occupancy reporting.

mod common;

use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use common::{body_json, build_test_app, get};
use planetarium::models::{NewAstronomyShow, NewPlanetariumDome, NewShowSession, NewShowTheme};
use planetarium::AppState;
use serde_json::Value;

struct Fixture {
    mars_session: i64,
    black_hole_session: i64,
}

async fn seed(state: &AppState) -> Fixture {
    let store = &state.store;
    let planets = store.create_theme(NewShowTheme { name: "Planets".into() }).await.unwrap();
    let stars = store.create_theme(NewShowTheme { name: "Stars".into() }).await.unwrap();

    let mars = store
        .create_show(NewAstronomyShow {
            title: "Mars Odyssey".into(),
            description: String::new(),
            themes: vec![planets.id, stars.id],
            presenter: None,
        })
        .await
        .unwrap();
    let black_holes = store
        .create_show(NewAstronomyShow {
            title: "Black Holes".into(),
            description: String::new(),
            themes: vec![stars.id],
            presenter: None,
        })
        .await
        .unwrap();
    let dome = store
        .create_dome(NewPlanetariumDome { name: "Main".into(), rows: 2, seats_in_row: 3 })
        .await
        .unwrap();

    let mars_session = store
        .create_session(NewShowSession {
            astronomy_show: mars.id,
            planetarium_dome: dome.id,
            show_time: Utc.with_ymd_and_hms(2031, 3, 14, 18, 0, 0).unwrap(),
        })
        .await
        .unwrap()
        .id;
    let black_hole_session = store
        .create_session(NewShowSession {
            astronomy_show: black_holes.id,
            planetarium_dome: dome.id,
            show_time: Utc.with_ymd_and_hms(2031, 3, 15, 21, 30, 0).unwrap(),
        })
        .await
        .unwrap()
        .id;

    Fixture { mars_session, black_hole_session }
}

fn ids(body: &Value) -> Vec<i64> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn sessions_are_listed_newest_first_with_capacity() {
    let app = build_test_app();
    let fx = seed(&app.state).await;

    let body = body_json(get(&app.router, "/api/show-sessions").await).await;
    assert_eq!(ids(&body), vec![fx.black_hole_session, fx.mars_session]);
    assert_eq!(body[0]["astronomy_show"], "Black Holes");
    assert_eq!(body[0]["planetarium_dome"], "Main");
    assert_eq!(body[0]["available_seats"], 6);
}

#[tokio::test]
async fn theme_filter_matches_substring_once_per_session() {
    let app = build_test_app();
    let fx = seed(&app.state).await;

    let body = body_json(get(&app.router, "/api/show-sessions?theme=plan").await).await;
    assert_eq!(ids(&body), vec![fx.mars_session]);

    // "s" matches both themes of the Mars show; it must still appear once.
    let body = body_json(get(&app.router, "/api/show-sessions?theme=S").await).await;
    assert_eq!(ids(&body), vec![fx.black_hole_session, fx.mars_session]);
}

#[tokio::test]
async fn date_and_title_filters_combine() {
    let app = build_test_app();
    let fx = seed(&app.state).await;

    let body = body_json(get(&app.router, "/api/show-sessions?show_time=2031-03-14").await).await;
    assert_eq!(ids(&body), vec![fx.mars_session]);

    let body = body_json(get(&app.router, "/api/show-sessions?title=HOLES").await).await;
    assert_eq!(ids(&body), vec![fx.black_hole_session]);

    let body = body_json(
        get(&app.router, "/api/show-sessions?title=holes&show_time=2031-03-14").await,
    )
    .await;
    assert!(ids(&body).is_empty());
}

#[tokio::test]
async fn malformed_date_filter_is_a_field_error() {
    let app = build_test_app();
    let response = get(&app.router, "/api/show-sessions?show_time=14.03.2031").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["errors"]["show_time"].is_array());
}

#[tokio::test]
async fn session_detail_nests_show_and_dome() {
    let app = build_test_app();
    let fx = seed(&app.state).await;

    let response = get(&app.router, &format!("/api/show-sessions/{}", fx.mars_session)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["astronomy_show"]["title"], "Mars Odyssey");
    assert_eq!(body["astronomy_show"]["themes"].as_array().unwrap().len(), 2);
    assert_eq!(body["planetarium_dome"]["capacity"], 6);
    assert_eq!(body["taken_places"], 0);
    assert_eq!(body["taken_seats"], serde_json::json!([]));
}
