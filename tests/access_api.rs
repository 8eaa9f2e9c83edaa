//! Role-gated access over the catalogue and reservation endpoints.

mod common;

use axum::http::{header, StatusCode};
use common::{
    body_json, body_text, build_test_app, get, get_auth, post_json, post_json_auth, staff_token,
    user_token,
};
use serde_json::json;

const CATALOGUE: [&str; 5] = [
    "/api/astronomy-shows",
    "/api/show-sessions",
    "/api/domes",
    "/api/themes",
    "/api/presenters",
];

#[tokio::test]
async fn health_and_banner_are_plain_text() {
    let app = build_test_app();
    let response = get(&app.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "OK");

    let response = get(&app.router, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_reads_of_the_catalogue_succeed() {
    let app = build_test_app();
    for uri in CATALOGUE {
        let response = get(&app.router, uri).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        assert_eq!(body_json(response).await, json!([]));
    }
}

#[tokio::test]
async fn anonymous_writes_are_unauthorized_before_the_body_is_read() {
    let app = build_test_app();
    for uri in CATALOGUE {
        let response = post_json(&app.router, uri, json!({})).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "POST {uri}");
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}

#[tokio::test]
async fn non_staff_writes_are_forbidden() {
    let app = build_test_app();
    let token = user_token(&app.state).await;
    let response = post_json_auth(
        &app.router,
        "/api/domes",
        &token,
        json!({"name": "Main", "rows": 5, "seats_in_row": 10}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");
}

#[tokio::test]
async fn staff_can_build_the_catalogue() {
    let app = build_test_app();
    let token = staff_token(&app.state).await;

    let response = post_json_auth(
        &app.router,
        "/api/domes",
        &token,
        json!({"name": "Main", "rows": 5, "seats_in_row": 10}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let dome = body_json(response).await;
    assert_eq!(dome["capacity"], 50);

    let theme = body_json(
        post_json_auth(&app.router, "/api/themes", &token, json!({"name": "Galaxies"})).await,
    )
    .await;
    let presenter = body_json(
        post_json_auth(
            &app.router,
            "/api/presenters",
            &token,
            json!({"first_name": "Carl", "last_name": "Sagan"}),
        )
        .await,
    )
    .await;
    assert_eq!(presenter["full_name"], "Carl Sagan");

    let response = post_json_auth(
        &app.router,
        "/api/astronomy-shows",
        &token,
        json!({
            "title": "Andromeda",
            "description": "Our neighbour",
            "themes": [theme["id"]],
            "presenter": presenter["id"],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let show = body_json(response).await;
    assert_eq!(show["themes"], json!([theme["id"]]));
    assert_eq!(show["presenter"], presenter["id"]);

    let response = post_json_auth(
        &app.router,
        "/api/show-sessions",
        &token,
        json!({
            "astronomy_show": show["id"],
            "planetarium_dome": dome["id"],
            "show_time": "2031-05-01T19:30:00Z",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let session = body_json(response).await;
    assert_eq!(session["astronomy_show"], show["id"]);
    assert_eq!(session["planetarium_dome"], dome["id"]);

    // Detail expands what the write view reported as ids.
    let uri = format!("/api/astronomy-shows/{}", show["id"]);
    let detail = body_json(get(&app.router, &uri).await).await;
    assert_eq!(detail["themes"][0]["name"], "Galaxies");
    assert_eq!(detail["presenter"]["full_name"], "Carl Sagan");

    let list = body_json(get(&app.router, "/api/astronomy-shows").await).await;
    assert_eq!(list[0]["themes"], json!(["Galaxies"]));
    assert_eq!(list[0]["presenter"], "Carl Sagan");
}

#[tokio::test]
async fn invalid_dome_dimensions_are_field_errors() {
    let app = build_test_app();
    let token = staff_token(&app.state).await;
    let response = post_json_auth(
        &app.router,
        "/api/domes",
        &token,
        json!({"name": "Broken", "rows": 0, "seats_in_row": -1}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["errors"]["rows"], json!(["Number of rows must be at least 1"]));
    assert_eq!(body["errors"]["seats_in_row"], json!(["Number of seats must be at least 1"]));
}

#[tokio::test]
async fn unknown_references_are_reported_per_field() {
    let app = build_test_app();
    let token = staff_token(&app.state).await;
    let response = post_json_auth(
        &app.router,
        "/api/astronomy-shows",
        &token,
        json!({"title": "Ghost", "themes": [404], "presenter": 77}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["errors"]["themes"], json!(["Invalid pk \"404\" - object does not exist."]));
    assert_eq!(body["errors"]["presenter"], json!(["Invalid pk \"77\" - object does not exist."]));
}

#[tokio::test]
async fn reservations_require_identity() {
    let app = build_test_app();
    assert_eq!(get(&app.router, "/api/reservations").await.status(), StatusCode::UNAUTHORIZED);

    let token = user_token(&app.state).await;
    let response = get_auth(&app.router, "/api/reservations", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn garbage_token_is_rejected_even_on_public_reads() {
    let app = build_test_app();
    let response = get_auth(&app.router, "/api/domes", "not-a-jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_item_is_not_found() {
    let app = build_test_app();
    let response = get(&app.router, "/api/astronomy-shows/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}
