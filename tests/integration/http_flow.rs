//! The same workflow driven through the HTTP router

use crate::fixtures::{admin_token, gangnam, member_token, TestSystem};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use matchday::api::{create_router, ApiState};
use matchday::config::MatchmakingSettings;
use matchday::store::InMemoryMatchStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn router(system: &TestSystem) -> Router {
    create_router(ApiState {
        matchmaker: system.matchmaker.clone(),
        lifecycle: system.lifecycle.clone(),
        identity: system.identity.clone(),
    })
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn request_body(club_id: u64) -> Value {
    json!({
        "clubId": club_id,
        "sport": "soccer",
        "region": { "primary": "Seoul", "secondary": "Gangnam" },
        "dayPref": "weekend"
    })
}

#[tokio::test]
async fn test_http_match_workflow() {
    let system = TestSystem::new();
    system.add_club(1, "Alpha FC", gangnam(), 1000).await;
    system.add_club(2, "Beta FC", gangnam(), 1050).await;
    let app = router(&system);

    let (status, body) = call(&app, "POST", "/api/match/request", Some(&admin_token(1)), Some(request_body(1))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "WAITING");

    // The region may also be sent as a single "Primary/Secondary" token
    let mut second = request_body(2);
    second["region"] = json!("Seoul/Gangnam");
    let (status, body) = call(&app, "POST", "/api/match/request", Some(&admin_token(2)), Some(second)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "MATCHED");
    assert_eq!(body["opponentClubId"], 1);
    let room_id = body["roomId"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        "POST",
        "/api/match/schedule",
        Some(&member_token(1)),
        Some(json!({ "roomId": room_id, "when": "2026-05-02T10:00:00Z", "location": "Jamsil Field 3" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"]["schedule"]["location"], "Jamsil Field 3");

    let (status, body) = call(
        &app,
        "POST",
        "/api/match/result/propose",
        Some(&admin_token(1)),
        Some(json!({ "roomId": room_id, "myScore": 3, "opScore": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"]["status"], "PENDING");
    assert_eq!(body["match"]["isProposer"], true);

    let detail_uri = format!("/api/match/detail?roomId={}", room_id);
    let (status, body) = call(&app, "GET", &detail_uri, Some(&member_token(2)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["match"]["myScore"], 1);
    assert_eq!(body["match"]["opScore"], 3);
    assert_eq!(body["match"]["isProposer"], false);

    let (status, body) = call(
        &app,
        "POST",
        "/api/match/result/confirm",
        Some(&admin_token(2)),
        Some(json!({ "roomId": room_id, "accept": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "FINISHED");
    assert_eq!(body["alreadyFinished"], false);

    let (status, body) = call(&app, "GET", "/api/my-matches", Some(&member_token(1)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matches"][0]["status"], "FINISHED");

    let (status, body) = call(&app, "GET", "/api/clubs/1/matches/finished", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matches"][0]["ratingChange"], 18);

    let (status, body) = call(&app, "GET", "/api/ranking?sport=soccer&primary=Seoul&secondary=Gangnam", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ranking"][0]["clubId"], 2);
    assert_eq!(body["ranking"][0]["rating"], 1032);
    assert_eq!(body["ranking"][1]["rating"], 1018);
}

#[tokio::test]
async fn test_http_error_shapes() {
    let system = TestSystem::new();
    system.add_club(1, "Alpha FC", gangnam(), 1000).await;
    let app = router(&system);

    let (status, body) = call(&app, "GET", "/api/my-matches", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, body) = call(&app, "POST", "/api/match/request", Some(&member_token(1)), Some(request_body(1))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["kind"], "UNAUTHORIZED");

    let (status, body) = call(&app, "POST", "/api/match/request", Some(&admin_token(1)), Some(json!({ "clubId": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "INVALID_ARGUMENT");

    let (status, body) = call(
        &app,
        "POST",
        "/api/match/schedule",
        Some(&member_token(1)),
        Some(json!({ "roomId": "room_x", "when": "next tuesday", "location": "Field" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = call(&app, "GET", "/api/ranking?sport=%20", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_http_store_outage_is_503() {
    let inner = Arc::new(InMemoryMatchStore::new());
    let system = TestSystem::with_store(inner.clone(), MatchmakingSettings::default());
    system.add_club(1, "Alpha FC", gangnam(), 1000).await;
    let app = router(&system);

    inner.set_available(false);

    let (status, body) = call(&app, "POST", "/api/match/request", Some(&admin_token(1)), Some(request_body(1))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "STORE_UNAVAILABLE");
    assert!(!body["error"]["message"].as_str().unwrap().contains("in-memory"));

    let (status, body) = call(
        &app,
        "POST",
        "/api/match/result/propose",
        Some(&admin_token(1)),
        Some(json!({ "roomId": "room_any", "myScore": 1, "opScore": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["kind"], "STORE_UNAVAILABLE");
}
