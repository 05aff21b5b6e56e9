use affiliate_api::{router, AppState};
use affiliate_core::config::AppConfig;
use affiliate_store::{MemoryStore, RecordStore};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let records = RecordStore::new(Arc::new(MemoryStore::new()));
    router(AppState::new(records, &AppConfig::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("json body")
    };
    (status, headers, payload)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

async fn post(app: &Router, uri: &str, content_type: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .expect("request");
    let (status, _, payload) = send(app, request).await;
    (status, payload)
}

fn click_id_from(location: &str) -> String {
    location
        .split(['?', '&'])
        .find_map(|pair| pair.strip_prefix("click_id="))
        .expect("click_id in redirect")
        .to_string()
}

#[tokio::test]
async fn status_lists_endpoints() {
    let app = app();
    for uri in ["/", "/status"] {
        let (status, _, payload) = get(&app, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["status"], "active");
        assert_eq!(payload["store"], "memory");
        assert!(payload["endpoints"].as_array().expect("endpoints").len() >= 8);
    }

    let (status, _, payload) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "healthy");
    assert_eq!(get(&app, "/ready").await.0, StatusCode::OK);
    assert_eq!(get(&app, "/live").await.0, StatusCode::OK);
}

#[tokio::test]
async fn click_then_sale_is_attributed() {
    let app = app();
    get(&app, "/offers").await;

    let request = Request::builder()
        .method("GET")
        .uri("/click?offer_url=https%3A%2F%2Famazon.in%2Felectronics%3Fref%3Dapp&user_id=u1&offer_id=sample_amazon_electronics")
        .header(header::USER_AGENT, "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)")
        .header("cf-connecting-ip", "203.0.113.9")
        .header("cf-ipcountry", "IN")
        .body(Body::empty())
        .expect("request");
    let (status, headers, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::FOUND);

    let location = headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string();
    assert!(location.starts_with("https://amazon.in/electronics?ref=app&click_id=click_"));
    assert!(location.ends_with("&source=streaky_app"));
    let click_id = click_id_from(&location);

    let (status, payload) = post(
        &app,
        "/affiliate/callback",
        "application/json",
        json!({"click_id": click_id, "commission": 50, "amount": 1200}).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "success");
    assert!(payload["saleId"]
        .as_str()
        .expect("saleId")
        .starts_with(&format!("sale_{click_id}_")));

    let (status, _, profile) = get(&app, "/user/profile?uid=u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["totalClicks"], 1);
    assert_eq!(profile["totalSales"], 1);
    assert_eq!(profile["totalEarnings"], 50.0);
    assert_eq!(profile["favoriteCats"], json!(["electronics"]));

    let (status, _, daily) = get(&app, "/analytics/daily").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(daily["totalSales"], 1);
    assert_eq!(daily["totalRevenue"], 50.0);

    get(&app, "/rank").await;
    let (_, _, ranked) = get(&app, "/offers/ranked").await;
    assert_eq!(ranked[0]["id"], "sample_amazon_electronics");
    assert_eq!(ranked[0]["stats"]["sales"], 1);
}

#[tokio::test]
async fn click_validation_errors() {
    let app = app();

    let (status, _, payload) = get(&app, "/click?user_id=u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error"], "invalid_request");

    let (status, _, _) = get(&app, "/click?offer_url=https%3A%2F%2Fshop.example%2F").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(&app, "/click?offer_url=not-a-url&user_id=u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_requires_an_identifier() {
    let app = app();
    let (status, payload) = post(
        &app,
        "/affiliate/callback",
        "application/json",
        json!({"commission": 12}).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["status"], "error");

    let (status, _, _) = get(&app, "/analytics/daily").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn form_callback_on_short_path() {
    let app = app();
    let (status, payload) = post(
        &app,
        "/callback",
        "application/x-www-form-urlencoded",
        "order_id=ORD-9&payout=7.5&campaign_name=spring".to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(payload["saleId"].as_str().expect("saleId").starts_with("sale_ORD-9_"));

    let (_, _, daily) = get(&app, "/analytics/daily").await;
    assert_eq!(daily["networks"]["impact"]["sales"], 1);
    assert_eq!(daily["avgOrderValue"], 7.5);
}

#[tokio::test]
async fn ranking_lifecycle() {
    let app = app();

    let (_, _, before) = get(&app, "/status").await;
    assert!(before["feedUpdatedAt"].is_null());
    assert!(before["rankingUpdatedAt"].is_null());

    let (status, _, payload) = get(&app, "/rank").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["error"], "not_found");
    assert_eq!(get(&app, "/offers/ranked").await.0, StatusCode::NOT_FOUND);

    let (status, _, refreshed) = get(&app, "/offers/fetch").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["status"], "success");
    assert_eq!(refreshed["count"], 3);
    assert!(refreshed["updatedAt"].is_string());

    let (status, _, ranked) = get(&app, "/rank").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ranked["message"], "Offers ranked successfully");
    assert_eq!(ranked["count"], 3);
    // All offers are unseen, so the feed order is kept.
    assert_eq!(ranked["topOffer"], "Amazon Electronics Mega Sale");

    let (status, _, offers) = get(&app, "/offers/ranked").await;
    assert_eq!(status, StatusCode::OK);
    let offers = offers.as_array().expect("ranked array");
    assert_eq!(offers.len(), 3);
    assert_eq!(offers[0]["stats"]["impressions"], 100);
    assert!(offers[0]["trackingUrl"].is_string());

    let (_, _, after) = get(&app, "/status").await;
    assert!(after["feedUpdatedAt"].is_string());
    assert!(after["rankingUpdatedAt"].is_string());
}

#[tokio::test]
async fn personalized_offers() {
    let app = app();

    let (status, _, _) = get(&app, "/offers/personalized").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(&app, "/offers/personalized?uid=u7").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    get(&app, "/offers").await;
    get(&app, "/rank").await;

    let (status, _, payload) = get(&app, "/offers/personalized?user_id=u7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "success");
    assert_eq!(payload["user"]["id"], "u7");
    assert_eq!(
        payload["user"]["favoriteCats"],
        json!(["shopping", "electronics", "education"])
    );

    let offers = payload["offers"].as_array().expect("offers");
    assert_eq!(offers.len(), 3);
    for offer in offers {
        let score = offer["personalizedScore"].as_f64().expect("score");
        assert!(score > 0.0 && score < 1.0);
        assert!(offer["userCTR"].is_number());
    }
    let scores: Vec<f64> = offers
        .iter()
        .map(|o| o["personalizedScore"].as_f64().expect("score"))
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    // Favorite category and home geo beat both alternatives.
    assert_eq!(offers[0]["id"], "sample_amazon_electronics");
    assert_eq!(offers[0]["prefMatch"], 1);
}

#[tokio::test]
async fn daily_metrics_date_parameter() {
    let app = app();
    let (status, _, payload) = get(&app, "/analytics/daily?date=2024-13-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["status"], "error");

    let (status, _, payload) = get(&app, "/analytics/daily?date=2020-01-01").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(payload["message"]
        .as_str()
        .expect("message")
        .contains("2020-01-01"));
}

#[tokio::test]
async fn profile_endpoint_creates_cold_start_profile() {
    let app = app();
    assert_eq!(get(&app, "/user/profile").await.0, StatusCode::BAD_REQUEST);

    let (status, _, profile) = get(&app, "/user/profile?uid=fresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["userId"], "fresh");
    assert_eq!(profile["geo"], "IN");
    assert_eq!(profile["totalClicks"], 0);

    let (_, _, again) = get(&app, "/user/profile?uid=fresh").await;
    assert_eq!(again["createdAt"], profile["createdAt"]);
}

#[tokio::test]
async fn openapi_and_unknown_paths() {
    let app = app();
    let (status, _, doc) = get(&app, "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc.pointer("/paths/~1click/get").is_some());
    assert!(doc.pointer("/paths/~1affiliate~1callback/post").is_some());
    assert!(doc.pointer("/paths/~1offers~1personalized/get").is_some());
    assert_eq!(
        doc.pointer("/paths/~1click/get/responses/400/content/application~1json/schema/$ref"),
        Some(&json!("#/components/schemas/ErrorResponse"))
    );
    assert!(doc.pointer("/components/schemas/ErrorResponse").is_some());

    let (status, _, payload) = get(&app, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["status"], "error");
}
