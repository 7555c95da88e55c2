use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::tempdir;
use tower::ServiceExt;
use userfeed_server::{api::app_router, build_state, config::Config};

async fn build_test_router() -> (Router, tempfile::TempDir) {
    let tmp = tempdir().unwrap();
    let config = Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        db_path: tmp.path().join("test.db").to_string_lossy().to_string(),
        cors_allow: vec!["*".to_string()],
        request_timeout: Duration::from_secs(30),
        nats_url: None,
        user_events_topic: "userfeed.user-events".to_string(),
        feed_poll_interval: Duration::from_millis(500),
        feed_retention: None,
    };
    let state = build_state(&config).await.unwrap();
    (app_router(state, &config), tmp)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn ann() -> Value {
    json!({
        "firstName": "Ann",
        "lastName": "Lee",
        "email": "ann@example.com",
        "country": "IT",
        "nickname": "annie",
        "password": "correct horse battery staple"
    })
}

#[tokio::test]
async fn user_crud_round_trip() {
    let (app, _tmp) = build_test_router().await;

    let (status, created) = send(&app, Method::POST, "/api/v1/users", Some(ann())).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["firstName"], "Ann");
    assert!(created.get("password").is_none());
    assert!(created.get("hashedPassword").is_none());

    let (status, fetched) = send(&app, Method::GET, &format!("/api/v1/users/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/users/{}", id),
        Some(json!({
            "firstName": "Anna",
            "lastName": "Lee",
            "email": "ann@example.com",
            "country": "IT"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["firstName"], "Anna");
    assert_eq!(updated["createdAt"], created["createdAt"]);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/users/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/users/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn list_users_filters_and_pages() {
    let (app, _tmp) = build_test_router().await;

    for (first_name, country) in [("Ann", "IT"), ("Bob", "FR"), ("Cid", "IT")] {
        let mut user = ann();
        user["firstName"] = json!(first_name);
        user["country"] = json!(country);
        let (status, _) = send(&app, Method::POST, "/api/v1/users", Some(user)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, page) = send(&app, Method::GET, "/api/v1/users?country=IT&pageSize=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalCount"], 2);
    assert_eq!(page["pageSize"], 1);
    assert_eq!(page["results"].as_array().unwrap().len(), 1);
    assert_eq!(page["results"][0]["country"], "IT");

    let (_, page) = send(&app, Method::GET, "/api/v1/users", None).await;
    assert_eq!(page["totalCount"], 3);
    assert_eq!(page["pageSize"], 10);

    let (status, _) = send(&app, Method::GET, "/api/v1/users?pageSize=1000", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let (app, _tmp) = build_test_router().await;

    let mut user = ann();
    user["email"] = json!("not-an-email");
    let (status, body) = send(&app, Method::POST, "/api/v1/users", Some(user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);

    let mut user = ann();
    user["password"] = json!("");
    let (status, _) = send(&app, Method::POST, "/api/v1/users", Some(user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_users_are_not_found() {
    let (app, _tmp) = build_test_router().await;

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/v1/users/missing",
        Some(json!({
            "firstName": "Ann",
            "lastName": "Lee",
            "email": "ann@example.com",
            "country": "IT"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, "/api/v1/users/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
