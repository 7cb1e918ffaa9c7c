//! HTTP-level tests for the artifact API.
//!
//! These drive the full router (auth extractor, JSON handling, service,
//! repository) against the in-memory backend, so they need no database.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use testvault_server::{
    auth::{Claims, JwtVerifier},
    create_router,
    generation::FallbackGenerator,
    repository::MemoryArtifactRepository,
    service::ArtifactService,
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-secret";

fn test_app() -> Router {
    let service = ArtifactService::new(
        Arc::new(MemoryArtifactRepository::new()),
        Arc::new(FallbackGenerator),
    );
    create_router(AppState::new(service, JwtVerifier::new(SECRET)))
}

/// Issues a session token for a fresh user.
fn new_user_token() -> String {
    let claims = Claims {
        sub: Uuid::new_v4(),
        email: "dev@example.com".to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as u64,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("Failed to encode token")
}

/// Sends a request and returns (status, parsed JSON body).
async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .expect("Failed to send request");

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Failed to parse JSON response")
    };
    (status, json)
}

async fn create(app: &Router, token: &str, code: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/artifacts",
        Some(token),
        Some(json!({
            "filePath": "src/math.js",
            "framework": "Jest",
            "code": code,
            "summary": "Smoke test for exported functions in src/math.js"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "create failed: {}", body);
    body["artifact"].clone()
}

fn version_codes(artifact: &Value) -> Vec<String> {
    artifact["versions"]
        .as_array()
        .expect("versions array")
        .iter()
        .map(|v| v["code"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_create_append_restore_flow() {
    let app = test_app();
    let token = new_user_token();

    let artifact = create(&app, &token, "t1").await;
    let id = artifact["id"].as_str().unwrap().to_string();
    assert_eq!(version_codes(&artifact), vec!["t1"]);
    assert_eq!(artifact["filePath"], "src/math.js");
    assert_eq!(artifact["createdAt"], artifact["updatedAt"]);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/v1/artifacts/{}", id),
        Some(&token),
        Some(json!({ "code": "t2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version_codes(&body["artifact"]), vec!["t1", "t2"]);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/v1/artifacts/{}/restore", id),
        Some(&token),
        Some(json!({ "versionIndex": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version_codes(&body["artifact"]), vec!["t1", "t2", "t1"]);
    assert_eq!(
        body["artifact"]["versions"][0]["summary"],
        body["artifact"]["versions"][2]["summary"]
    );

    let (status, body) = send(&app, "GET", &format!("/api/v1/artifacts/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version_codes(&body["artifact"]), vec!["t1", "t2", "t1"]);
}

#[tokio::test]
async fn test_requests_without_identity_are_rejected() {
    let app = test_app();

    let (status, body) = send(&app, "GET", "/api/v1/artifacts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication required");

    let (status, _) = send(&app, "GET", "/api/v1/artifacts", Some("forged.token.value"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/artifacts",
        None,
        Some(json!({ "filePath": "a.js", "code": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_is_accepted() {
    let app = test_app();
    let token = new_user_token();

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/artifacts")
        .header(header::COOKIE, format!("token={}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_other_users_artifacts_are_not_found() {
    let app = test_app();
    let owner = new_user_token();
    let intruder = new_user_token();

    let artifact = create(&app, &owner, "t1").await;
    let id = artifact["id"].as_str().unwrap();
    let missing = Uuid::new_v4().to_string();

    for target in [id, missing.as_str()] {
        let (status, body) =
            send(&app, "GET", &format!("/api/v1/artifacts/{}", target), Some(&intruder), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Test artifact not found");
    }

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/artifacts/{}", id),
        Some(&intruder),
        Some(json!({ "code": "hijack" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/artifacts/{}/restore", id),
        Some(&intruder),
        Some(json!({ "versionIndex": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) =
        send(&app, "DELETE", &format!("/api/v1/artifacts/{}", id), Some(&intruder), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/api/v1/artifacts", Some(&intruder), None).await;
    assert_eq!(body["artifacts"], json!([]));

    let (_, body) = send(&app, "GET", &format!("/api/v1/artifacts/{}", id), Some(&owner), None).await;
    assert_eq!(version_codes(&body["artifact"]), vec!["t1"]);
}

#[tokio::test]
async fn test_malformed_id_is_not_found() {
    let app = test_app();
    let token = new_user_token();
    let (status, _) = send(&app, "GET", "/api/v1/artifacts/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_requires_file_path_and_code() {
    let app = test_app();
    let token = new_user_token();

    for body in [
        json!({ "framework": "Jest", "code": "t1" }),
        json!({ "filePath": "", "code": "t1" }),
        json!({ "filePath": "src/a.js" }),
        json!({ "filePath": "src/a.js", "code": "" }),
    ] {
        let (status, response) =
            send(&app, "POST", "/api/v1/artifacts", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response["error"].as_str().unwrap().contains("required"));
    }

    let (_, body) = send(&app, "GET", "/api/v1/artifacts", Some(&token), None).await;
    assert_eq!(body["artifacts"], json!([]));
}

#[tokio::test]
async fn test_framework_defaults_to_jest() {
    let app = test_app();
    let token = new_user_token();
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/artifacts",
        Some(&token),
        Some(json!({ "filePath": "src/a.js", "code": "t1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["artifact"]["framework"], "Jest");
    assert_eq!(body["artifact"]["versions"][0]["summary"], Value::Null);
}

#[tokio::test]
async fn test_empty_code_append_leaves_history_unchanged() {
    let app = test_app();
    let token = new_user_token();
    let artifact = create(&app, &token, "t1").await;
    let id = artifact["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/v1/artifacts/{}", id),
        Some(&token),
        Some(json!({ "code": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", &format!("/api/v1/artifacts/{}", id), Some(&token), None).await;
    assert_eq!(version_codes(&body["artifact"]), vec!["t1"]);
}

#[tokio::test]
async fn test_invalid_restore_indices() {
    let app = test_app();
    let token = new_user_token();
    let artifact = create(&app, &token, "t1").await;
    let id = artifact["id"].as_str().unwrap();
    let uri = format!("/api/v1/artifacts/{}/restore", id);

    for body in [
        json!({ "versionIndex": -1 }),
        json!({ "versionIndex": 1 }),
        json!({}),
        json!({ "versionIndex": "0" }),
    ] {
        let (status, _) = send(&app, "POST", &uri, Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (_, body) = send(&app, "GET", &format!("/api/v1/artifacts/{}", id), Some(&token), None).await;
    assert_eq!(version_codes(&body["artifact"]), vec!["t1"]);
}

#[tokio::test]
async fn test_restore_twice_grows_history() {
    let app = test_app();
    let token = new_user_token();
    let artifact = create(&app, &token, "X").await;
    let id = artifact["id"].as_str().unwrap();
    let restore_uri = format!("/api/v1/artifacts/{}/restore", id);

    send(
        &app,
        "PUT",
        &format!("/api/v1/artifacts/{}", id),
        Some(&token),
        Some(json!({ "code": "Y" })),
    )
    .await;
    send(&app, "POST", &restore_uri, Some(&token), Some(json!({ "versionIndex": 0 }))).await;
    let (status, body) =
        send(&app, "POST", &restore_uri, Some(&token), Some(json!({ "versionIndex": 2 }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(version_codes(&body["artifact"]), vec!["X", "Y", "X", "X"]);
}

#[tokio::test]
async fn test_delete_then_get_is_not_found() {
    let app = test_app();
    let token = new_user_token();
    let artifact = create(&app, &token, "t1").await;
    let uri = format!("/api/v1/artifacts/{}", artifact["id"].as_str().unwrap());

    let (status, body) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));

    let (status, _) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_orders_by_update_and_filters_by_path() {
    let app = test_app();
    let token = new_user_token();

    let first = create(&app, &token, "a1").await;
    let (_, second) = send(
        &app,
        "POST",
        "/api/v1/artifacts",
        Some(&token),
        Some(json!({ "filePath": "src/other.js", "code": "b1" })),
    )
    .await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    send(
        &app,
        "PUT",
        &format!("/api/v1/artifacts/{}", first["id"].as_str().unwrap()),
        Some(&token),
        Some(json!({ "code": "a2" })),
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/v1/artifacts", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["artifacts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            first["id"].as_str().unwrap(),
            second["artifact"]["id"].as_str().unwrap()
        ]
    );

    let (_, body) = send(
        &app,
        "GET",
        "/api/v1/artifacts?filePath=src%2Fother.js",
        Some(&token),
        None,
    )
    .await;
    let filtered = body["artifacts"].as_array().unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["filePath"], "src/other.js");
}

#[tokio::test]
async fn test_concurrent_appends_are_all_recorded() {
    let app = test_app();
    let token = new_user_token();
    let artifact = create(&app, &token, "t1").await;
    let uri = format!("/api/v1/artifacts/{}", artifact["id"].as_str().unwrap());

    let (a, b) = tokio::join!(
        send(&app, "PUT", &uri, Some(&token), Some(json!({ "code": "a" }))),
        send(&app, "PUT", &uri, Some(&token), Some(json!({ "code": "b" }))),
    );
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);

    let (_, body) = send(&app, "GET", &uri, Some(&token), None).await;
    let codes = version_codes(&body["artifact"]);
    assert_eq!(codes.len(), 3);
    assert_eq!(codes[0], "t1");
    assert!(codes.contains(&"a".to_string()));
    assert!(codes.contains(&"b".to_string()));
}

#[tokio::test]
async fn test_generate_and_save() {
    let app = test_app();
    let token = new_user_token();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/artifacts/generate",
        Some(&token),
        Some(json!({
            "filePath": "app/calc.py",
            "fileContent": "def add(a, b):\n    return a + b\n",
            "framework": "PyTest",
            "summary": "Smoke test for exported functions in app/calc.py"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let artifact = &body["artifact"];
    assert_eq!(artifact["framework"], "PyTest");
    let code = artifact["versions"][0]["code"].as_str().unwrap();
    assert!(code.starts_with("# Auto-generated PyTest for app/calc.py"));
}

#[tokio::test]
async fn test_generation_endpoints() {
    let app = test_app();
    let token = new_user_token();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/generate/summaries",
        Some(&token),
        Some(json!({ "files": [{ "path": "src/a.js" }, { "path": "src/b.js" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"].as_array().unwrap().len(), 2);
    assert_eq!(body["files"][0]["summaries"].as_array().unwrap().len(), 3);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/generate/code",
        Some(&token),
        Some(json!({
            "filePath": "src/Calculator.java",
            "fileContent": "class Calculator {}",
            "framework": "JUnit",
            "summary": "smoke"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["code"].as_str().unwrap().contains("public class CalculatorTest"));

    // Generating code never saves anything.
    let (_, body) = send(&app, "GET", "/api/v1/artifacts", Some(&token), None).await;
    assert_eq!(body["artifacts"], json!([]));
}

#[tokio::test]
async fn test_batch_generation_collects_per_file_errors() {
    let app = test_app();
    let token = new_user_token();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/generate/tests",
        Some(&token),
        Some(json!({
            "framework": "JUnit",
            "files": [
                { "path": "src/Calculator.java", "content": "class Calculator {}", "summary": "smoke" },
                { "path": "" }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0]["code"].as_str().unwrap().contains("public class CalculatorTest"));
    assert!(results[0].get("error").is_none());
    assert_eq!(results[1]["path"], "");
    assert_eq!(results[1]["error"], "filePath is required");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/generate/tests",
        Some(&token),
        Some(json!({ "files": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/api/v1/artifacts", Some(&token), None).await;
    assert_eq!(body["artifacts"], json!([]));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = test_app();
    let token = new_user_token();

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/artifacts")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
