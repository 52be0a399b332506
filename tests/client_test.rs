//! Wiremock integration tests for ApiClient.
//!
//! These tests drive the full request pipeline against mocked responses.

use std::collections::BTreeMap;
use std::time::Duration;

use hermod::interceptor::interceptor_fn;
use hermod::{
    ApiClient, ApiError, ApiResponse, FormPart, LogLevel, RequestBody, RequestConfig, ResponseBody,
    ResponseMetadata,
};
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: u64,
    name: String,
}

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::builder()
        .base_url(server.uri())
        .retry_delay(Duration::from_millis(10))
        .build()
        .expect("client should build")
}

#[tokio::test]
async fn test_get_returns_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .and(header("Accept", "application/json"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "A"})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client.get("/users/1").await.expect("get should succeed");

    assert_eq!(response.status, 200);
    assert_eq!(response.status_text, "OK");
    assert!(!response.metadata.from_cache);
    assert!(
        response
            .metadata
            .request_id
            .as_deref()
            .is_some_and(|id| id.starts_with("req_"))
    );
    assert_eq!(
        response.json::<User>().unwrap(),
        User {
            id: 1,
            name: "A".into()
        }
    );
    assert_eq!(response.header("Content-Type"), Some("application/json"));
}

#[tokio::test]
async fn test_repeat_get_served_from_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "A"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let first = client.get("/users/1").await.unwrap();
    let second = client.get("/users/1").await.unwrap();

    assert!(!first.metadata.from_cache);
    assert!(second.metadata.from_cache);
    assert_eq!(first.data, second.data);

    let stats = client.stats();
    assert_eq!(stats.requests, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.successes, 1);
}

#[tokio::test]
async fn test_cache_can_be_bypassed_per_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.get("/feed").await.unwrap();
    let fresh = client
        .request(RequestConfig::get("/feed").cache(false))
        .await
        .unwrap();

    assert!(!fresh.metadata.from_cache);
    assert_eq!(client.stats().cache_hits, 0);
}

#[tokio::test]
async fn test_clear_cache_forces_refetch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.get("/users").await.unwrap();
    client.clear_cache();
    client.get("/users").await.unwrap();
}

#[tokio::test]
async fn test_get_with_params_keys_cache_on_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["a"])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["b"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let page1 = client.get_with("/users", [("page", "1")]).await.unwrap();
    let page2 = client.get_with("/users", [("page", "2")]).await.unwrap();
    let page1_again = client.get_with("/users", [("page", "1")]).await.unwrap();

    assert_eq!(page1.data, ResponseBody::Json(json!(["a"])));
    assert_eq!(page2.data, ResponseBody::Json(json!(["b"])));
    assert!(page1_again.metadata.from_cache);
}

#[tokio::test]
async fn test_reserved_characters_in_params_do_not_share_cache_entries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("a", "1&b=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"which": "single"})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("a", "1"))
        .and(query_param("b", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"which": "pair"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let single = client.get_with("/search", [("a", "1&b=2")]).await.unwrap();
    let pair = client
        .get_with("/search", [("a", "1"), ("b", "2")])
        .await
        .unwrap();

    assert_eq!(single.data, ResponseBody::Json(json!({"which": "single"})));
    assert_eq!(pair.data, ResponseBody::Json(json!({"which": "pair"})));
    assert!(!single.metadata.from_cache);
    assert!(!pair.metadata.from_cache);
}

#[tokio::test]
async fn test_post_sends_json_and_is_not_cached() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({"sku": "X1", "qty": 2})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let body = json!({"sku": "X1", "qty": 2});
    let created = client.post("/orders", &body).await.unwrap();
    client.post("/orders", &body).await.unwrap();

    assert_eq!(created.status, 201);
    assert_eq!(created.data, ResponseBody::Json(json!({"id": 7})));
}

#[tokio::test]
async fn test_put_patch_delete() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/users/1"))
        .and(body_json(json!({"name": "B"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .put("/users/1", &json!({"id": 1, "name": "B"}))
        .await
        .unwrap();
    client.patch("/users/1", &json!({"name": "B"})).await.unwrap();
    let deleted = client.delete("/users/1").await.unwrap();

    assert_eq!(deleted.status, 204);
    assert!(deleted.data.is_empty());
}

#[tokio::test]
async fn test_send_merges_base_config() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/events"))
        .and(query_param("source", "cli"))
        .and(header("X-Trace", "t-1"))
        .and(body_json(json!({"kind": "ping"})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let base = RequestConfig::get("ignored")
        .param("source", "cli")
        .header("X-Trace", "t-1");
    let response = client
        .send(
            reqwest::Method::POST,
            "/events",
            Some(RequestBody::Json(json!({"kind": "ping"}))),
            Some(base),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 202);
}

#[tokio::test]
async fn test_text_response_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let response = client.get("/health").await.unwrap();
    assert_eq!(response.data.as_text(), Some("ok"));
}

#[tokio::test]
async fn test_auth_and_csrf_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Token abc"))
        .and(header("X-CSRF-TOKEN", "csrf-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ApiClient::builder()
        .base_url(mock_server.uri())
        .csrf_token("csrf-1")
        .build()
        .unwrap();
    client.set_auth_token("abc", Some("Token"));

    let response = client.get("/me").await.unwrap();
    assert_eq!(response.config.headers["Authorization"], "Token abc");
}

#[tokio::test]
async fn test_cleared_auth_token_is_not_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.set_auth_token("abc", None);
    client.set_csrf_token("late-token");
    client.clear_auth_token();

    let response = client.get("/public").await.unwrap();
    assert!(!response.config.headers.contains_key("Authorization"));
    assert_eq!(response.config.headers["X-CSRF-TOKEN"], "late-token");
}

#[tokio::test]
async fn test_not_found_uses_error_body_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "no such user"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.get("/users/99").await.unwrap_err();

    assert_eq!(err.status, Some(404));
    assert_eq!(err.message, "no such user");
    assert!(!err.retryable);
    assert_eq!(
        err.body(),
        Some(&ResponseBody::Json(json!({"message": "no such user"})))
    );
    let request = err.request.expect("error should carry its request");
    assert_eq!(request.method, "GET");
    assert!(request.url.ends_with("/users/99"));
    assert!(request.request_id.is_some());

    let stats = client.stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.retries, 0);

    let warnings = client.logger().logs(Some(LogLevel::Warn));
    assert!(warnings.iter().any(|e| e.message.contains("resource not found")));
    assert_eq!(client.logger().logs(Some(LogLevel::Error)).len(), 1);
}

#[tokio::test]
async fn test_malformed_json_error_body_degrades_to_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(400).set_body_raw("not json{", "application/json"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.get("/broken").await.unwrap_err();

    assert_eq!(err.status, Some(400));
    assert_eq!(err.body(), Some(&ResponseBody::Text("not json{".into())));
    assert_eq!(err.message, "not json{");
}

#[tokio::test]
async fn test_error_without_body_gets_status_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/teapot"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.get("/teapot").await.unwrap_err();
    assert_eq!(err.message, "HTTP 409: Conflict");
}

#[tokio::test]
async fn test_status_handler_can_recover() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/avatar"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .error_handler()
        .register(404, |err: ApiError| -> hermod::Result<ApiResponse> {
            Ok(ApiResponse {
                data: ResponseBody::Json(json!({"placeholder": true})),
                status: 200,
                status_text: "OK".into(),
                headers: BTreeMap::new(),
                config: RequestConfig::get(err.request.map(|r| r.url).unwrap_or_default()),
                metadata: ResponseMetadata::default(),
            })
        });

    let response = client.get("/avatar").await.unwrap();
    assert_eq!(response.data, ResponseBody::Json(json!({"placeholder": true})));
    assert_eq!(client.stats().errors, 1);
}

#[tokio::test]
async fn test_interceptors_and_transformers_shape_request_and_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("X-Tenant", "acme"))
        .and(query_param("locale", "de"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.add_request_transformer(|req: RequestConfig| Ok(req.param("locale", "de")));
    client
        .interceptors()
        .request
        .add(interceptor_fn(|req: RequestConfig| {
            Ok(req.header("X-Tenant", "acme"))
        }));
    client.add_response_transformer(|mut resp: ApiResponse| {
        resp.headers.insert("x-transformed".into(), "1".into());
        Ok(resp)
    });
    client
        .interceptors()
        .response
        .add(interceptor_fn(|mut resp: ApiResponse| {
            resp.status_text = "Intercepted".into();
            Ok(resp)
        }));

    let response = client.get("/items").await.unwrap();
    assert_eq!(response.header("x-transformed"), Some("1"));
    assert_eq!(response.status_text, "Intercepted");
}

#[tokio::test]
async fn test_failing_request_interceptor_aborts_before_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .interceptors()
        .request
        .add(interceptor_fn(|_req: RequestConfig| {
            Err(hermod::HermodError::Interceptor("blocked".into()).into())
        }));

    let err = client.get("/anything").await.unwrap_err();
    assert!(matches!(err.cause, hermod::HermodError::Interceptor(_)));
    assert_eq!(client.stats().errors, 1);
}

#[tokio::test]
async fn test_multipart_body_is_not_json_encoded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(|req: &Request| {
            let is_multipart = req
                .headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("multipart/form-data"));
            let body = String::from_utf8_lossy(&req.body);
            is_multipart && body.contains("name=\"avatar\"") && body.contains("pixels")
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"stored": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let request = RequestConfig::post("/upload").body(RequestBody::Multipart(vec![
        FormPart::text("caption", "me"),
        FormPart::file("avatar", "me.png", b"pixels".to_vec()),
    ]));
    let response = client.request(request).await.unwrap();
    assert_eq!(response.data, ResponseBody::Json(json!({"stored": true})));
}

#[tokio::test]
async fn test_rate_limit_rejects_then_recovers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = ApiClient::builder()
        .base_url(mock_server.uri())
        .enable_caching(false)
        .rate_limit("/limited", 2, Duration::from_millis(200))
        .build()
        .unwrap();

    client.get("/limited").await.unwrap();
    client.get("/limited").await.unwrap();

    let err = client.get("/limited").await.unwrap_err();
    assert!(err.is_rate_limited());
    assert_eq!(err.status, Some(429));
    assert_eq!(client.stats().rate_limited, 1);
    assert_eq!(client.stats().retries, 0);

    tokio::time::sleep(Duration::from_millis(250)).await;
    client.get("/limited").await.unwrap();
}

#[tokio::test]
async fn test_successful_request_is_logged() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.get("/ping").await.unwrap();

    let info = client.logger().logs(Some(LogLevel::Info));
    assert_eq!(info.len(), 1);
    assert!(info[0].message.starts_with("GET "));
    assert_eq!(info[0].data.as_ref().unwrap()["status"], 200);
}

#[tokio::test]
async fn test_disabled_logging_stores_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = ApiClient::builder()
        .base_url(mock_server.uri())
        .retry_attempts(1)
        .enable_logging(false)
        .build()
        .unwrap();
    let _ = client.get("/fail").await;

    assert!(client.logger().is_empty());
}

#[tokio::test]
async fn test_clones_share_state() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shared"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let clone = client.clone();
    client.get("/shared").await.unwrap();
    let cached = clone.get("/shared").await.unwrap();

    assert!(cached.metadata.from_cache);
    assert_eq!(client.stats().requests, 2);

    client.reset_stats();
    assert_eq!(clone.stats(), hermod::ClientStats::default());
}
