#![cfg(feature = "invocation")]

use std::sync::Arc;
use std::time::Duration;

use lambda_trace_log::invocation::client::RetryPolicy;
use lambda_trace_log::invocation::secrets::{ExtensionSecretStore, SecretStore, StaticSecretStore};
use lambda_trace_log::invocation::{HandlerConfig, InvocationDriver, InvocationError};
use lambda_trace_log::sink::MemorySink;
use lambda_trace_log::trace::trace_id_prefix;
use lambda_trace_log::{Environment, Logger, LoggerConfig};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET_NAME: &str = "rmr/forecast";

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        multiplier: 0.001,
        min_wait: Duration::from_millis(1),
        max_wait: Duration::from_millis(5),
    }
}

fn secret_for(server: &MockServer) -> String {
    json!({
        "username": "svc-report",
        "password": "hunter2",
        "AUTH_API_URL": format!("{}/auth", server.uri()),
        "PROTECTED_API_URL": format!("{}/api", server.uri()),
        "DOMAIN": "corp",
    })
    .to_string()
}

fn driver(name: &str, secrets: StaticSecretStore, secret_name: Option<&str>) -> (InvocationDriver, MemorySink) {
    let sink = MemorySink::new();
    let logger = Logger::with_config(
        name,
        LoggerConfig {
            environment: Some(Environment::Staging),
            sink: Some(Arc::new(sink.clone())),
            ..LoggerConfig::default()
        },
    )
    .unwrap();

    let config = HandlerConfig {
        secret_name: secret_name.map(str::to_string),
        retry: fast_retry(),
        ..HandlerConfig::default()
    };
    (InvocationDriver::new(Arc::new(logger), Arc::new(secrets), config), sink)
}

fn records(sink: &MemorySink) -> Vec<Value> {
    sink.lines()
        .iter()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth"))
        .and(header_exists("X-Request-ID"))
        .and(body_json(json!({
            "username": "svc-report",
            "password": "hunter2",
            "domain": "corp",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-1" })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn successful_invocation() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .and(header("Authorization", "Bearer tok-1"))
        .and(header_exists("X-Request-ID"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": 3 })))
        .expect(1)
        .mount(&server)
        .await;

    let secrets = StaticSecretStore::new().with_secret(SECRET_NAME, secret_for(&server));
    let (driver, sink) = driver("it-invoke-ok", secrets, Some(SECRET_NAME));

    let response = driver.handle().await;
    assert_eq!(response.status_code, 200);

    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["message"], "Success");
    assert_eq!(body["data"], json!({ "rows": 3 }));
    let trace_id = body["traceId"].as_str().unwrap().to_string();
    assert!(trace_id.starts_with(&trace_id_prefix()));

    let logs = records(&sink);
    let messages: Vec<&str> = logs.iter().map(|r| r["message"].as_str().unwrap()).collect();
    assert_eq!(
        messages,
        vec![
            "Lambda execution started",
            "Retrieved credentials for user: svc-report",
            "Token retrieved successfully",
            "Base Api call succeeded",
        ]
    );
    for rec in &logs {
        assert_eq!(rec["trace_id"], trace_id.as_str());
        assert_eq!(rec["function"], "run");
        assert_eq!(rec["environment"], "staging");
    }

    let requests = server.received_requests().await.unwrap();
    for request in requests {
        let sent = request.headers.get("X-Request-ID").unwrap().to_str().unwrap();
        assert_eq!(sent, trace_id);
    }
    assert!(driver.logger().current_trace_id().is_none());
}

#[tokio::test]
async fn missing_secret_name_is_reported() {
    let (driver, sink) = driver("it-invoke-no-secret", StaticSecretStore::new(), None);

    let response = driver.handle().await;
    assert_eq!(response.status_code, 500);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["message"], "Error");
    assert_eq!(body["error"], "Missing required environment variable: SECRET_NAME");

    let logs = records(&sink);
    let failure = logs.last().unwrap();
    assert_eq!(failure["message"], "Lambda execution failed");
    assert_eq!(failure["level"], "ERROR");
    assert_eq!(failure["exception_type"], "MissingEnv");
    assert_eq!(failure["root_cause_type"], "MissingEnv");
    assert_eq!(failure["function"], "handle");
    assert_eq!(failure["trace_id"], body["traceId"]);
    assert!(driver.logger().current_trace_id().is_none());
}

#[tokio::test]
async fn empty_token_fails_invocation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let secrets = StaticSecretStore::new().with_secret(SECRET_NAME, secret_for(&server));
    let (driver, _sink) = driver("it-invoke-no-token", secrets, Some(SECRET_NAME));

    let response = driver.handle().await;
    assert_eq!(response.status_code, 500);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["error"], "No token found in auth response.");
}

#[tokio::test]
async fn api_call_is_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["a", "b"])))
        .mount(&server)
        .await;

    let secrets = StaticSecretStore::new().with_secret(SECRET_NAME, secret_for(&server));
    let (driver, sink) = driver("it-invoke-retry", secrets, Some(SECRET_NAME));

    let response = driver.handle().await;
    assert_eq!(response.status_code, 200);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["data"], json!(["a", "b"]));

    let warnings = records(&sink)
        .into_iter()
        .filter(|r| r["level"] == "WARNING")
        .count();
    assert_eq!(warnings, 2);
}

#[tokio::test]
async fn retries_give_up_after_three_attempts() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let secrets = StaticSecretStore::new().with_secret(SECRET_NAME, secret_for(&server));
    let (driver, sink) = driver("it-invoke-give-up", secrets, Some(SECRET_NAME));

    let response = driver.handle().await;
    assert_eq!(response.status_code, 500);

    let failure = records(&sink).pop().unwrap();
    assert_eq!(failure["message"], "Lambda execution failed");
    assert_eq!(failure["exception_type"], "Http");
    assert!(failure["exception_message"].as_str().unwrap().contains("500"));
}

#[tokio::test]
async fn plain_text_response_is_passed_through() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string("queued"))
        .mount(&server)
        .await;

    let secrets = StaticSecretStore::new().with_secret(SECRET_NAME, secret_for(&server));
    let (driver, sink) = driver("it-invoke-text", secrets, Some(SECRET_NAME));

    let response = driver.handle().await;
    assert_eq!(response.status_code, 200);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["data"], "queued");

    let warning = records(&sink)
        .into_iter()
        .find(|r| r["level"] == "WARNING")
        .unwrap();
    assert_eq!(warning["message"], "Non-JSON or empty response from base API: queued");
    assert_eq!(warning["module"], "client");
}

#[tokio::test]
async fn extension_store_fetches_secret_string() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secretsmanager/get"))
        .and(query_param("secretId", SECRET_NAME))
        .and(header("X-Aws-Parameters-Secrets-Token", "session-tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Name": SECRET_NAME,
            "SecretString": "{\"username\": \"svc\"}",
        })))
        .mount(&server)
        .await;

    let store = ExtensionSecretStore::new(server.uri(), Some("session-tok".to_string()));
    let secret = store.get_secret(SECRET_NAME).await.unwrap();
    assert_eq!(secret, "{\"username\": \"svc\"}");
}

#[tokio::test]
async fn extension_store_rejects_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secretsmanager/get"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let store = ExtensionSecretStore::new(server.uri(), None);
    let err = store.get_secret(SECRET_NAME).await.unwrap_err();
    assert!(matches!(err, InvocationError::Http(_)));
}
