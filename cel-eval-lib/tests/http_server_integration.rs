//! Integration tests for the HTTP server, run against a listener on an ephemeral port.

use cel_eval_lib::eval::{EnvOptions, Environment};
use cel_eval_lib::server;
use reqwest::{Client, Method, Response, StatusCode};
use tokio::net::TcpListener;

const MAX_BODY_BYTES: usize = 1024;

async fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    let env = Environment::new(EnvOptions::default()).expect("Failed to build environment");

    let _server = tokio::spawn(server::serve_on(listener, env, MAX_BODY_BYTES));
    format!("http://{addr}/eval")
}

async fn post(url: &str, content_type: &str, body: impl Into<String>) -> Response {
    Client::new()
        .post(url)
        .header("Content-Type", content_type)
        .body(body.into())
        .send()
        .await
        .expect("Request failed")
}

fn assert_cors(response: &Response) {
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "Accept, Content-Type");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_post_json() {
    let url = start_server().await;

    let response = post(&url, "application/json", r#"{"expression": "1+1", "variables": {}}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    assert!(response.headers()["content-type"].to_str().unwrap().starts_with("application/json"));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"result": "2"}));
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_post_yaml_with_variables() {
    let url = start_server().await;

    let body = "expression: x.y + '!'\nvariables:\n  x:\n    y: z\n";
    let response = post(&url, "application/yaml; charset=utf-8", body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["result"], "z!");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_same_request_twice_gives_same_result() {
    let url = start_server().await;
    let request = r#"{"expression": "[3, 1, 2].sum() * n", "variables": {"n": 2}}"#;

    let first = post(&url, "application/json", request).await.text().await.unwrap();
    let second = post(&url, "application/json", request).await.text().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, r#"{"result":"12"}"#);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_get_is_not_allowed() {
    let url = start_server().await;

    let response = Client::new().get(&url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_cors(&response);
    assert_eq!(response.text().await.unwrap(), "Supported methods: POST\n");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_options_preflight() {
    let url = start_server().await;

    let response = Client::new().request(Method::OPTIONS, &url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_cors(&response);
    assert!(response.text().await.unwrap().is_empty());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_unsupported_content_type_stops_processing() {
    let url = start_server().await;

    // the expression would fail to compile, but the request is rejected first
    let response = post(&url, "text/plain", r#"{"expression": "x +"}"#).await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_cors(&response);
    assert_eq!(
        response.text().await.unwrap(),
        "Supported Content-Type values: application/json, application/yaml\n"
    );
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_malformed_body() {
    let url = start_server().await;

    let response = post(&url, "application/json", "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_cors(&response);
    assert!(!response.text().await.unwrap().trim().is_empty());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_oversized_body() {
    let url = start_server().await;

    let padding = " ".repeat(MAX_BODY_BYTES * 2);
    let response = post(&url, "application/json", format!(r#"{{"expression": "1"{padding}}}"#)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_evaluation_errors_are_bad_requests() {
    let url = start_server().await;

    let response = post(&url, "application/json", r#"{"expression": "x +"}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));
    let text = response.text().await.unwrap();
    assert!(text.contains("Syntax error"), "{text}");
    assert!(!text.contains("panicked"), "{text}");

    let response = post(&url, "application/json", r#"{"expression": "y"}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    insta::assert_snapshot!(
        response.text().await.unwrap().trim_end(),
        @"ERROR: <input>:1:1: undeclared reference to 'y' (in container '')"
    );

    let response = post(&url, "application/json", r#"{"expression": "1 / 0"}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post(&url, "application/json", r#"{"expression": "[1, 2][5]"}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.text().await.unwrap().trim_end(), "index '5' out of range in list size '2'");

    let response = post(&url, "application/json", r#"{"expression": "'abc'.find('[')"}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
