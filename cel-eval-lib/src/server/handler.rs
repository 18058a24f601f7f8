use super::{LOG_TARGET, ServerState};
use crate::eval::EvalError;
use crate::value::{Bindings, Value};
use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

const SUPPORTED_CONTENT_TYPES: [&str; 2] = ["application/json", "application/yaml"];

/// Body of an evaluation request, decoded from JSON or YAML.
#[derive(Debug, Deserialize)]
pub struct EvalRequest {
    pub expression: String,

    #[serde(default)]
    pub variables: Option<BTreeMap<String, serde_yaml::Value>>,
}

/// Body of a successful evaluation response.
#[derive(Debug, Serialize)]
pub struct EvalResponse {
    pub result: String,
}

/// Reasons a request is rejected, each mapped to one status code.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Supported methods: POST")]
    UnsupportedMethod,

    #[error("Supported Content-Type values: application/json, application/yaml")]
    UnsupportedContentType,

    #[error("error reading request body: {0}")]
    BodyRead(String),

    #[error("{0}")]
    Parse(String),

    #[error(transparent)]
    Evaluation(#[from] EvalError),
}

impl RequestError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UnsupportedMethod => StatusCode::METHOD_NOT_ALLOWED,
            Self::UnsupportedContentType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::BodyRead(_) | Self::Parse(_) | Self::Evaluation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{self}\n"),
        )
            .into_response()
    }
}

pub async fn handle_eval(State(state): State<Arc<ServerState>>, method: Method, headers: HeaderMap, body: Body) -> Response {
    let response = match process(&state, &method, &headers, body).await {
        Ok(response) => response,
        Err(e) => {
            log::debug!(target: LOG_TARGET, "Rejected request: {e}");
            e.into_response()
        }
    };

    log::debug!(target: LOG_TARGET, "{method} /eval -> {}", response.status());
    response
}

async fn process(state: &ServerState, method: &Method, headers: &HeaderMap, body: Body) -> Result<Response, RequestError> {
    if *method == Method::OPTIONS {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    if *method != Method::POST {
        return Err(RequestError::UnsupportedMethod);
    }

    if !is_supported_content_type(headers) {
        return Err(RequestError::UnsupportedContentType);
    }

    let bytes = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| RequestError::BodyRead(e.to_string()))?;

    let (expression, bindings) = parse_request(&bytes)?;

    let env = Arc::clone(&state.env);
    let value = tokio::task::spawn_blocking(move || env.evaluate(&expression, &bindings))
        .await
        .map_err(|e| RequestError::Evaluation(EvalError::Evaluation(e.to_string())))??;

    Ok((StatusCode::OK, Json(EvalResponse { result: value.to_text() })).into_response())
}

/// Compares the media type case-insensitively, ignoring parameters such as `charset`.
fn is_supported_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            let media_type = value.split(';').next().unwrap_or_default().trim();
            SUPPORTED_CONTENT_TYPES
                .iter()
                .any(|supported| media_type.eq_ignore_ascii_case(supported))
        })
}

fn parse_request(bytes: &[u8]) -> Result<(String, Bindings), RequestError> {
    let request: EvalRequest = serde_yaml::from_slice(bytes).map_err(|e| RequestError::Parse(e.to_string()))?;

    let mut bindings = Bindings::new();
    for (name, value) in request.variables.unwrap_or_default() {
        let value = Value::try_from(value).map_err(|e| RequestError::Parse(e.to_string()))?;
        let _ = bindings.insert(name, value);
    }

    Ok((request.expression, bindings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_content_type_matching() {
        assert!(is_supported_content_type(&headers("application/json")));
        assert!(is_supported_content_type(&headers("application/yaml")));
        assert!(is_supported_content_type(&headers("Application/JSON; charset=utf-8")));
        assert!(!is_supported_content_type(&headers("text/plain")));
        assert!(!is_supported_content_type(&headers("application/jsonx")));
        assert!(!is_supported_content_type(&HeaderMap::new()));
    }

    #[test]
    fn test_parse_json_request() {
        let (expression, bindings) = parse_request(br#"{"expression": "x + 1", "variables": {"x": 41}}"#).unwrap();
        assert_eq!(expression, "x + 1");
        assert_eq!(bindings.get("x"), Some(&Value::Int(41)));
    }

    #[test]
    fn test_parse_yaml_request_without_variables() {
        let (expression, bindings) = parse_request(b"expression: 1 + 1\n").unwrap();
        assert_eq!(expression, "1 + 1");
        assert!(bindings.is_empty());

        let (_, bindings) = parse_request(br#"{"expression": "1", "variables": null}"#).unwrap();
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_request(b"{\"variables\": {}}"), Err(RequestError::Parse(_))));
        assert!(matches!(parse_request(b"{not json"), Err(RequestError::Parse(_))));
        assert!(matches!(parse_request(b""), Err(RequestError::Parse(_))));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(RequestError::UnsupportedMethod.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(RequestError::UnsupportedContentType.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(RequestError::Parse(String::new()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RequestError::from(EvalError::Evaluation("boom".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
