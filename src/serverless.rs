//! API-gateway style event envelope around the prediction service.

use crate::error::{AppError, Result};
use crate::ml::PredictionService;
use crate::models::PredictRequest;
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Incoming invocation. `body` is JSON text, an already-parsed object, or
/// absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessEvent {
    #[serde(default)]
    pub body: Option<Value>,

    #[serde(default)]
    pub is_base64_encoded: bool,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerlessResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,

    /// JSON text of the HTTP response contract
    pub body: String,
}

impl ServerlessResponse {
    fn json(status_code: u16, body: &Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    fn from_error(err: &AppError) -> Self {
        Self::json(err.status_code().as_u16(), &err.to_body())
    }
}

fn parse_request(event: ServerlessEvent) -> Result<PredictRequest> {
    let body = match event.body {
        None | Some(Value::Null) => {
            return Err(AppError::Validation("request body is missing".to_string()))
        }
        Some(body) => body,
    };

    let value = match body {
        Value::String(text) => {
            let text = if event.is_base64_encoded {
                let bytes = Base64::decode_vec(text.trim())
                    .map_err(|e| AppError::Validation(format!("invalid base64 body: {}", e)))?;
                String::from_utf8(bytes)
                    .map_err(|e| AppError::Validation(format!("body is not UTF-8: {}", e)))?
            } else {
                text
            };
            serde_json::from_str::<Value>(&text)
                .map_err(|e| AppError::Validation(format!("body is not valid JSON: {}", e)))?
        }
        other => other,
    };

    serde_json::from_value(value)
        .map_err(|e| AppError::Validation(format!("malformed request: {}", e)))
}

/// Run one event through the prediction service. Never fails; errors are
/// rendered into the response envelope.
pub async fn handle_event(service: &PredictionService, event: ServerlessEvent) -> ServerlessResponse {
    let result = match parse_request(event) {
        Ok(request) => service.predict_request(&request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(response) => match serde_json::to_value(&response) {
            Ok(body) => ServerlessResponse::json(200, &body),
            Err(e) => ServerlessResponse::from_error(&AppError::from(e)),
        },
        Err(e) => {
            if e.status_code().is_server_error() {
                tracing::error!(error_code = e.error_code(), message = %e, "Invocation failed");
            } else {
                tracing::warn!(error_code = e.error_code(), message = %e, "Invocation rejected");
            }
            ServerlessResponse::from_error(&e)
        }
    }
}

/// One pending invocation from the runtime API
#[derive(Debug, Clone)]
pub struct Invocation {
    pub request_id: String,
    pub event: Value,
}

/// Pause after a failed poll of the runtime API
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Client for the Lambda runtime HTTP API (`AWS_LAMBDA_RUNTIME_API`)
#[derive(Clone)]
pub struct RuntimeClient {
    client: reqwest::Client,
    base_url: String,
    error_backoff: Duration,
}

impl RuntimeClient {
    pub fn new(runtime_api: &str) -> Self {
        let base = runtime_api.trim_end_matches('/');
        let base_url = if base.starts_with("http://") || base.starts_with("https://") {
            format!("{}/2018-06-01/runtime", base)
        } else {
            format!("http://{}/2018-06-01/runtime", base)
        };
        Self {
            client: reqwest::Client::new(),
            base_url,
            error_backoff: DEFAULT_ERROR_BACKOFF,
        }
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }

    fn runtime_error(context: &str, e: impl std::fmt::Display) -> AppError {
        AppError::Internal(format!("Runtime API {} failed: {}", context, e))
    }

    /// Block until the next event arrives
    pub async fn next_invocation(&self) -> Result<Invocation> {
        let response = self
            .client
            .get(format!("{}/invocation/next", self.base_url))
            .send()
            .await
            .map_err(|e| Self::runtime_error("next", e))?;

        let request_id = response
            .headers()
            .get("Lambda-Runtime-Aws-Request-Id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Self::runtime_error("next", "missing request id header"))?;

        let event = response
            .json::<Value>()
            .await
            .map_err(|e| Self::runtime_error("next", e))?;

        Ok(Invocation { request_id, event })
    }

    pub async fn send_response(&self, request_id: &str, response: &ServerlessResponse) -> Result<()> {
        self.client
            .post(format!("{}/invocation/{}/response", self.base_url, request_id))
            .json(response)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::runtime_error("response", e))?;
        Ok(())
    }

    /// Report an event the adapter could not even decode
    pub async fn send_error(&self, request_id: &str, message: &str) -> Result<()> {
        self.client
            .post(format!("{}/invocation/{}/error", self.base_url, request_id))
            .json(&serde_json::json!({
                "errorMessage": message,
                "errorType": "InvalidEvent",
            }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Self::runtime_error("error", e))?;
        Ok(())
    }

    /// Fetch one event, run it, and post the result
    pub async fn process_next(&self, service: &PredictionService) -> Result<()> {
        let invocation = self.next_invocation().await?;
        tracing::debug!(request_id = %invocation.request_id, "Invocation received");

        match serde_json::from_value::<ServerlessEvent>(invocation.event) {
            Ok(event) => {
                let response = handle_event(service, event).await;
                self.send_response(&invocation.request_id, &response).await
            }
            Err(e) => {
                self.send_error(&invocation.request_id, &format!("invalid event: {}", e))
                    .await
            }
        }
    }

    /// `process_next`, sleeping for the error backoff before returning a failure
    pub async fn poll(&self, service: &PredictionService) -> Result<()> {
        let result = self.process_next(service).await;
        if result.is_err() {
            tokio::time::sleep(self.error_backoff).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_field_names() {
        let event: ServerlessEvent = serde_json::from_value(json!({
            "body": "{}",
            "isBase64Encoded": true,
            "headers": {"content-type": "application/json"}
        }))
        .unwrap();
        assert!(event.is_base64_encoded);
        assert_eq!(event.body, Some(json!("{}")));

        let response = ServerlessResponse::json(200, &json!({"ok": true}));
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["statusCode"], 200);
        assert_eq!(encoded["body"], "{\"ok\":true}");
    }

    #[test]
    fn test_missing_body_is_rejected() {
        assert!(matches!(
            parse_request(ServerlessEvent::default()),
            Err(AppError::Validation(_))
        ));
        let null_body = ServerlessEvent {
            body: Some(Value::Null),
            ..Default::default()
        };
        assert!(matches!(parse_request(null_body), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_string_object_and_base64_bodies() {
        let object = json!({"features": {"age": 0.5}});
        let text = object.to_string();

        let from_object = parse_request(ServerlessEvent {
            body: Some(object),
            ..Default::default()
        })
        .unwrap();
        let from_text = parse_request(ServerlessEvent {
            body: Some(Value::String(text.clone())),
            ..Default::default()
        })
        .unwrap();
        let from_base64 = parse_request(ServerlessEvent {
            body: Some(Value::String(Base64::encode_string(text.as_bytes()))),
            is_base64_encoded: true,
            ..Default::default()
        })
        .unwrap();

        for request in [from_object, from_text, from_base64] {
            assert_eq!(request.features.unwrap().age, Some(0.5));
        }
    }

    #[test]
    fn test_runtime_base_url() {
        assert_eq!(
            RuntimeClient::new("127.0.0.1:9001").base_url,
            "http://127.0.0.1:9001/2018-06-01/runtime"
        );
        assert_eq!(
            RuntimeClient::new("http://localhost:9001/").base_url,
            "http://localhost:9001/2018-06-01/runtime"
        );
    }

    #[test]
    fn test_invalid_json_text_is_rejected() {
        let event = ServerlessEvent {
            body: Some(Value::String("{not json".to_string())),
            ..Default::default()
        };
        assert!(matches!(parse_request(event), Err(AppError::Validation(_))));
    }
}
