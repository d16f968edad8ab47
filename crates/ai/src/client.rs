//! REST client for a hosted generative model.
//!
//! Speaks the `generateContent` protocol: one user turn made of text and
//! optional inline image parts, with a JSON response schema so the model
//! answers with a single JSON object in its first text part.

use std::time::Duration;

use async_trait::async_trait;
use photopoet_core::data_uri::EncodedPhoto;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::analysis::{GeneratedPoem, PhotoAnalysis, PoemRequest};
use crate::error::AiError;
use crate::prompts::{poem_prompt, EXTRACTION_PROMPT};
use crate::{PoemGenerator, ThemeExtractor};

/// Connection settings for the model endpoint.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL, e.g. `https://generativelanguage.googleapis.com`.
    pub api_url: String,
    /// Sent as `x-goog-api-key` when present.
    pub api_key: Option<String>,
    /// Model name, e.g. `gemini-2.0-flash`.
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// HTTP client implementing both [`ThemeExtractor`] and [`PoemGenerator`].
pub struct ModelClient {
    client: reqwest::Client,
    config: ModelConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl ModelClient {
    pub fn new(config: ModelConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: ModelConfig) -> Self {
        Self { client, config }
    }

    /// Send one `generateContent` request and decode the JSON answer as `T`.
    async fn generate_content<T: DeserializeOwned>(
        &self,
        parts: Vec<Value>,
        schema: Value,
    ) -> Result<T, AiError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            },
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        );
        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header("x-goog-api-key", key);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let response = Self::ensure_success(response).await?;
        let decoded: GenerateResponse = response.json().await.map_err(|e| self.classify(e))?;
        Self::decode_output(decoded)
    }

    /// Pull the first text part and parse it against the output shape.
    fn decode_output<T: DeserializeOwned>(response: GenerateResponse) -> Result<T, AiError> {
        let text = response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| AiError::MalformedOutput("response has no text part".into()))?;
        serde_json::from_str(&text).map_err(|e| AiError::MalformedOutput(e.to_string()))
    }

    fn classify(&self, err: reqwest::Error) -> AiError {
        if err.is_timeout() {
            AiError::Timeout(self.config.timeout_secs)
        } else {
            AiError::Request(err)
        }
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code, otherwise capture
    /// the status and body text in an [`AiError::ApiError`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(AiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

fn string_object_schema(fields: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| (f.to_string(), json!({ "type": "STRING" })))
        .collect();
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": fields,
    })
}

#[async_trait]
impl ThemeExtractor for ModelClient {
    async fn extract(&self, photo: &EncodedPhoto) -> Result<PhotoAnalysis, AiError> {
        let parts = vec![
            json!({ "text": EXTRACTION_PROMPT }),
            json!({
                "inline_data": {
                    "mime_type": photo.mime_type,
                    "data": photo.base64(),
                }
            }),
        ];
        let analysis: PhotoAnalysis = self
            .generate_content(parts, string_object_schema(&["themes", "emotions"]))
            .await?;
        tracing::debug!(themes = %analysis.themes, emotions = %analysis.emotions, "Photo analyzed");
        analysis.validated()
    }
}

#[async_trait]
impl PoemGenerator for ModelClient {
    async fn generate(&self, request: &PoemRequest) -> Result<GeneratedPoem, AiError> {
        let parts = vec![json!({ "text": poem_prompt(request) })];
        let poem: GeneratedPoem = self
            .generate_content(parts, string_object_schema(&["poem"]))
            .await?;
        poem.validated()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use photopoet_core::style::PoemStyle;

    use super::*;

    #[derive(Clone)]
    struct Stub {
        status: StatusCode,
        reply: Value,
        seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    }

    async fn handle(
        State(stub): State<Stub>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let key = headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        stub.seen.lock().unwrap().push((key, body));
        (stub.status, Json(stub.reply.clone()))
    }

    /// Serve a canned `generateContent` reply on an ephemeral port.
    async fn spawn_stub(status: StatusCode, reply: Value) -> (ModelClient, Stub) {
        let stub = Stub {
            status,
            reply,
            seen: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/v1beta/models/{model}", post(handle))
            .with_state(stub.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let client = ModelClient::new(ModelConfig {
            api_url: format!("http://{addr}"),
            api_key: Some("test-key".into()),
            model: "test-model".into(),
            timeout_secs: 5,
        })
        .unwrap();
        (client, stub)
    }

    fn text_reply(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    fn photo() -> EncodedPhoto {
        EncodedPhoto::new("image/png", vec![1, 2, 3]).unwrap()
    }

    #[tokio::test]
    async fn extraction_sends_image_and_parses_fields() {
        let reply = text_reply(r#"{"themes":"mountains, solitude","emotions":"peace, awe"}"#);
        let (client, stub) = spawn_stub(StatusCode::OK, reply).await;

        let analysis = client.extract(&photo()).await.unwrap();
        assert_eq!(analysis.themes, "mountains, solitude");
        assert_eq!(analysis.emotions, "peace, awe");

        let seen = stub.seen.lock().unwrap();
        let (key, body) = &seen[0];
        assert_eq!(key.as_deref(), Some("test-key"));
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[tokio::test]
    async fn empty_themes_fail_extraction() {
        let reply = text_reply(r#"{"themes":"","emotions":"peace"}"#);
        let (client, _) = spawn_stub(StatusCode::OK, reply).await;
        assert_matches!(
            client.extract(&photo()).await,
            Err(AiError::IncompleteAnalysis("themes"))
        );
    }

    #[tokio::test]
    async fn missing_field_is_malformed() {
        let reply = text_reply(r#"{"themes":"sea"}"#);
        let (client, _) = spawn_stub(StatusCode::OK, reply).await;
        assert_matches!(client.extract(&photo()).await, Err(AiError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let (client, _) = spawn_stub(
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": "quota" }),
        )
        .await;
        assert_matches!(
            client.extract(&photo()).await,
            Err(AiError::ApiError { status: 429, .. })
        );
    }

    #[tokio::test]
    async fn generation_sends_prompt_and_returns_poem() {
        let reply = text_reply(r#"{"poem":"peaks hold the silence"}"#);
        let (client, stub) = spawn_stub(StatusCode::OK, reply).await;

        let request = PoemRequest {
            themes: "mountains".into(),
            emotions: "awe".into(),
            style: Some(PoemStyle::Haiku),
        };
        let poem = PoemGenerator::generate(&client, &request).await.unwrap();
        assert_eq!(poem.poem, "peaks hold the silence");

        let seen = stub.seen.lock().unwrap();
        let text = seen[0].1["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(text.contains("Poem Style: Haiku"));
    }

    #[tokio::test]
    async fn no_candidates_is_malformed() {
        let (client, _) = spawn_stub(StatusCode::OK, json!({ "candidates": [] })).await;
        let request = PoemRequest {
            themes: "a".into(),
            emotions: "b".into(),
            style: None,
        };
        assert_matches!(
            PoemGenerator::generate(&client, &request).await,
            Err(AiError::MalformedOutput(_))
        );
    }
}
