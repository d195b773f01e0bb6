//! Gemini File Search API client.
//!
//! Covers the four calls the facade needs: store creation, media upload
//! (with long-running operation polling), grounded `generateContent`, and
//! store deletion.
//! See: <https://ai.google.dev/gemini-api/docs/file-search>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::SearchProvider;
use crate::types::{SearchAnswer, SearchParams, Source, StagedFile, UploadAck};
use crate::{FileSearchError, Result};

/// Default base URL for the Gemini API
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when a search does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Client for the Gemini File Search API.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    http: Client,
    base_url: String,
    default_model: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl GeminiClient {
    /// Create a client against the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| FileSearchError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            poll_interval: Duration::from_secs(2),
            max_polls: 60,
        })
    }

    /// Replace the HTTP client (e.g. to change the request timeout).
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// How often and how many times to poll an upload operation.
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    async fn wait_for_operation(&self, mut operation: Operation) -> Result<Operation> {
        let mut polls = 0;
        while !operation.done {
            if polls >= self.max_polls {
                return Err(FileSearchError::ServiceUnavailable {
                    service: "Gemini".to_string(),
                    reason: format!(
                        "upload operation {} did not finish after {} polls",
                        operation.name, self.max_polls
                    ),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;

            let url = format!("{}/v1beta/{}", self.base_url, operation.name);
            let response = self
                .http
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .send()
                .await?;
            operation = check_status(response).await?.json().await?;
            debug!(operation = %operation.name, polls, done = operation.done, "polled upload operation");
        }

        if let Some(error) = operation.error.take() {
            return Err(FileSearchError::Api {
                status: error.http_status(),
                message: error.message,
            });
        }
        Ok(operation)
    }
}

/// Map non-success responses onto the error taxonomy.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(FileSearchError::RateLimited { retry_after });
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("Gemini API error: {status}"));
    Err(FileSearchError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl SearchProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn create_store(&self, display_name: &str) -> Result<String> {
        let url = format!("{}/v1beta/fileSearchStores", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&CreateStoreRequest { display_name })
            .send()
            .await?;

        let store: StoreResource = check_status(response).await?.json().await?;
        if store.name.is_empty() {
            return Err(FileSearchError::EmptyResponse);
        }
        Ok(store.name)
    }

    async fn upload(&self, store_id: &str, file: &StagedFile) -> Result<UploadAck> {
        let body = tokio::fs::read(&file.path).await?;
        let url = format!(
            "{}/upload/v1beta/{}:uploadToFileSearchStore",
            self.base_url, store_id
        );
        let response = self
            .http
            .post(&url)
            .query(&[("uploadType", "media")])
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, &file.content_type)
            .body(body)
            .send()
            .await?;

        let operation: Operation = check_status(response).await?.json().await?;
        let operation = self.wait_for_operation(operation).await?;

        let document = operation
            .response
            .and_then(|r| r.document_name)
            .unwrap_or(operation.name);
        Ok(UploadAck { document })
    }

    async fn search(
        &self,
        store_id: &str,
        query: &str,
        params: &SearchParams,
    ) -> Result<SearchAnswer> {
        let model = params.model.as_deref().unwrap_or(&self.default_model);
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: query }],
            }],
            tools: vec![Tool {
                file_search: FileSearchTool {
                    file_search_store_names: vec![store_id],
                },
            }],
            generation_config: GenerationConfig {
                max_output_tokens: params.max_tokens,
                temperature: params.temperature,
            },
        };

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let body: GenerateContentResponse = check_status(response).await?.json().await?;
        let candidate = body
            .candidates
            .into_iter()
            .next()
            .ok_or(FileSearchError::EmptyResponse)?;

        let answer = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let mut sources: Vec<Source> = Vec::new();
        for chunk in candidate
            .grounding_metadata
            .map(|g| g.grounding_chunks)
            .unwrap_or_default()
        {
            let Some(ctx) = chunk.retrieved_context else {
                continue;
            };
            let source = Source {
                title: ctx.title.unwrap_or_else(|| "Untitled".to_string()),
                uri: ctx.uri.unwrap_or_default(),
            };
            if !sources.contains(&source) {
                sources.push(source);
            }
        }

        Ok(SearchAnswer {
            answer,
            sources,
            model: body.model_version.unwrap_or_else(|| model.to_string()),
        })
    }

    async fn delete_store(&self, store_id: &str) -> Result<()> {
        let url = format!("{}/v1beta/{}", self.base_url, store_id);
        let response = self
            .http
            .delete(&url)
            .query(&[("force", "true")])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

// Request types

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateStoreRequest<'a> {
    display_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    tools: Vec<Tool<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool<'a> {
    file_search: FileSearchTool<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileSearchTool<'a> {
    file_search_store_names: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// Response types

#[derive(Deserialize)]
struct StoreResource {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<OperationError>,
    #[serde(default)]
    response: Option<UploadResponse>,
}

#[derive(Deserialize)]
struct OperationError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl OperationError {
    /// google.rpc.Code to the closest HTTP status.
    fn http_status(&self) -> u16 {
        match self.code {
            3 | 9 | 11 => 400,
            5 => 404,
            8 => 429,
            14 => 503,
            _ => 500,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    #[serde(default)]
    document_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingChunk {
    #[serde(default)]
    retrieved_context: Option<RetrievedContext>,
}

#[derive(Deserialize)]
struct RetrievedContext {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}
