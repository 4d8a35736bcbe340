use std::time::Duration;

use herogen_contracts::image::{EncodedImage, ImageError};
use herogen_contracts::wizard::GenerationRequest;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{resolve_api_key, GenerationConfig, API_KEY_VARS};
use crate::prompt::build_prompt;

/// Mime type used when the service returns image data without declaring one.
const FALLBACK_OUTPUT_MIME: &str = "image/png";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("API_KEY is not defined in the environment (checked {})", API_KEY_VARS.join(", "))]
    MissingCredential,
    #[error("source image is empty")]
    EmptyImage,
    #[error("generation request failed ({endpoint})")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("generation service returned {status}: {body}")]
    Service { status: u16, body: String },
    #[error("generation service returned an invalid payload")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("returned image data is invalid")]
    InvalidImage(#[from] ImageError),
    #[error("no image generated")]
    NoImage,
}

impl GenerationError {
    /// Configuration failures are shown as-is; everything else gets retry guidance.
    pub fn is_configuration(&self) -> bool {
        matches!(self, GenerationError::MissingCredential)
    }
}

pub trait GenerationClient {
    fn name(&self) -> &str;
    fn generate(&self, request: &GenerationRequest) -> Result<EncodedImage, GenerationError>;
}

pub struct GeminiClient {
    config: GenerationConfig,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(config: GenerationConfig) -> Self {
        // Generation can run for minutes; the caller waits for it.
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self { config, http }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub(crate) fn build_payload(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        let image = request.image();
        if image.raw_base64().is_empty() {
            return Err(GenerationError::EmptyImage);
        }
        Ok(json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": image.mime_type(),
                            "data": image.raw_base64(),
                        }
                    },
                    { "text": build_prompt(request.details()) },
                ],
            }],
            "generationConfig": {
                "temperature": self.config.temperature,
            },
        }))
    }

    fn post(&self, endpoint: &str, api_key: &str, payload: &Value) -> Result<HttpResponse, GenerationError> {
        self.http
            .post(endpoint)
            .query(&[("key", api_key)])
            .json(payload)
            .send()
            .map_err(|source| GenerationError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })
    }
}

impl GenerationClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &GenerationRequest) -> Result<EncodedImage, GenerationError> {
        let Some(api_key) = resolve_api_key() else {
            return Err(GenerationError::MissingCredential);
        };
        let payload = self.build_payload(request)?;
        let endpoint = self.config.endpoint();
        info!(
            target: "gemini",
            model = %self.config.model,
            hero = %request.details().hero_name,
            "submitting generation request"
        );

        let response = self.post(&endpoint, &api_key, &payload)?;
        let response_payload = response_json_or_error(&endpoint, response)?;
        let image = extract_first_image(&response_payload)?;
        debug!(target: "gemini", mime = image.mime_type(), "generation returned an image");
        Ok(image)
    }
}

fn response_json_or_error(endpoint: &str, response: HttpResponse) -> Result<Value, GenerationError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|source| GenerationError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
    if !status.is_success() {
        return Err(GenerationError::Service {
            status: status.as_u16(),
            body: truncate_text(&body, 512),
        });
    }
    Ok(serde_json::from_str(&body)?)
}

/// First part of the first candidate that carries inline image data.
pub(crate) fn extract_first_image(response_payload: &Value) -> Result<EncodedImage, GenerationError> {
    let parts = response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for part in parts {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| value.starts_with("image/"))
            .unwrap_or(FALLBACK_OUTPUT_MIME);
        return Ok(EncodedImage::new(mime_type, data)?);
    }

    Err(GenerationError::NoImage)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
