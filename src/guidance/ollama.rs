use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{build_prompt, parse_guidance, FirstAidGuidance, FirstAidGuide, GuidanceError};

const SYSTEM_PROMPT: &str = "You are an emergency first-aid assistant. Give short, safe, \
     actionable steps a bystander can follow until the ambulance arrives. \
     Always include calling emergency services when appropriate.";

/// Low temperature keeps the steps consistent between calls.
const TEMPERATURE: f32 = 0.2;

/// First-aid guidance from a local Ollama instance.
pub struct OllamaGuide {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaGuide {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, GuidanceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GuidanceError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs: timeout.as_secs(),
        })
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Response body from Ollama /api/generate
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl FirstAidGuide for OllamaGuide {
    fn guidance(&self, descriptor: &str) -> Result<FirstAidGuidance, GuidanceError> {
        if descriptor.trim().is_empty() {
            return Err(GuidanceError::EmptyDescriptor);
        }

        let url = format!("{}/api/generate", self.base_url);
        let prompt = build_prompt(descriptor);
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: &prompt,
            system: SYSTEM_PROMPT,
            stream: false,
            format: "json",
            options: GenerateOptions {
                temperature: TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    GuidanceError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    GuidanceError::Timeout(self.timeout_secs)
                } else {
                    GuidanceError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GuidanceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .map_err(|e| GuidanceError::MalformedResponse(e.to_string()))?;

        parse_guidance(&parsed.response)
    }
}
