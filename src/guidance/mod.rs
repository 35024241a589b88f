//! AI first-aid assistant.
//!
//! A descriptor such as "severe bleeding from forearm" goes in, structured
//! guidance comes out. The model is asked for JSON; the reply is parsed
//! leniently because local models wrap or decorate it.

pub mod ollama;

pub use ollama::OllamaGuide;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static STEP_NUMBERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:step\s*)?\d+\s*[.):-]\s*").expect("valid regex"));

const DEFAULT_TITLE: &str = "First aid guidance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceSeverity {
    Low,
    Medium,
    High,
}

impl GuidanceSeverity {
    /// Unrecognised labels map to Medium.
    fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "minor" => GuidanceSeverity::Low,
            "high" | "critical" | "severe" => GuidanceSeverity::High,
            _ => GuidanceSeverity::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstAidGuidance {
    pub title: String,
    pub steps: Vec<String>,
    pub severity: GuidanceSeverity,
}

#[derive(Error, Debug)]
pub enum GuidanceError {
    #[error("Emergency descriptor is empty")]
    EmptyDescriptor,

    #[error("Cannot connect to AI service at {0}")]
    Connection(String),

    #[error("AI request timed out after {0}s")]
    Timeout(u64),

    #[error("AI service returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("AI response could not be used: {0}")]
    MalformedResponse(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

/// Descriptor → first-aid steps. Single attempt, no retry.
pub trait FirstAidGuide: Send + Sync {
    fn guidance(&self, descriptor: &str) -> Result<FirstAidGuidance, GuidanceError>;
}

pub fn build_prompt(descriptor: &str) -> String {
    format!(
        "Provide immediate first aid steps for: {}. Be concise, use numbered lists, \
         and prioritize life-saving actions. Respond with a JSON object containing \
         \"title\" (string), \"steps\" (array of strings) and \"severity\" \
         (\"low\", \"medium\" or \"high\").",
        descriptor.trim()
    )
}

#[derive(Deserialize)]
struct RawGuidance {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    steps: Vec<serde_json::Value>,
    #[serde(default)]
    severity: Option<String>,
}

/// Parse model output into guidance. Tolerates code fences, prose around
/// the JSON object, numbered steps and step objects with a text field.
pub fn parse_guidance(text: &str) -> Result<FirstAidGuidance, GuidanceError> {
    let json = extract_json_object(text)
        .ok_or_else(|| GuidanceError::MalformedResponse("no JSON object in response".into()))?;
    let raw: RawGuidance = serde_json::from_str(json)
        .map_err(|e| GuidanceError::MalformedResponse(e.to_string()))?;

    let steps: Vec<String> = raw
        .steps
        .iter()
        .filter_map(step_text)
        .map(|s| STEP_NUMBERING.replace(s.trim(), "").trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if steps.is_empty() {
        return Err(GuidanceError::MalformedResponse("no steps in response".into()));
    }

    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let severity = raw
        .severity
        .as_deref()
        .map(GuidanceSeverity::parse_lenient)
        .unwrap_or(GuidanceSeverity::Medium);

    Ok(FirstAidGuidance { title, steps, severity })
}

fn step_text(value: &serde_json::Value) -> Option<&str> {
    match value {
        serde_json::Value::String(s) => Some(s.as_str()),
        serde_json::Value::Object(map) => ["text", "step", "instruction", "description"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_str())),
        _ => None,
    }
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
