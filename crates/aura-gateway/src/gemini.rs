//! Gemini `generateContent` client.

use crate::config::GatewayConfig;
use crate::prompt;
use async_trait::async_trait;
use aura_core::{
    AccessStatus, Analyzer, CapturedImage, EnrollmentProfile, SecurityReport, ThreatLevel,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("no API key configured (set GEMINI_API_KEY)")]
    MissingApiKey,
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("analysis service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response carried no candidate text")]
    EmptyResponse,
    #[error("malformed report: {0}")]
    Malformed(#[from] serde_json::Error),
}

// --- Request wire format ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    /// Base64 of the encoded image.
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

// --- Response wire format ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
    #[serde(default)]
    total_token_count: Option<u32>,
}

/// Report as the model returns it. Only `status` is mandatory.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReport {
    status: AccessStatus,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    threat_level: Option<ThreatLevel>,
    #[serde(default)]
    biometric_match: Option<f64>,
}

impl From<RawReport> for SecurityReport {
    fn from(raw: RawReport) -> Self {
        let threat_level = raw.threat_level.unwrap_or(match raw.status {
            AccessStatus::Authorized => ThreatLevel::Low,
            AccessStatus::Denied => ThreatLevel::High,
        });
        SecurityReport::new(
            raw.status,
            raw.message.unwrap_or_default(),
            threat_level,
            raw.biometric_match.unwrap_or(0.0),
        )
    }
}

/// Parse the model's JSON answer into a report.
///
/// Tolerates a Markdown code fence around the object.
pub fn parse_report(text: &str) -> Result<SecurityReport, GatewayError> {
    let raw: RawReport = serde_json::from_str(strip_code_fence(text))?;
    Ok(raw.into())
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().trim_end_matches("```").trim()
}

/// Analysis gateway talking to the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiGateway {
    config: GatewayConfig,
    client: Client,
}

impl GeminiGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        if config.api_key.trim().is_empty() {
            return Err(GatewayError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Assemble the request: task text, then the live scan and the three
    /// references, each preceded by its role label.
    pub fn build_request(
        &self,
        identifier: &str,
        scan: &CapturedImage,
        profile: &EnrollmentProfile,
    ) -> GenerateContentRequest {
        let mut parts = Vec::with_capacity(9);
        parts.push(Part::Text {
            text: prompt::task_text(identifier),
        });
        parts.push(Part::Text {
            text: prompt::CURRENT_SCAN_LABEL.to_string(),
        });
        parts.push(inline_image(scan));
        for (pose, image) in profile.references() {
            parts.push(Part::Text {
                text: prompt::reference_label(pose),
            });
            parts.push(inline_image(image));
        }

        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: prompt::SYSTEM_INSTRUCTION.to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                response_mime_type: "application/json",
                response_schema: prompt::response_schema(),
            },
        }
    }

    /// Run one comparison, surfacing every failure as an error.
    pub async fn compare(
        &self,
        identifier: &str,
        scan: &CapturedImage,
        profile: &EnrollmentProfile,
    ) -> Result<SecurityReport, GatewayError> {
        let request = self.build_request(identifier, scan, profile);
        let text = self.send(&request).await?;
        debug!(chars = text.len(), "parsing analysis report");
        parse_report(&text)
    }

    async fn send(&self, request: &GenerateContentRequest) -> Result<String, GatewayError> {
        debug!(
            model = %self.config.model,
            base_url = %self.config.base_url,
            "sending analysis request"
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        if let Some(usage) = &parsed.usage_metadata {
            info!(
                prompt_tokens = ?usage.prompt_token_count,
                response_tokens = ?usage.candidates_token_count,
                total_tokens = ?usage.total_token_count,
                "analysis token usage"
            );
        }

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or(GatewayError::EmptyResponse)?;
        if let Some(reason) = &candidate.finish_reason {
            debug!(finish_reason = %reason, "analysis candidate finished");
        }

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(GatewayError::EmptyResponse);
        }
        Ok(text)
    }
}

fn inline_image(image: &CapturedImage) -> Part {
    Part::InlineData {
        inline_data: Blob {
            mime_type: image.mime_type.clone(),
            data: BASE64.encode(&image.data),
        },
    }
}

#[async_trait]
impl Analyzer for GeminiGateway {
    async fn analyze(
        &self,
        identifier: &str,
        scan: &CapturedImage,
        profile: &EnrollmentProfile,
    ) -> SecurityReport {
        match self.compare(identifier, scan, profile).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "facial comparison failed");
                SecurityReport::link_failure()
            }
        }
    }
}
