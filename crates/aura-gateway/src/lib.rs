//! aura-gateway — Analysis gateway backed by Google Gemini.
//!
//! Packages the live scan and the three enrollment references into one
//! `generateContent` call with a strict JSON response schema. Every failure
//! is folded into [`aura_core::SecurityReport::link_failure`]; no retries.

pub mod config;
pub mod gemini;
pub mod prompt;

pub use config::GatewayConfig;
pub use gemini::{parse_report, GatewayError, GeminiGateway};
