use crate::engine::EngineSettings;
use aura_core::choreography::DEFAULT_TIMINGS_MS;
use aura_core::Choreography;
use aura_gateway::config::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT_SECS,
};
use aura_gateway::GatewayConfig;
use std::str::FromStr;
use std::time::Duration;

/// Terminal configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Requested capture resolution.
    pub frame_width: u32,
    pub frame_height: u32,
    /// JPEG quality for stills, 1-100.
    pub jpeg_quality: u8,
    /// Frames discarded after opening the camera.
    pub warmup_frames: usize,
    /// Holds for the mapping, collecting and capturing steps.
    pub scan_timings: [Duration; 3],
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub temperature: f32,
    /// Timeout in seconds for one analysis call, at least 1.
    pub analysis_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `AURA_*` / `GEMINI_API_KEY` with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default_timings = DEFAULT_TIMINGS_MS.map(Duration::from_millis);

        Self {
            camera_device: lookup("AURA_CAMERA_DEVICE").unwrap_or_else(|| "/dev/video0".to_string()),
            frame_width: env_or(&lookup, "AURA_FRAME_WIDTH", 1280),
            frame_height: env_or(&lookup, "AURA_FRAME_HEIGHT", 720),
            jpeg_quality: env_or(&lookup, "AURA_JPEG_QUALITY", aura_hw::frame::DEFAULT_JPEG_QUALITY)
                .clamp(1, 100),
            warmup_frames: env_or(&lookup, "AURA_WARMUP_FRAMES", 4),
            scan_timings: lookup("AURA_SCAN_TIMINGS_MS")
                .and_then(|v| parse_timings(&v))
                .unwrap_or(default_timings),
            api_key: lookup("GEMINI_API_KEY")
                .or_else(|| lookup("API_KEY"))
                .unwrap_or_default(),
            model: lookup("AURA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base_url: lookup("AURA_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            temperature: env_or(&lookup, "AURA_TEMPERATURE", DEFAULT_TEMPERATURE),
            analysis_timeout_secs: env_or(
                &lookup,
                "AURA_ANALYSIS_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )
            .max(1),
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.api_base_url.clone(),
            temperature: self.temperature,
            timeout_secs: self.analysis_timeout_secs,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            device: self.camera_device.clone(),
            width: self.frame_width,
            height: self.frame_height,
            jpeg_quality: self.jpeg_quality,
            warmup_frames: self.warmup_frames,
        }
    }

    pub fn choreography(&self) -> Choreography {
        Choreography::with_timings(self.scan_timings)
    }
}

fn env_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse `"1000,1500,1000"` into three holds. Anything else is rejected.
fn parse_timings(value: &str) -> Option<[Duration; 3]> {
    let ms: Vec<u64> = value
        .split(',')
        .map(|part| part.trim().parse().ok())
        .collect::<Option<_>>()?;
    let [a, b, c]: [u64; 3] = ms.try_into().ok()?;
    Some([a, b, c].map(Duration::from_millis))
}
