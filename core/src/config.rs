//! Pipeline configuration, loaded from environment variables with caller
//! overrides.

use std::collections::HashMap;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::types::VoiceStyle;
use crate::{Result, TourError};

/// Connection settings for the upstream content service (OpenAI-compatible
/// chat completion and speech synthesis endpoints). Read-only after
/// construction.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String, // e.g., https://api.netmind.ai/inference-api/openai/v1
    pub api_key: Option<String>,
    pub chat_model: String,
    pub tts_model: String,
    pub request_timeout_ms: u64,
    pub temperature: f32,
    /// Output container requested from the speech endpoint.
    pub audio_format: String,
    pub tts_speed: f32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("TOUR_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.netmind.ai/inference-api/openai/v1".to_string()),
            api_key: std::env::var("TOUR_API_KEY").ok().filter(|s| !s.is_empty()),
            chat_model: std::env::var("TOUR_CHAT_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "openai/gpt-oss-20b".to_string()),
            tts_model: std::env::var("TOUR_TTS_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "ResembleAI/Chatterbox".to_string()),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            temperature: std::env::var("TOUR_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.7),
            audio_format: std::env::var("TOUR_AUDIO_FORMAT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "mp3".to_string()),
            tts_speed: 1.0,
        }
    }
}

/// Immutable mapping from voice style to the provider's voice identifier,
/// validated when the pipeline is constructed. An unmapped style resolves to
/// the default voice instead of failing.
#[derive(Debug, Clone)]
pub struct VoiceMap {
    voices: HashMap<VoiceStyle, String>,
    default_voice: String,
}

impl Default for VoiceMap {
    fn default() -> Self {
        let mut voices = HashMap::new();
        voices.insert(VoiceStyle::Friendly, "alloy".to_string());
        voices.insert(VoiceStyle::Professional, "onyx".to_string());
        voices.insert(VoiceStyle::Enthusiastic, "nova".to_string());
        voices.insert(VoiceStyle::Calm, "shimmer".to_string());
        Self {
            voices,
            default_voice: "alloy".to_string(),
        }
    }
}

impl VoiceMap {
    pub fn insert(&mut self, style: VoiceStyle, voice_id: impl Into<String>) {
        self.voices.insert(style, voice_id.into());
    }

    pub fn set_default_voice(&mut self, voice_id: impl Into<String>) {
        self.default_voice = voice_id.into();
    }

    pub fn voice_for(&self, style: VoiceStyle) -> &str {
        self.voices
            .get(&style)
            .map(String::as_str)
            .unwrap_or(&self.default_voice)
    }

    /// Rejects empty voice identifiers. Runs once at pipeline construction.
    pub fn validate(&self) -> Result<()> {
        if self.default_voice.trim().is_empty() {
            return Err(TourError::InvalidRequest(
                "voice map default voice must not be empty".into(),
            ));
        }
        for (style, voice) in &self.voices {
            if voice.trim().is_empty() {
                return Err(TourError::InvalidRequest(format!(
                    "voice map entry for style '{style}' must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Everything the pipeline needs for one tour run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub service: ServiceConfig,
    pub retry: RetryPolicy,
    pub voices: VoiceMap,
    /// Accepted request duration range, inclusive.
    pub min_duration_minutes: u32,
    pub max_duration_minutes: u32,
    /// Average natural speaking rate used for word budgets and estimates.
    pub words_per_minute: u32,
    /// Provider-imposed length limit per speech-synthesis call, in bytes
    /// of UTF-8 text.
    pub max_synthesis_bytes: usize,
    /// Allowed deviation between requested duration and the assembled
    /// script's speaking estimate before a warning is logged.
    pub speaking_tolerance: f32,
    /// Expected wall time for a whole run; feeds remaining-time estimation.
    pub expected_total_secs: u64,
    /// Optional pipeline-level deadline as a multiple of the expected total.
    pub deadline_margin: Option<f32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            retry: RetryPolicy::default(),
            voices: VoiceMap::default(),
            min_duration_minutes: 1,
            max_duration_minutes: 20,
            words_per_minute: 150,
            max_synthesis_bytes: 4096,
            speaking_tolerance: 0.2,
            expected_total_secs: 120,
            deadline_margin: None,
        }
    }
}

impl PipelineConfig {
    pub fn expected_total(&self) -> Duration {
        Duration::from_secs(self.expected_total_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_margin
            .map(|margin| self.expected_total().mul_f32(margin.max(1.0)))
    }

    pub fn mime_type(&self) -> String {
        match self.service.audio_format.as_str() {
            "mp3" => "audio/mpeg".to_string(),
            "wav" => "audio/wav".to_string(),
            "opus" => "audio/opus".to_string(),
            "flac" => "audio/flac".to_string(),
            other => format!("audio/{other}"),
        }
    }
}
