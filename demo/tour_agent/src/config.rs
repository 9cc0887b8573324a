use std::fs;
use std::path::{Path, PathBuf};

use tour_core::{PipelineConfig, VoiceStyle};

/// High-level configuration for the tour agent demo.
#[derive(Clone, Debug)]
pub struct TourAgentConfig {
    pub pipeline: PipelineConfig,
    /// Where the synthesized audio is written.
    pub audio_out: PathBuf,
    /// Where the transcript is written.
    pub transcript_out: PathBuf,
}

impl Default for TourAgentConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            audio_out: PathBuf::from("tour.mp3"),
            transcript_out: PathBuf::from("tour.txt"),
        }
    }
}

impl TourAgentConfig {
    /// Load configuration from a TOML file (path via TOUR_AGENT_CONFIG or
    /// ./tour_agent.toml), overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("TOUR_AGENT_CONFIG").unwrap_or_else(|_| "tour_agent.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "tour_agent", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<TourAgentToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target = "tour_agent", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "tour_agent", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TourAgentToml {
    pub audio_out: Option<PathBuf>,
    pub transcript_out: Option<PathBuf>,
    pub service: Option<ServiceToml>,
    pub retry: Option<RetryToml>,
    pub pipeline: Option<PipelineToml>,
    pub voices: Option<VoicesToml>,
}

impl TourAgentToml {
    fn overlay(self, mut base: TourAgentConfig) -> TourAgentConfig {
        if let Some(p) = self.audio_out {
            base.audio_out = p;
        }
        if let Some(p) = self.transcript_out {
            base.transcript_out = p;
        }
        if let Some(s) = self.service {
            s.apply(&mut base.pipeline);
        }
        if let Some(r) = self.retry {
            r.apply(&mut base.pipeline);
        }
        if let Some(p) = self.pipeline {
            p.apply(&mut base.pipeline);
        }
        if let Some(v) = self.voices {
            v.apply(&mut base.pipeline);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ServiceToml {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub chat_model: Option<String>,
    pub tts_model: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub audio_format: Option<String>,
    pub tts_speed: Option<f32>,
}
impl ServiceToml {
    fn apply(self, cfg: &mut PipelineConfig) {
        let s = &mut cfg.service;
        if let Some(x) = self.base_url {
            s.base_url = x;
        }
        if let Some(x) = self.api_key {
            s.api_key = Some(x);
        }
        if let Some(x) = self.chat_model {
            s.chat_model = x;
        }
        if let Some(x) = self.tts_model {
            s.tts_model = x;
        }
        if let Some(x) = self.request_timeout_ms {
            s.request_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            s.temperature = x;
        }
        if let Some(x) = self.audio_format {
            s.audio_format = x;
        }
        if let Some(x) = self.tts_speed {
            s.tts_speed = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct RetryToml {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter_factor: Option<f32>,
}
impl RetryToml {
    fn apply(self, cfg: &mut PipelineConfig) {
        let r = &mut cfg.retry;
        if let Some(x) = self.max_attempts {
            r.max_attempts = x.max(1);
        }
        if let Some(x) = self.initial_delay_ms {
            r.initial_delay_ms = x;
        }
        if let Some(x) = self.max_delay_ms {
            r.max_delay_ms = x;
        }
        if let Some(x) = self.jitter_factor {
            r.jitter_factor = x.clamp(0.0, 1.0);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct PipelineToml {
    pub min_duration_minutes: Option<u32>,
    pub max_duration_minutes: Option<u32>,
    pub words_per_minute: Option<u32>,
    pub max_synthesis_bytes: Option<usize>,
    pub speaking_tolerance: Option<f32>,
    pub expected_total_secs: Option<u64>,
    pub deadline_margin: Option<f32>,
}
impl PipelineToml {
    fn apply(self, cfg: &mut PipelineConfig) {
        if let Some(x) = self.min_duration_minutes {
            cfg.min_duration_minutes = x;
        }
        if let Some(x) = self.max_duration_minutes {
            cfg.max_duration_minutes = x;
        }
        if let Some(x) = self.words_per_minute {
            cfg.words_per_minute = x.max(1);
        }
        if let Some(x) = self.max_synthesis_bytes {
            cfg.max_synthesis_bytes = x.max(1);
        }
        if let Some(x) = self.speaking_tolerance {
            cfg.speaking_tolerance = x;
        }
        if let Some(x) = self.expected_total_secs {
            cfg.expected_total_secs = x;
        }
        if let Some(x) = self.deadline_margin {
            cfg.deadline_margin = Some(x);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct VoicesToml {
    pub friendly: Option<String>,
    pub professional: Option<String>,
    pub enthusiastic: Option<String>,
    pub calm: Option<String>,
    pub default_voice: Option<String>,
}
impl VoicesToml {
    fn apply(self, cfg: &mut PipelineConfig) {
        if let Some(x) = self.friendly {
            cfg.voices.insert(VoiceStyle::Friendly, x);
        }
        if let Some(x) = self.professional {
            cfg.voices.insert(VoiceStyle::Professional, x);
        }
        if let Some(x) = self.enthusiastic {
            cfg.voices.insert(VoiceStyle::Enthusiastic, x);
        }
        if let Some(x) = self.calm {
            cfg.voices.insert(VoiceStyle::Calm, x);
        }
        if let Some(x) = self.default_voice {
            cfg.voices.set_default_voice(x);
        }
    }
}
