//! Data model for a single tour request.
//!
//! Every entity here is created fresh per tour and discarded once the caller
//! consumes the final script and audio; nothing is shared across requests.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, TourError};

/// Content category the user selects to include in the tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interest {
    History,
    Architecture,
    Culture,
    Culinary,
}

impl Interest {
    pub const ALL: [Interest; 4] = [
        Interest::History,
        Interest::Architecture,
        Interest::Culture,
        Interest::Culinary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interest::History => "History",
            Interest::Architecture => "Architecture",
            Interest::Culture => "Culture",
            Interest::Culinary => "Culinary",
        }
    }

    /// Case-insensitive parse of an interest name.
    pub fn parse(s: &str) -> Option<Interest> {
        match s.trim().to_ascii_lowercase().as_str() {
            "history" => Some(Interest::History),
            "architecture" => Some(Interest::Architecture),
            "culture" => Some(Interest::Culture),
            "culinary" => Some(Interest::Culinary),
            _ => None,
        }
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tone/persona selector affecting both generation instructions and the
/// synthesized voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoiceStyle {
    Friendly,
    Professional,
    Enthusiastic,
    Calm,
}

impl VoiceStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceStyle::Friendly => "friendly",
            VoiceStyle::Professional => "professional",
            VoiceStyle::Enthusiastic => "enthusiastic",
            VoiceStyle::Calm => "calm",
        }
    }

    /// Human-readable label as presented to users.
    pub fn label(&self) -> &'static str {
        match self {
            VoiceStyle::Friendly => "Friendly & Casual",
            VoiceStyle::Professional => "Professional & Detailed",
            VoiceStyle::Enthusiastic => "Enthusiastic & Energetic",
            VoiceStyle::Calm => "Calm & Soothing",
        }
    }

    pub fn parse(s: &str) -> Option<VoiceStyle> {
        match s.trim().to_ascii_lowercase().as_str() {
            "friendly" => Some(VoiceStyle::Friendly),
            "professional" => Some(VoiceStyle::Professional),
            "enthusiastic" => Some(VoiceStyle::Enthusiastic),
            "calm" => Some(VoiceStyle::Calm),
            _ => None,
        }
    }
}

impl fmt::Display for VoiceStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller input for one tour. Immutable once validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourRequest {
    pub location: String,
    /// Order-preserving; duplicates are dropped during validation.
    pub interests: Vec<Interest>,
    pub duration_minutes: u32,
    pub voice_style: VoiceStyle,
}

impl TourRequest {
    pub fn new(
        location: impl Into<String>,
        interests: Vec<Interest>,
        duration_minutes: u32,
        voice_style: VoiceStyle,
    ) -> Self {
        Self {
            location: location.into(),
            interests,
            duration_minutes,
            voice_style,
        }
    }

    /// Validates the request against the configured duration bounds and
    /// de-duplicates interests while preserving first-seen order.
    pub fn validated(mut self, min_minutes: u32, max_minutes: u32) -> Result<Self> {
        if self.location.trim().is_empty() {
            return Err(TourError::InvalidRequest("location must not be empty".into()));
        }
        let mut seen = Vec::with_capacity(self.interests.len());
        for interest in self.interests.drain(..) {
            if !seen.contains(&interest) {
                seen.push(interest);
            }
        }
        self.interests = seen;
        if self.interests.is_empty() {
            return Err(TourError::InvalidRequest(
                "at least one interest must be selected".into(),
            ));
        }
        if self.duration_minutes < min_minutes || self.duration_minutes > max_minutes {
            return Err(TourError::InvalidRequest(format!(
                "duration must be between {} and {} minutes, got {}",
                min_minutes, max_minutes, self.duration_minutes
            )));
        }
        Ok(self)
    }
}

/// Time allocation for one interest within the tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSection {
    pub interest: Interest,
    pub allocated_minutes: u32,
}

/// Ordered time-allocation plan. Invariant: section minutes sum exactly to
/// the requested duration and every requested interest appears exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourPlan {
    pub sections: Vec<PlanSection>,
}

impl TourPlan {
    pub fn total_minutes(&self) -> u32 {
        self.sections.iter().map(|s| s.allocated_minutes).sum()
    }
}

/// Topic content produced by one researcher. Empty content marks a degraded
/// section (researcher failed after retries) rather than a fatal error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    pub interest: Interest,
    pub content: String,
    pub word_count: usize,
}

impl ResearchResult {
    pub fn degraded(interest: Interest) -> Self {
        Self {
            interest,
            content: String::new(),
            word_count: 0,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.word_count == 0
    }
}

/// The assembled narration, read-only after assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourScript {
    pub full_text: String,
    pub estimated_speaking_minutes: f32,
}

impl TourScript {
    /// Builds a script from raw text, estimating speaking time at the given
    /// words-per-minute rate.
    pub fn from_text(full_text: String, words_per_minute: u32) -> Self {
        let words = word_count(&full_text);
        let estimated_speaking_minutes = words as f32 / words_per_minute.max(1) as f32;
        Self {
            full_text,
            estimated_speaking_minutes,
        }
    }
}

/// Final synthesized audio, owned by the caller once returned.
#[derive(Clone)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub duration_estimate: Duration,
}

impl fmt::Debug for AudioArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioArtifact")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .field("duration_estimate", &self.duration_estimate)
            .finish()
    }
}

/// Pipeline phase. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Idle,
    Planning,
    Researching,
    Assembling,
    Synthesizing,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::Planning => "planning",
            Stage::Researching => "researching",
            Stage::Assembling => "assembling",
            Stage::Synthesizing => "synthesizing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Transient progress notification delivered to the caller's callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    /// Fraction of the whole pipeline completed, in `[0, 1]`.
    pub fraction_complete: f32,
    pub message: String,
}

pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation_rejects_empty_location() {
        let req = TourRequest::new("  ", vec![Interest::History], 5, VoiceStyle::Friendly);
        assert!(matches!(
            req.validated(1, 20),
            Err(TourError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_request_validation_dedups_preserving_order() {
        let req = TourRequest::new(
            "Paris",
            vec![
                Interest::Culinary,
                Interest::History,
                Interest::Culinary,
                Interest::History,
            ],
            5,
            VoiceStyle::Friendly,
        );
        let validated = req.validated(1, 20).unwrap();
        assert_eq!(
            validated.interests,
            vec![Interest::Culinary, Interest::History]
        );
    }

    #[test]
    fn test_request_validation_bounds_duration() {
        let req = TourRequest::new("Paris", vec![Interest::History], 25, VoiceStyle::Calm);
        assert!(req.validated(1, 20).is_err());

        let req = TourRequest::new("Paris", vec![Interest::History], 0, VoiceStyle::Calm);
        assert!(req.validated(1, 20).is_err());

        let req = TourRequest::new("Paris", vec![Interest::History], 20, VoiceStyle::Calm);
        assert!(req.validated(1, 20).is_ok());
    }

    #[test]
    fn test_script_speaking_estimate() {
        let text = "word ".repeat(300).trim_end().to_string();
        let script = TourScript::from_text(text, 150);
        assert!((script.estimated_speaking_minutes - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_interest_parse_roundtrip() {
        for interest in Interest::ALL {
            assert_eq!(Interest::parse(interest.as_str()), Some(interest));
            assert_eq!(
                Interest::parse(&interest.as_str().to_uppercase()),
                Some(interest)
            );
        }
        assert_eq!(Interest::parse("geology"), None);
    }
}
