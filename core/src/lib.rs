// Tour Core Library
// Narrated audio tour orchestration: Plan → Research → Assemble → Synthesize

pub mod assemble;
pub mod client;
pub mod config;
pub mod pipeline;
pub mod planner;
pub mod progress;
pub mod research;
pub mod retry;
pub mod synth;
pub mod types;

// Export core types
pub use client::{CompletionRequest, ContentService, HttpContentClient};
pub use config::{PipelineConfig, ServiceConfig, VoiceMap};
pub use pipeline::{TourOutput, TourPipeline};
pub use progress::ProgressTracker;
pub use retry::RetryPolicy;
pub use types::{
    AudioArtifact, Interest, PlanSection, ProgressEvent, ResearchResult, Stage, TourPlan,
    TourRequest, TourScript, VoiceStyle,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TourError {
    #[error("Invalid tour request: {0}")]
    InvalidRequest(String),

    #[error("Content service rejected credentials")]
    Unauthorized,

    #[error("Transient upstream failure: {0}")]
    Upstream(String),

    #[error("Content service unavailable after {attempts} attempts: {message}")]
    ServiceUnavailable { attempts: u32, message: String },

    #[error("Malformed response from content service: {0}")]
    MalformedResponse(String),

    #[error("Speech synthesis failed on chunk {index} of {total}: {source}")]
    SynthesisChunkFailure {
        index: usize,
        total: usize,
        #[source]
        source: Box<TourError>,
    },

    #[error("Pipeline deadline of {0:?} exceeded")]
    DeadlineExceeded(std::time::Duration),

    #[error("Internal pipeline failure: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TourError {
    /// Whether the content service client may retry the failed call.
    /// Everything that is not an explicitly transient upstream failure
    /// surfaces immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, TourError::Upstream(_))
    }
}

pub type Result<T> = std::result::Result<T, TourError>;
