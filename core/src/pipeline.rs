//! Caller-facing tour pipeline: plan → research → assemble → synthesize.
//!
//! Researchers for distinct interests run concurrently and are all joined
//! before assembly starts. Dropping the future returned by [`TourPipeline::run`]
//! cancels the tour: in-flight researcher tasks are aborted with their
//! `JoinSet` and no further stage starts.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::client::{ContentService, HttpContentClient};
use crate::config::PipelineConfig;
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::types::{
    AudioArtifact, Interest, ProgressEvent, ResearchResult, Stage, TourRequest, TourScript,
};
use crate::{assemble, planner, research, synth};
use crate::{Result, TourError};

/// Everything the caller gets back for one tour. `degraded_interests` lists
/// topics whose researchers failed after retries and were omitted from the
/// script.
#[derive(Debug)]
pub struct TourOutput {
    pub script: TourScript,
    pub audio: AudioArtifact,
    pub degraded_interests: Vec<Interest>,
}

impl TourOutput {
    pub fn is_degraded(&self) -> bool {
        !self.degraded_interests.is_empty()
    }
}

/// One pipeline instance may serve many tours; all per-tour state lives in
/// the `run` call.
pub struct TourPipeline {
    client: Arc<dyn ContentService>,
    cfg: PipelineConfig,
}

impl TourPipeline {
    /// Builds the HTTP-backed pipeline. The voice map is validated here, at
    /// startup, not at synthesis time.
    pub fn new(cfg: PipelineConfig) -> Result<Self> {
        cfg.voices.validate()?;
        let client = HttpContentClient::new(cfg.service.clone(), cfg.retry.clone())?;
        Ok(Self {
            client: Arc::new(client),
            cfg,
        })
    }

    /// Same pipeline over an injected content service (tests, alternative
    /// transports).
    pub fn with_client(client: Arc<dyn ContentService>, cfg: PipelineConfig) -> Result<Self> {
        cfg.voices.validate()?;
        Ok(Self { client, cfg })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Runs one tour end to end. The callback receives every progress event
    /// in order, ending with `done` or `failed`.
    pub async fn run<F>(&self, request: TourRequest, on_progress: F) -> Result<TourOutput>
    where
        F: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        let callback: ProgressCallback = Arc::new(on_progress);
        let mut tracker = ProgressTracker::new(self.cfg.expected_total(), Some(callback));

        let request = match request
            .validated(self.cfg.min_duration_minutes, self.cfg.max_duration_minutes)
        {
            Ok(request) => request,
            Err(err) => {
                tracker.fail(&err.to_string());
                return Err(err);
            }
        };

        let result = match self.cfg.deadline() {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.run_stages(&request, &mut tracker)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(TourError::DeadlineExceeded(deadline)),
                }
            }
            None => self.run_stages(&request, &mut tracker).await,
        };

        match result {
            Ok(output) => {
                tracker.finish("Tour ready");
                info!(
                    target = "pipeline",
                    location = %request.location,
                    estimated_minutes = output.script.estimated_speaking_minutes,
                    audio_bytes = output.audio.bytes.len(),
                    degraded = output.degraded_interests.len(),
                    "Tour complete"
                );
                Ok(output)
            }
            Err(err) => {
                tracker.fail(&err.to_string());
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        request: &TourRequest,
        tracker: &mut ProgressTracker,
    ) -> Result<TourOutput> {
        let temperature = self.cfg.service.temperature;

        tracker.on_stage_start(Stage::Planning, "Planning your personalized tour...");
        let plan = planner::plan(
            self.client.as_ref(),
            &request.location,
            &request.interests,
            request.duration_minutes,
            temperature,
        )
        .await?;
        tracker.on_stage_end(Stage::Planning);

        tracker.on_stage_start(Stage::Researching, "Researching your selected topics...");
        let mut tasks: JoinSet<Result<ResearchResult>> = JoinSet::new();
        for section in &plan.sections {
            let client = Arc::clone(&self.client);
            let location = request.location.clone();
            let interest = section.interest;
            let allocated_minutes = section.allocated_minutes;
            let words_per_minute = self.cfg.words_per_minute;
            tasks.spawn(async move {
                research::research(
                    client.as_ref(),
                    &location,
                    interest,
                    allocated_minutes,
                    words_per_minute,
                    temperature,
                )
                .await
            });
        }

        // Results are keyed by interest, so completion order is irrelevant.
        let mut results: HashMap<Interest, ResearchResult> =
            HashMap::with_capacity(plan.sections.len());
        while let Some(joined) = tasks.join_next().await {
            // A JoinError means the task panicked or was aborted, not that
            // the upstream misbehaved; it must not look retryable.
            let result =
                joined.map_err(|e| TourError::Internal(format!("research task failed: {e}")))??;
            results.insert(result.interest, result);
        }

        let degraded_interests: Vec<Interest> = plan
            .sections
            .iter()
            .map(|s| s.interest)
            .filter(|i| results.get(i).map(|r| r.is_degraded()).unwrap_or(true))
            .collect();
        if !degraded_interests.is_empty() {
            warn!(
                target = "pipeline",
                degraded = ?degraded_interests,
                "Continuing with degraded sections"
            );
        }
        tracker.on_stage_end(Stage::Researching);

        tracker.on_stage_start(Stage::Assembling, "Creating your personalized tour...");
        let script = assemble::assemble(
            self.client.as_ref(),
            &request.location,
            &plan,
            &results,
            request.voice_style,
            self.cfg.words_per_minute,
            temperature,
        )
        .await?;
        let requested = request.duration_minutes as f32;
        if (script.estimated_speaking_minutes - requested).abs()
            > requested * self.cfg.speaking_tolerance
        {
            warn!(
                target = "pipeline",
                estimated = script.estimated_speaking_minutes,
                requested,
                "Script speaking estimate outside tolerance"
            );
        }
        tracker.on_stage_end(Stage::Assembling);

        tracker.on_stage_start(Stage::Synthesizing, "Generating audio narration...");
        let voice = self.cfg.voices.voice_for(request.voice_style);
        let audio = synth::synthesize_script(
            self.client.as_ref(),
            &script,
            voice,
            self.cfg.max_synthesis_bytes,
            &self.cfg.mime_type(),
        )
        .await?;
        tracker.on_stage_end(Stage::Synthesizing);

        Ok(TourOutput {
            script,
            audio,
            degraded_interests,
        })
    }
}
