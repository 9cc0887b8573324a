//! Stage progress tracking.
//!
//! Stage durations are dominated by upstream network latency, so remaining
//! time is estimated from a fixed table of expected relative stage weights
//! rather than live measurement.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::types::{ProgressEvent, Stage};

/// Expected relative share of wall time per stage.
fn stage_weight(stage: Stage) -> f32 {
    match stage {
        Stage::Planning => 0.10,
        Stage::Researching => 0.40,
        Stage::Assembling => 0.20,
        Stage::Synthesizing => 0.30,
        Stage::Idle | Stage::Done | Stage::Failed => 0.0,
    }
}

/// Callback invoked for every progress event, in order.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Ordered per-tour log of progress events plus remaining-time estimation.
/// One tracker per active tour; discarded with the run.
pub struct ProgressTracker {
    events: Vec<ProgressEvent>,
    completed: f32,
    current: Option<Stage>,
    expected_total: Duration,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new(expected_total: Duration, callback: Option<ProgressCallback>) -> Self {
        Self {
            events: Vec::new(),
            completed: 0.0,
            current: None,
            expected_total,
            callback,
        }
    }

    pub fn on_stage_start(&mut self, stage: Stage, message: &str) {
        self.current = Some(stage);
        self.emit(stage, self.completed, message);
    }

    pub fn on_stage_end(&mut self, stage: Stage) {
        self.completed = (self.completed + stage_weight(stage)).min(1.0);
        self.current = None;
        self.emit(stage, self.completed, &format!("{stage} complete"));
    }

    /// Terminal success event.
    pub fn finish(&mut self, message: &str) {
        self.completed = 1.0;
        self.current = Some(Stage::Done);
        self.emit(Stage::Done, 1.0, message);
    }

    /// Terminal failure event; keeps the fraction reached so far.
    pub fn fail(&mut self, message: &str) {
        self.current = Some(Stage::Failed);
        self.emit(Stage::Failed, self.completed, message);
    }

    pub fn fraction_complete(&self) -> f32 {
        self.completed
    }

    pub fn current_stage(&self) -> Stage {
        self.current.unwrap_or(Stage::Idle)
    }

    /// Remaining time from fixed expectations: expected total scaled by the
    /// uncompleted weight fraction.
    pub fn estimate_remaining(&self) -> Duration {
        self.expected_total
            .mul_f32((1.0 - self.completed).clamp(0.0, 1.0))
    }

    pub fn events(&self) -> &[ProgressEvent] {
        &self.events
    }

    fn emit(&mut self, stage: Stage, fraction_complete: f32, message: &str) {
        let event = ProgressEvent {
            stage,
            fraction_complete,
            message: message.to_string(),
        };
        info!(
            target = "progress",
            stage = %stage,
            fraction = fraction_complete,
            "{message}"
        );
        if let Some(callback) = &self.callback {
            callback(event.clone());
        }
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_weights_sum_to_one() {
        let sum: f32 = [
            Stage::Planning,
            Stage::Researching,
            Stage::Assembling,
            Stage::Synthesizing,
        ]
        .into_iter()
        .map(stage_weight)
        .sum();
        assert!((sum - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_estimate_remaining_scales_with_completed_weight() {
        let mut tracker = ProgressTracker::new(Duration::from_secs(100), None);
        assert_eq!(tracker.estimate_remaining(), Duration::from_secs(100));
        assert_eq!(tracker.current_stage(), Stage::Idle);

        tracker.on_stage_start(Stage::Planning, "planning");
        assert_eq!(tracker.current_stage(), Stage::Planning);
        tracker.on_stage_end(Stage::Planning);
        tracker.on_stage_start(Stage::Researching, "researching");
        tracker.on_stage_end(Stage::Researching);

        // planning 10% + researching 40% complete → 50 seconds remain
        assert_eq!(tracker.estimate_remaining(), Duration::from_secs(50));
    }

    #[test]
    fn test_events_are_ordered_and_fractions_monotone() {
        let mut tracker = ProgressTracker::new(Duration::from_secs(60), None);
        for stage in [
            Stage::Planning,
            Stage::Researching,
            Stage::Assembling,
            Stage::Synthesizing,
        ] {
            tracker.on_stage_start(stage, "start");
            tracker.on_stage_end(stage);
        }
        tracker.finish("done");

        let fractions: Vec<f32> = tracker
            .events()
            .iter()
            .map(|e| e.fraction_complete)
            .collect();
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(tracker.events().last().unwrap().stage, Stage::Done);
        assert_eq!(tracker.current_stage(), Stage::Done);
        assert!((tracker.fraction_complete() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_callback_receives_every_event() {
        use std::sync::Mutex;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback =
            Arc::new(move |event| sink.lock().unwrap().push(event.stage));

        let mut tracker = ProgressTracker::new(Duration::from_secs(60), Some(callback));
        tracker.on_stage_start(Stage::Planning, "start");
        tracker.fail("boom");

        assert_eq!(*seen.lock().unwrap(), vec![Stage::Planning, Stage::Failed]);
    }
}
