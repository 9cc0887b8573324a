//! Tour planning: one structured-itinerary completion with a deterministic
//! equal-division fallback.
//!
//! The fallback needs no network round-trip, so an unusable or unavailable
//! model response degrades the plan quality, never the tour.

use serde::Deserialize;
use tracing::warn;

use crate::client::{CompletionRequest, ContentService};
use crate::types::{Interest, PlanSection, TourPlan};
use crate::{Result, TourError};

const PLANNER_SYSTEM: &str =
    "You are an expert tour planner. Respond with strict JSON only, no prose.";

const PLAN_MAX_TOKENS: u32 = 512;

/// Produces the time-allocation plan for the requested interests.
/// Only an authentication failure aborts; any other failure falls back to
/// equal division.
pub async fn plan(
    client: &dyn ContentService,
    location: &str,
    interests: &[Interest],
    duration_minutes: u32,
    temperature: f32,
) -> Result<TourPlan> {
    let request = CompletionRequest {
        system: PLANNER_SYSTEM.to_string(),
        user: planner_prompt(location, interests, duration_minutes),
        max_tokens: PLAN_MAX_TOKENS,
        temperature,
    };

    match client.complete(&request).await {
        Ok(text) => match parse_itinerary(&text, interests) {
            Some(raw) => Ok(TourPlan {
                sections: normalize(raw, interests, duration_minutes),
            }),
            None => {
                warn!(
                    target = "planner",
                    "Unusable itinerary response; falling back to equal division"
                );
                Ok(equal_division(interests, duration_minutes))
            }
        },
        Err(TourError::Unauthorized) => Err(TourError::Unauthorized),
        Err(err) => {
            warn!(
                target = "planner",
                error = %err,
                "Planning call failed; falling back to equal division"
            );
            Ok(equal_division(interests, duration_minutes))
        }
    }
}

fn planner_prompt(location: &str, interests: &[Interest], duration_minutes: u32) -> String {
    let interest_list = interests
        .iter()
        .map(|i| i.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Plan a walking audio tour of {location} lasting {duration_minutes} minutes, \
         covering these interests in order: {interest_list}.\n\
         Allocate minutes to each interest so they sum to {duration_minutes}.\n\
         Respond with JSON of the shape \
         {{\"sections\":[{{\"interest\":\"History\",\"minutes\":5}}]}} \
         listing every interest exactly once."
    )
}

#[derive(Debug, Deserialize)]
struct ItineraryResponse {
    sections: Vec<ItinerarySection>,
}

#[derive(Debug, Deserialize)]
struct ItinerarySection {
    interest: String,
    minutes: f64,
}

/// Extracts the itinerary JSON (which may be embedded in prose) and checks it
/// covers every requested interest exactly once with positive minutes.
/// Returned allocations follow the request order, not the model's.
fn parse_itinerary(text: &str, interests: &[Interest]) -> Option<Vec<(Interest, f64)>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    let parsed: ItineraryResponse = serde_json::from_str(&text[start..=end]).ok()?;

    let mut allocations: Vec<(Interest, f64)> = Vec::with_capacity(parsed.sections.len());
    for section in &parsed.sections {
        let interest = Interest::parse(&section.interest)?;
        if section.minutes <= 0.0 || allocations.iter().any(|(i, _)| *i == interest) {
            return None;
        }
        allocations.push((interest, section.minutes));
    }

    if allocations.len() != interests.len()
        || !interests.iter().all(|i| allocations.iter().any(|(a, _)| a == i))
    {
        return None;
    }

    // Reorder to the request's interest order for deterministic output.
    let ordered = interests
        .iter()
        .map(|i| {
            let minutes = allocations
                .iter()
                .find(|(a, _)| a == i)
                .map(|(_, m)| *m)
                .unwrap_or(0.0);
            (*i, minutes)
        })
        .collect();
    Some(ordered)
}

/// Scales raw allocations so section minutes sum exactly to the requested
/// duration; the largest section absorbs the rounding remainder.
fn normalize(raw: Vec<(Interest, f64)>, interests: &[Interest], duration_minutes: u32) -> Vec<PlanSection> {
    let total: f64 = raw.iter().map(|(_, m)| m).sum();
    if total <= 0.0 {
        return equal_division(interests, duration_minutes).sections;
    }

    let mut sections: Vec<PlanSection> = raw
        .iter()
        .map(|(interest, minutes)| PlanSection {
            interest: *interest,
            allocated_minutes: ((minutes / total) * duration_minutes as f64).round() as u32,
        })
        .collect();

    let sum: i64 = sections.iter().map(|s| s.allocated_minutes as i64).sum();
    let remainder = duration_minutes as i64 - sum;
    if remainder != 0 {
        let largest = sections
            .iter()
            .enumerate()
            .max_by_key(|(_, s)| s.allocated_minutes)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        let adjusted = sections[largest].allocated_minutes as i64 + remainder;
        if adjusted < 0 {
            return equal_division(interests, duration_minutes).sections;
        }
        sections[largest].allocated_minutes = adjusted as u32;
    }
    sections
}

/// Deterministic fallback: duration split evenly across interests in request
/// order, earlier sections taking the remainder.
pub fn equal_division(interests: &[Interest], duration_minutes: u32) -> TourPlan {
    let n = interests.len().max(1) as u32;
    let base = duration_minutes / n;
    let remainder = duration_minutes % n;
    let sections = interests
        .iter()
        .enumerate()
        .map(|(idx, interest)| PlanSection {
            interest: *interest,
            allocated_minutes: base + u32::from((idx as u32) < remainder),
        })
        .collect();
    TourPlan { sections }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockContentService;

    const PARIS: [Interest; 2] = [Interest::History, Interest::Culinary];

    #[test]
    fn test_equal_division_sums_exactly() {
        let interests = [Interest::History, Interest::Architecture, Interest::Culture];
        let plan = equal_division(&interests, 10);
        assert_eq!(plan.total_minutes(), 10);
        assert_eq!(
            plan.sections.iter().map(|s| s.allocated_minutes).collect::<Vec<_>>(),
            vec![4, 3, 3]
        );
    }

    #[test]
    fn test_parse_itinerary_embedded_in_prose() {
        let text = r#"Here is your plan:
            {"sections":[{"interest":"Culinary","minutes":6},{"interest":"History","minutes":4}]}
            Enjoy!"#;
        let allocations = parse_itinerary(text, &PARIS).unwrap();
        // Reordered to request order.
        assert_eq!(allocations[0], (Interest::History, 4.0));
        assert_eq!(allocations[1], (Interest::Culinary, 6.0));
    }

    #[test]
    fn test_parse_itinerary_rejects_missing_interest() {
        let text = r#"{"sections":[{"interest":"History","minutes":10}]}"#;
        assert!(parse_itinerary(text, &PARIS).is_none());
    }

    #[test]
    fn test_parse_itinerary_rejects_duplicates_and_unknowns() {
        let dup = r#"{"sections":[{"interest":"History","minutes":5},{"interest":"History","minutes":5}]}"#;
        assert!(parse_itinerary(dup, &PARIS).is_none());
        let unknown = r#"{"sections":[{"interest":"Geology","minutes":5},{"interest":"History","minutes":5}]}"#;
        assert!(parse_itinerary(unknown, &PARIS).is_none());
    }

    #[test]
    fn test_normalize_absorbs_remainder_into_largest() {
        let raw = vec![(Interest::History, 7.0), (Interest::Culinary, 3.0)];
        let sections = normalize(raw, &PARIS, 10);
        assert_eq!(sections.iter().map(|s| s.allocated_minutes).sum::<u32>(), 10);

        // Proportions that round away from the target sum.
        let raw = vec![
            (Interest::History, 1.0),
            (Interest::Architecture, 1.0),
            (Interest::Culture, 1.0),
        ];
        let interests = [Interest::History, Interest::Architecture, Interest::Culture];
        let sections = normalize(raw, &interests, 10);
        assert_eq!(sections.iter().map(|s| s.allocated_minutes).sum::<u32>(), 10);
    }

    #[tokio::test]
    async fn test_plan_parses_model_itinerary() {
        let mut client = MockContentService::new();
        client.expect_complete().returning(|_| {
            Ok(r#"{"sections":[{"interest":"History","minutes":7},{"interest":"Culinary","minutes":3}]}"#
                .to_string())
        });
        let plan = plan(&client, "Paris", &PARIS, 10, 0.7).await.unwrap();
        assert_eq!(plan.total_minutes(), 10);
        assert_eq!(plan.sections[0].interest, Interest::History);
        assert_eq!(plan.sections[0].allocated_minutes, 7);
    }

    #[tokio::test]
    async fn test_plan_falls_back_on_service_unavailable() {
        let mut client = MockContentService::new();
        client.expect_complete().returning(|_| {
            Err(TourError::ServiceUnavailable {
                attempts: 3,
                message: "status 503".into(),
            })
        });
        let plan = plan(&client, "Paris", &PARIS, 10, 0.7).await.unwrap();
        assert_eq!(plan.total_minutes(), 10);
        assert_eq!(
            plan.sections.iter().map(|s| s.allocated_minutes).collect::<Vec<_>>(),
            vec![5, 5]
        );
    }

    #[tokio::test]
    async fn test_plan_falls_back_on_unparseable_response() {
        let mut client = MockContentService::new();
        client
            .expect_complete()
            .returning(|_| Ok("I cannot produce JSON today.".to_string()));
        let plan = plan(&client, "Paris", &PARIS, 9, 0.7).await.unwrap();
        assert_eq!(plan.total_minutes(), 9);
        assert_eq!(plan.sections[0].allocated_minutes, 5);
        assert_eq!(plan.sections[1].allocated_minutes, 4);
    }

    #[tokio::test]
    async fn test_plan_propagates_unauthorized() {
        let mut client = MockContentService::new();
        client
            .expect_complete()
            .returning(|_| Err(TourError::Unauthorized));
        let result = plan(&client, "Paris", &PARIS, 10, 0.7).await;
        assert!(matches!(result, Err(TourError::Unauthorized)));
    }
}
