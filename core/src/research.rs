//! Per-interest topic research.
//!
//! Each interest has its own fixed prompt template parameterized by location
//! and word budget. Researchers share nothing and have no ordering
//! requirement, so the pipeline dispatches them concurrently. A researcher
//! that fails after retries yields a degraded (empty) result; only an
//! authentication failure aborts the tour.

use tracing::{debug, warn};

use crate::client::{CompletionRequest, ContentService};
use crate::types::{word_count, Interest, ResearchResult};
use crate::{Result, TourError};

const RESEARCH_SYSTEM: &str =
    "You are a knowledgeable local guide writing narration for a walking audio tour.";

/// Category-specific focus instructions. Tagged-variant dispatch: adding an
/// interest without a template is a compile error.
fn focus_instructions(interest: Interest) -> &'static str {
    match interest {
        Interest::History => {
            "Create engaging historical content for an audio tour. Focus on interesting \
             stories and personal connections. Make it conversational and include specific \
             details that would be interesting to hear while walking. Include specific \
             locations and landmarks where possible."
        }
        Interest::Architecture => {
            "Create engaging architectural content for an audio tour. Focus on visual \
             descriptions and interesting design details. Make it conversational and \
             include specific buildings and their unique features. Describe what visitors \
             should look for and why it matters."
        }
        Interest::Culture => {
            "Create engaging cultural content for an audio tour. Focus on local \
             traditions, arts, and community life. Make it conversational and include \
             specific cultural venues and events. Describe the atmosphere and significance \
             of cultural landmarks."
        }
        Interest::Culinary => {
            "Create engaging culinary content for an audio tour. Focus on local \
             specialties, food history, and interesting stories about restaurants and \
             dishes. Make it conversational and include specific recommendations. Describe \
             the flavors and cultural significance of the food."
        }
    }
}

pub fn research_prompt(location: &str, interest: Interest, word_budget: u32) -> String {
    format!(
        "Location: {location}\nTopic: {interest}\nWord Limit: {} - {}\n\n\
         Instructions: {} The content should be approximately {} words when spoken at a \
         natural pace.",
        word_budget,
        word_budget + 20,
        focus_instructions(interest),
        word_budget
    )
}

/// Researches one interest within its allocated time budget.
pub async fn research(
    client: &dyn ContentService,
    location: &str,
    interest: Interest,
    allocated_minutes: u32,
    words_per_minute: u32,
    temperature: f32,
) -> Result<ResearchResult> {
    let word_budget = allocated_minutes * words_per_minute;
    let request = CompletionRequest {
        system: RESEARCH_SYSTEM.to_string(),
        user: research_prompt(location, interest, word_budget),
        // Roughly 1.5 tokens per word, with headroom for short sections.
        max_tokens: (word_budget * 2).clamp(256, 4096),
        temperature,
    };

    match client.complete(&request).await {
        Ok(content) => {
            let words = word_count(&content);
            debug!(
                target = "research",
                interest = %interest,
                words,
                budget = word_budget,
                "Completed topic research"
            );
            Ok(ResearchResult {
                interest,
                content,
                word_count: words,
            })
        }
        Err(TourError::Unauthorized) => Err(TourError::Unauthorized),
        Err(err) => {
            warn!(
                target = "research",
                interest = %interest,
                error = %err,
                "Researcher failed; continuing with an empty section"
            );
            Ok(ResearchResult::degraded(interest))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockContentService;

    #[test]
    fn test_prompt_carries_location_topic_and_budget() {
        let prompt = research_prompt("Kyoto", Interest::Culture, 450);
        assert!(prompt.contains("Location: Kyoto"));
        assert!(prompt.contains("Topic: Culture"));
        assert!(prompt.contains("450 - 470"));
        assert!(prompt.contains("local traditions"));
    }

    #[tokio::test]
    async fn test_research_counts_words() {
        let mut client = MockContentService::new();
        client
            .expect_complete()
            .returning(|_| Ok("one two three four five".to_string()));
        let result = research(&client, "Kyoto", Interest::History, 5, 150, 0.7)
            .await
            .unwrap();
        assert_eq!(result.interest, Interest::History);
        assert_eq!(result.word_count, 5);
        assert!(!result.is_degraded());
    }

    #[tokio::test]
    async fn test_research_degrades_on_exhausted_retries() {
        let mut client = MockContentService::new();
        client.expect_complete().returning(|_| {
            Err(TourError::ServiceUnavailable {
                attempts: 3,
                message: "status 503".into(),
            })
        });
        let result = research(&client, "Kyoto", Interest::Culinary, 5, 150, 0.7)
            .await
            .unwrap();
        assert!(result.is_degraded());
        assert!(result.content.is_empty());
    }

    #[tokio::test]
    async fn test_research_propagates_unauthorized() {
        let mut client = MockContentService::new();
        client
            .expect_complete()
            .returning(|_| Err(TourError::Unauthorized));
        let result = research(&client, "Kyoto", Interest::Culinary, 5, 150, 0.7).await;
        assert!(matches!(result, Err(TourError::Unauthorized)));
    }
}
