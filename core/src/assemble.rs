//! Final script assembly: one completion merging the plan and all research
//! content into a single flowing narration.
//!
//! This is the last text-shaping stage; the script is read-only afterward.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::client::{CompletionRequest, ContentService};
use crate::types::{Interest, ResearchResult, TourPlan, TourScript, VoiceStyle};
use crate::Result;

const ASSEMBLER_SYSTEM: &str =
    "You are a master audio tour narrator. Write spoken-word narration, never stage \
     directions or markdown.";

/// Fixed style-to-tone mapping applied to the generation instructions.
fn tone_instruction(style: VoiceStyle) -> &'static str {
    match style {
        VoiceStyle::Friendly => {
            "Warm, friendly and casual, like a knowledgeable friend showing you around."
        }
        VoiceStyle::Professional => {
            "Professional and detailed, precise and informative without being dry."
        }
        VoiceStyle::Enthusiastic => {
            "Enthusiastic and energetic, conveying genuine excitement about every stop."
        }
        VoiceStyle::Calm => {
            "Calm and soothing, unhurried, giving the listener room to take everything in."
        }
    }
}

/// Merges plan and research into the final script. Degraded sections are
/// omitted from the prompt so the narration flows past them; errors here
/// propagate (there is no fallback for the final script).
pub async fn assemble(
    client: &dyn ContentService,
    location: &str,
    plan: &TourPlan,
    results: &HashMap<Interest, ResearchResult>,
    voice_style: VoiceStyle,
    words_per_minute: u32,
    temperature: f32,
) -> Result<TourScript> {
    let duration_minutes = plan.total_minutes();
    let target_words = duration_minutes * words_per_minute;

    let mut covered = Vec::new();
    let mut content_sections = String::new();
    for section in &plan.sections {
        let result = match results.get(&section.interest) {
            Some(r) if !r.is_degraded() => r,
            _ => continue,
        };
        covered.push(section.interest.as_str());
        content_sections.push_str(&format!(
            "## {} ({} minutes)\n{}\n\n",
            section.interest, section.allocated_minutes, result.content
        ));
    }

    if covered.len() < plan.sections.len() {
        warn!(
            target = "assemble",
            covered = covered.len(),
            planned = plan.sections.len(),
            "Assembling with missing sections"
        );
    }
    if content_sections.is_empty() {
        content_sections.push_str(
            "(No research content is available; write the tour from general knowledge of \
             the location.)\n",
        );
    }

    let user = format!(
        "Location: {location}\n\
         Covered Topics: {}\n\
         Total Tour Duration (in minutes): {duration_minutes}\n\
         Target Word Count: {target_words}\n\n\
         Content Sections:\n{content_sections}\n\
         Instructions: Create a natural, conversational audio tour covering only the \
         topics above, in that order. Make it feel like a guide walking alongside the \
         visitor, sharing interesting stories and insights. Use natural transitions \
         between topics and maintain an engaging but relaxed pace. Include specific \
         locations and landmarks where possible. Add natural pauses and transitions as if \
         walking between locations, with phrases like 'as we walk', 'look to your left', \
         'notice how'. Start with a warm welcome and end with a natural closing thought. \
         Tone of voice: {}\n\
         The total content should be approximately {target_words} words when spoken at a \
         natural pace of {words_per_minute} words per minute, so the tour lasts \
         approximately {duration_minutes} minutes.",
        covered.join(", "),
        tone_instruction(voice_style),
    );

    let request = CompletionRequest {
        system: ASSEMBLER_SYSTEM.to_string(),
        user,
        max_tokens: (target_words * 2).clamp(512, 8192),
        temperature,
    };

    let text = client.complete(&request).await?;
    let script = TourScript::from_text(text, words_per_minute);
    debug!(
        target = "assemble",
        estimated_minutes = script.estimated_speaking_minutes,
        requested_minutes = duration_minutes,
        "Assembled tour script"
    );
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockContentService;
    use crate::types::PlanSection;

    fn paris_plan() -> TourPlan {
        TourPlan {
            sections: vec![
                PlanSection {
                    interest: Interest::History,
                    allocated_minutes: 5,
                },
                PlanSection {
                    interest: Interest::Culinary,
                    allocated_minutes: 5,
                },
            ],
        }
    }

    fn result_for(interest: Interest, content: &str) -> ResearchResult {
        ResearchResult {
            interest,
            content: content.to_string(),
            word_count: content.split_whitespace().count(),
        }
    }

    #[tokio::test]
    async fn test_prompt_keeps_plan_order_and_omits_degraded() {
        let mut client = MockContentService::new();
        client.expect_complete().returning(|req| {
            // History survives, Culinary was degraded.
            assert!(req.user.contains("## History (5 minutes)"));
            assert!(!req.user.contains("Culinary"));
            Ok("Welcome to Paris. Here is some history. Farewell.".to_string())
        });

        let mut results = HashMap::new();
        results.insert(
            Interest::History,
            result_for(Interest::History, "The revolution began here."),
        );
        results.insert(Interest::Culinary, ResearchResult::degraded(Interest::Culinary));

        let script = assemble(
            &client,
            "Paris",
            &paris_plan(),
            &results,
            VoiceStyle::Friendly,
            150,
            0.7,
        )
        .await
        .unwrap();
        assert!(!script.full_text.is_empty());
    }

    #[tokio::test]
    async fn test_sections_appear_in_plan_order() {
        let mut client = MockContentService::new();
        client.expect_complete().returning(|req| {
            let history = req.user.find("## History").expect("history section");
            let culinary = req.user.find("## Culinary").expect("culinary section");
            assert!(history < culinary, "sections must follow plan order");
            Ok("script".to_string())
        });

        let mut results = HashMap::new();
        // Inserted in reverse of plan order; the prompt must not care.
        results.insert(
            Interest::Culinary,
            result_for(Interest::Culinary, "Croissants."),
        );
        results.insert(
            Interest::History,
            result_for(Interest::History, "Kings and barricades."),
        );

        assemble(
            &client,
            "Paris",
            &paris_plan(),
            &results,
            VoiceStyle::Calm,
            150,
            0.7,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_all_sections_degraded_still_assembles() {
        let mut client = MockContentService::new();
        client.expect_complete().returning(|req| {
            assert!(req.user.contains("general knowledge"));
            Ok("A short improvised tour.".to_string())
        });

        let mut results = HashMap::new();
        results.insert(Interest::History, ResearchResult::degraded(Interest::History));
        results.insert(
            Interest::Culinary,
            ResearchResult::degraded(Interest::Culinary),
        );

        let script = assemble(
            &client,
            "Paris",
            &paris_plan(),
            &results,
            VoiceStyle::Enthusiastic,
            150,
            0.7,
        )
        .await
        .unwrap();
        assert!(!script.full_text.is_empty());
    }
}
