//! Speech synthesis with lossless chunking under the provider length limit.
//!
//! Chunk boundaries prefer paragraphs, then sentences; concatenating the
//! chunks reproduces the script text exactly, and the audio is concatenated
//! in the same order. A chunk that fails after retries fails the whole
//! synthesis — truncated audio is never returned.

use std::time::Duration;

use tracing::debug;

use crate::client::ContentService;
use crate::types::{AudioArtifact, TourScript};
use crate::{Result, TourError};

/// Splits `text` into chunks of at most `max_bytes` bytes whose concatenation
/// equals `text`. Prefers paragraph boundaries, then sentence boundaries,
/// then hard splits at char boundaries for degenerate runs.
pub fn chunk_script(text: &str, max_bytes: usize) -> Vec<String> {
    if text.len() <= max_bytes {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for fragment in fragments(text, max_bytes) {
        if !current.is_empty() && current.len() + fragment.len() > max_bytes {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(fragment);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Boundary-preserving fragments no longer than `max_bytes`. Delimiters stay
/// attached to the preceding fragment, keeping the split lossless.
fn fragments(text: &str, max_bytes: usize) -> Vec<&str> {
    let mut out = Vec::new();
    for paragraph in text.split_inclusive("\n\n") {
        if paragraph.len() <= max_bytes {
            out.push(paragraph);
            continue;
        }
        for sentence in paragraph.split_inclusive(['.', '!', '?']) {
            if sentence.len() <= max_bytes {
                out.push(sentence);
                continue;
            }
            // No sentence boundary within the limit; hard split.
            let mut rest = sentence;
            while rest.len() > max_bytes {
                let mut cut = max_bytes;
                while !rest.is_char_boundary(cut) {
                    cut -= 1;
                }
                let (head, tail) = rest.split_at(cut);
                out.push(head);
                rest = tail;
            }
            if !rest.is_empty() {
                out.push(rest);
            }
        }
    }
    out
}

/// Converts the assembled script into one audio artifact, synthesizing
/// chunks in order and concatenating the returned bytes.
pub async fn synthesize_script(
    client: &dyn ContentService,
    script: &TourScript,
    voice: &str,
    max_bytes: usize,
    mime_type: &str,
) -> Result<AudioArtifact> {
    let chunks = chunk_script(&script.full_text, max_bytes);
    let total = chunks.len();
    debug!(
        target = "synth",
        total,
        chars = script.full_text.len(),
        voice,
        "Synthesizing script"
    );

    let mut bytes = Vec::new();
    for (index, chunk) in chunks.iter().enumerate() {
        debug!(target = "synth", index, total, chars = chunk.len(), "Synthesizing chunk");
        match client.synthesize(chunk, voice).await {
            Ok(audio) => bytes.extend_from_slice(&audio),
            Err(err) => {
                return Err(TourError::SynthesisChunkFailure {
                    index,
                    total,
                    source: Box::new(err),
                })
            }
        }
    }

    Ok(AudioArtifact {
        bytes,
        mime_type: mime_type.to_string(),
        duration_estimate: Duration::from_secs_f64(
            f64::from(script.estimated_speaking_minutes) * 60.0,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockContentService;

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_script("A short tour.", 4096);
        assert_eq!(chunks, vec!["A short tour.".to_string()]);
    }

    #[test]
    fn test_chunking_is_lossless() {
        let text = "First paragraph with a sentence. And another one!\n\n\
                    Second paragraph. It keeps going? Yes it does.\n\n\
                    Third paragraph that is noticeably longer than the others and rambles on."
            .repeat(10);
        let chunks = chunk_script(&text, 120);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= 120));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_hard_split_without_boundaries() {
        let text = "x".repeat(500);
        let chunks = chunk_script(&text, 100);
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.len() <= 100));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_hard_split_respects_char_boundaries() {
        let text = "é".repeat(100); // 2 bytes per char
        let chunks = chunk_script(&text, 33);
        assert!(chunks.iter().all(|c| c.len() <= 33));
        assert_eq!(chunks.concat(), text);
    }

    #[tokio::test]
    async fn test_chunk_failure_names_the_chunk() {
        let mut client = MockContentService::new();
        let mut calls = 0;
        client.expect_synthesize().returning(move |text, _| {
            calls += 1;
            if calls == 2 {
                Err(TourError::ServiceUnavailable {
                    attempts: 3,
                    message: "status 503".into(),
                })
            } else {
                Ok(text.as_bytes().to_vec())
            }
        });

        let script = TourScript::from_text("one. two. three. four. five. six.".to_string(), 150);
        let result = synthesize_script(&client, &script, "alloy", 10, "audio/mpeg").await;
        match result {
            Err(TourError::SynthesisChunkFailure { index, total, .. }) => {
                assert_eq!(index, 1);
                assert!(total > 2);
            }
            other => panic!("expected SynthesisChunkFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chunked_audio_matches_unchunked() {
        // Deterministic echo client: synthesized bytes are the input text,
        // so order-preserving lossless chunking must reproduce the whole
        // script byte-for-byte.
        let mut client = MockContentService::new();
        client
            .expect_synthesize()
            .returning(|text, _| Ok(text.as_bytes().to_vec()));

        let text = "Welcome to the old town. The cathedral rises ahead.\n\n\
                    As we walk, notice the carved doorways. Each tells a story."
            .repeat(8);
        let script = TourScript::from_text(text.clone(), 150);

        let chunked = synthesize_script(&client, &script, "alloy", 64, "audio/mpeg")
            .await
            .unwrap();
        let unchunked = synthesize_script(&client, &script, "alloy", usize::MAX, "audio/mpeg")
            .await
            .unwrap();
        assert_eq!(chunked.bytes, unchunked.bytes);
        assert_eq!(chunked.bytes, text.as_bytes());
    }
}
