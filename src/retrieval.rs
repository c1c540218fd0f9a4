//! Context assembly, citation scoring, and prompt construction.

use crate::document::{Citation, Language, QueryHit};

/// Delimiter between chunks in the assembled context.
const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Marker appended to truncated citation excerpts.
const EXCERPT_ELLIPSIS: &str = "...";

/// Convert a distance into a similarity score in `(0, 1]`.
///
/// Defined as `1 / (1 + distance)` for non-negative distance: strictly
/// decreasing in distance, exactly 1 at distance 0, asymptotically
/// approaching 0. Slightly negative distances from floating-point noise are
/// clamped to 0.
pub fn similarity_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Round a score to 4 decimal places for display.
fn round_score(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}

/// Assemble the generation context from hits in similarity order.
///
/// Chunk texts are joined by a delimiter under a running character budget of
/// `max_chars` (delimiters count toward the budget). A chunk that would
/// cross the budget is truncated to exactly fill the remaining characters
/// and assembly stops there — first fit, then stop, not best-fit packing.
///
/// Returns `None` when there are no hits, so callers can short-circuit to
/// the fixed fallback answer instead of prompting with an empty context.
pub fn assemble_context(hits: &[QueryHit], max_chars: usize) -> Option<String> {
    if hits.is_empty() {
        return None;
    }

    let mut context = String::new();
    let mut used = 0usize;

    for hit in hits {
        let delimiter = if used == 0 { 0 } else { CONTEXT_DELIMITER.len() };
        let remaining = max_chars.saturating_sub(used + delimiter);
        if remaining == 0 {
            break;
        }

        if used > 0 {
            context.push_str(CONTEXT_DELIMITER);
            used += CONTEXT_DELIMITER.len();
        }

        let chunk_chars = hit.text.chars().count();
        if chunk_chars <= remaining {
            context.push_str(&hit.text);
            used += chunk_chars;
        } else {
            context.extend(hit.text.chars().take(remaining));
            break;
        }
    }

    Some(context)
}

/// Build display citations for the given hits.
///
/// Excerpts are capped at `excerpt_chars` characters with a continuation
/// marker; they are for display only and never re-enter the generation
/// context.
pub fn build_citations(hits: &[QueryHit], excerpt_chars: usize) -> Vec<Citation> {
    hits.iter()
        .map(|hit| {
            let excerpt = if hit.text.chars().count() > excerpt_chars {
                let mut e: String = hit.text.chars().take(excerpt_chars).collect();
                e.push_str(EXCERPT_ELLIPSIS);
                e
            } else {
                hit.text.clone()
            };
            Citation {
                chunk_id: hit.id.clone(),
                filename: hit.metadata.filename.clone(),
                page: hit.metadata.page,
                score: round_score(similarity_score(hit.distance)),
                excerpt,
            }
        })
        .collect()
}

/// Build the answer-only-from-context prompt for the generation service.
pub fn build_prompt(context: &str, question: &str, language: Language) -> String {
    let lang_instruction = match language {
        Language::De => "Antworte auf Deutsch.",
        Language::En => "Answer in English.",
    };
    let fallback = language.fallback_answer();
    format!(
        "Answer exclusively from the following context. {lang_instruction}\n\
         If the answer is not in the context, reply only: \"{fallback}\"\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\n\
         Short, factual answer (from the context only):"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ChunkMetadata;

    fn hit(id: &str, text: &str, distance: f32) -> QueryHit {
        QueryHit {
            id: id.to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata {
                doc_id: "d1".to_string(),
                filename: "report.pdf".to_string(),
                page: 3,
                chunk_index: 0,
            },
            distance,
        }
    }

    #[test]
    fn score_is_one_at_zero_distance_and_decreases() {
        assert_eq!(similarity_score(0.0), 1.0);
        let mut prev = similarity_score(0.0);
        for d in [0.1, 0.5, 1.0, 4.0, 100.0] {
            let s = similarity_score(d);
            assert!(s < prev && s > 0.0);
            prev = s;
        }
    }

    #[test]
    fn no_hits_means_no_context() {
        assert_eq!(assemble_context(&[], 1000), None);
    }

    #[test]
    fn context_joins_hits_in_order() {
        let hits = vec![hit("a", "first", 0.1), hit("b", "second", 0.2)];
        let context = assemble_context(&hits, 1000).unwrap();
        assert_eq!(context, "first\n\n---\n\nsecond");
    }

    #[test]
    fn crossing_chunk_is_truncated_and_assembly_stops() {
        let hits = vec![
            hit("a", "aaaaaaaaaa", 0.1), // 10 chars
            hit("b", "bbbbbbbbbb", 0.2),
            hit("c", "c", 0.3), // would fit after truncation, must not appear
        ];
        let context = assemble_context(&hits, 20).unwrap();
        // 10 + 7 (delimiter) leaves 3 for the second chunk.
        assert_eq!(context, "aaaaaaaaaa\n\n---\n\nbbb");
        assert_eq!(context.chars().count(), 20);
    }

    #[test]
    fn context_never_exceeds_budget() {
        let hits: Vec<QueryHit> =
            (0..30).map(|i| hit(&format!("h{i}"), &"x".repeat(137), 0.1)).collect();
        for budget in [1usize, 10, 137, 200, 5000] {
            let context = assemble_context(&hits, budget).unwrap();
            assert!(context.chars().count() <= budget, "budget {budget} exceeded");
        }
    }

    #[test]
    fn excerpts_are_capped_with_marker() {
        let long = "y".repeat(500);
        let citations = build_citations(&[hit("a", &long, 0.0)], 400);
        assert_eq!(citations[0].excerpt.chars().count(), 403);
        assert!(citations[0].excerpt.ends_with("..."));
        assert_eq!(citations[0].score, 1.0);

        let citations = build_citations(&[hit("a", "short", 1.0)], 400);
        assert_eq!(citations[0].excerpt, "short");
        assert_eq!(citations[0].score, 0.5);
    }

    #[test]
    fn prompt_carries_context_question_and_fallback() {
        let prompt = build_prompt("CTX", "what is it?", Language::En);
        assert!(prompt.contains("CTX"));
        assert!(prompt.contains("what is it?"));
        assert!(prompt.contains("Not found in the document."));

        let prompt = build_prompt("CTX", "was ist das?", Language::De);
        assert!(prompt.contains("Nicht im Dokument."));
        assert!(prompt.contains("Antworte auf Deutsch."));
    }
}
