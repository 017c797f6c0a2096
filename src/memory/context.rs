use super::store::ScoredRecord;

/// Hard cap on how many candidates a query may pull from the index.
pub const OVERFETCH_CAP: usize = 12;

/// Candidate limit for a context budget of `k`: over-fetch so that dropping
/// other users' memories still leaves enough results to fill the budget.
pub fn overfetch_limit(k: usize) -> usize {
    (k.saturating_mul(2)).min(OVERFETCH_CAP)
}

/// Compose a context string from search hits for one requesting user.
///
/// Hits are partitioned into the caller's own conversational memories and
/// ownerless knowledge. Memories belonging to any other user are dropped —
/// that is the privacy boundary. The caller's memories are reordered newest
/// first (equal timestamps keep their similarity order, which is
/// deterministic), then the budget is filled from knowledge hits in
/// similarity order. Returns `""` when nothing survives.
pub fn assemble_context(hits: &[ScoredRecord], user_id: i64, k: usize) -> String {
    let mut conversation: Vec<(f64, &str)> = Vec::new();
    let mut knowledge: Vec<&str> = Vec::new();

    for hit in hits {
        let tag = &hit.record.tag;
        if let Some(timestamp) = tag.timestamp() {
            if tag.is_memory_of(user_id) {
                conversation.push((timestamp, hit.record.text.as_str()));
            }
            // Another user's memory: dropped entirely.
        } else {
            knowledge.push(hit.record.text.as_str());
        }
    }

    // Newest conversational facts first; stable sort keeps similarity order
    // between equal timestamps.
    conversation.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut segments: Vec<&str> = conversation.iter().take(k).map(|(_, text)| *text).collect();
    segments.extend(knowledge.iter().copied().take(k.saturating_sub(segments.len())));

    segments.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::record::IndexRecord;

    fn knowledge_hit(text: &str, score: f64) -> ScoredRecord {
        ScoredRecord {
            record: IndexRecord::knowledge(vec![1.0], text, "corpus.txt"),
            score,
        }
    }

    fn memory_hit(text: &str, user_id: i64, timestamp: f64, score: f64) -> ScoredRecord {
        ScoredRecord {
            record: IndexRecord::conversation(vec![1.0], text, user_id, timestamp),
            score,
        }
    }

    #[test]
    fn test_overfetch_limit() {
        assert_eq!(overfetch_limit(0), 0);
        assert_eq!(overfetch_limit(4), 8);
        assert_eq!(overfetch_limit(6), 12);
        assert_eq!(overfetch_limit(100), OVERFETCH_CAP);
    }

    #[test]
    fn test_empty_hits_empty_context() {
        assert_eq!(assemble_context(&[], 1, 6), "");
    }

    #[test]
    fn test_other_users_memories_dropped() {
        let hits = vec![
            memory_hit("my dog is Rex", 1, 100.0, 0.9),
            memory_hit("my dog is Fido", 2, 200.0, 0.95),
        ];
        let context = assemble_context(&hits, 1, 6);
        assert!(context.contains("Rex"));
        assert!(!context.contains("Fido"));
    }

    #[test]
    fn test_recency_beats_similarity_within_memories() {
        let hits = vec![
            memory_hit("my favorite color is blue", 1, 100.0, 0.99),
            memory_hit("actually my favorite color is green", 1, 200.0, 0.5),
        ];
        let context = assemble_context(&hits, 1, 2);
        let green = context.find("green").unwrap();
        let blue = context.find("blue").unwrap();
        assert!(green < blue);
    }

    #[test]
    fn test_memories_precede_knowledge() {
        let hits = vec![
            knowledge_hit("corpus fact", 0.99),
            memory_hit("personal fact", 1, 100.0, 0.1),
        ];
        let context = assemble_context(&hits, 1, 6);
        assert_eq!(context, "personal fact\n\ncorpus fact");
    }

    #[test]
    fn test_budget_bounds_total_segments() {
        let hits = vec![
            memory_hit("m1", 1, 3.0, 0.9),
            memory_hit("m2", 1, 2.0, 0.8),
            knowledge_hit("k1", 0.7),
            knowledge_hit("k2", 0.6),
            knowledge_hit("k3", 0.5),
        ];
        let context = assemble_context(&hits, 1, 3);
        let segments: Vec<&str> = context.split("\n\n").collect();
        assert_eq!(segments, vec!["m1", "m2", "k1"]);
    }

    #[test]
    fn test_equal_timestamps_keep_similarity_order() {
        let hits = vec![
            memory_hit("seen first", 1, 100.0, 0.9),
            memory_hit("seen second", 1, 100.0, 0.8),
        ];
        let context = assemble_context(&hits, 1, 2);
        assert_eq!(context, "seen first\n\nseen second");
    }

    #[test]
    fn test_zero_budget() {
        let hits = vec![knowledge_hit("fact", 0.9)];
        assert_eq!(assemble_context(&hits, 1, 0), "");
    }
}
