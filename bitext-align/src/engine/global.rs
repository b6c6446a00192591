//! Global merge strategy
//!
//! Partitions the longer sequence into exactly `|S|` contiguous groups and
//! picks the partition with the highest summed similarity against the
//! shorter sequence (dynamic programming over split points). Unlike the
//! greedy loop, an early merge cannot block a better one later.
//!
//! Every feasible span is embedded in one oracle call, so cost grows with
//! `|L| * (|L| - |S| + 1)`. The tolerance gate then applies to every merged
//! group in order; if any group fails, nothing is merged.

use super::{balanced, degraded, guarded, Guarded, Run, ToleranceGate};
use crate::error::AlignResult;
use crate::services::embedding::Embedding;
use crate::services::similarity::{SimilarityMatrix, SimilarityMatrixBuilder};
use crate::types::{AlignmentOutcome, DegradedReason, MergeRecord, ParagraphSequence, Side};
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::sync::Arc;

/// One group of the chosen partition
#[derive(Debug, Clone, PartialEq)]
struct Group {
    span: Range<usize>,
    score: f32,
}

pub(super) async fn align(
    run: &Run<'_>,
    builder: &mut SimilarityMatrixBuilder<'_>,
    a: ParagraphSequence,
    b: ParagraphSequence,
) -> AlignResult<AlignmentOutcome> {
    let join = run.config.join_token.clone();

    let (emb_a, emb_b) = match guarded(run.budget, builder.embed_pair(&a, &b)).await? {
        Guarded::Done(embeddings) => embeddings,
        Guarded::Interrupted(reason) => {
            let stats = run.stats(builder, 0);
            return Ok(degraded(&a, &b, &[], Vec::new(), reason, stats));
        }
    };
    let matrix = SimilarityMatrix::from_embeddings(&emb_a, &emb_b);

    if a.len() == b.len() {
        let stats = run.stats(builder, 0);
        return Ok(balanced(&a, &b, &matrix.diagonal(), Vec::new(), stats));
    }

    let longer = if a.len() > b.len() { Side::A } else { Side::B };
    let (l_seq, s_seq, s_emb) = match longer {
        Side::A => (&a, &b, &emb_b),
        Side::B => (&b, &a, &emb_a),
    };
    let excess = l_seq.len() - s_seq.len();

    let interruption = run.budget.interruption(0).or(match run.budget.max_merges {
        Some(max) if max < excess => Some(DegradedReason::MergeBudgetExhausted { max_merges: max }),
        _ => None,
    });
    if let Some(reason) = interruption {
        let stats = run.stats(builder, 0);
        return Ok(degraded(&a, &b, &matrix.diagonal(), Vec::new(), reason, stats));
    }

    let spans = feasible_spans(l_seq.len(), s_seq.len());
    let span_texts: Vec<String> = spans.iter().map(|s| l_seq.span_text(s.clone(), &join)).collect();
    let text_refs: Vec<&str> = span_texts.iter().map(String::as_str).collect();

    let span_embeddings = match guarded(run.budget, builder.embed_texts(&text_refs)).await? {
        Guarded::Done(embeddings) => embeddings,
        Guarded::Interrupted(reason) => {
            let stats = run.stats(builder, 0);
            return Ok(degraded(&a, &b, &matrix.diagonal(), Vec::new(), reason, stats));
        }
    };
    let span_embeddings: HashMap<(usize, usize), Arc<Embedding>> = spans
        .iter()
        .map(|s| (s.start, s.end))
        .zip(span_embeddings)
        .collect();

    let score = |span: &Range<usize>, counterpart: usize| -> f32 {
        if span.len() == 1 {
            return matrix.oriented(longer, span.start, counterpart);
        }
        span_embeddings
            .get(&(span.start, span.end))
            .map(|e| e.cosine(&s_emb[counterpart]))
            .unwrap_or(f32::NEG_INFINITY)
    };

    let groups = best_partition(l_seq.len(), s_seq.len(), score);

    let mut gate = ToleranceGate::new(run.config);
    let mut merges = Vec::new();
    for (g, group) in groups.iter().enumerate() {
        if group.span.len() == 1 {
            continue;
        }
        let before = group
            .span
            .clone()
            .map(|t| matrix.oriented(longer, t, g))
            .fold(f32::NEG_INFINITY, f32::max);
        let delta = group.score - before;

        if let Err(reason) = gate.check(delta) {
            tracing::debug!(
                side = %longer,
                group = g,
                width = group.span.len(),
                delta,
                %reason,
                "Global partition rejected"
            );
            let stats = run.stats(builder, 0);
            return Ok(degraded(&a, &b, &matrix.diagonal(), Vec::new(), reason, stats));
        }
        gate.accept(delta);

        merges.push(MergeRecord {
            side: longer,
            index: g,
            width: group.span.len(),
            delta,
            score_after: group.score,
        });
    }

    // Right to left, so earlier indices stay valid
    let merged = groups
        .iter()
        .rev()
        .filter(|g| g.span.len() > 1)
        .fold(l_seq.clone(), |seq, g| seq.merge_span(g.span.clone(), &join));
    let scores: Vec<f32> = groups.iter().map(|g| g.score).collect();

    tracing::debug!(
        side = %longer,
        merges = merges.len(),
        total = scores.iter().sum::<f32>(),
        "Global partition applied"
    );

    let stats = run.stats(builder, merges.len());
    let outcome = match longer {
        Side::A => balanced(&merged, &b, &scores, merges, stats),
        Side::B => balanced(&a, &merged, &scores, merges, stats),
    };
    Ok(outcome)
}

/// Spans of width >= 2 that can appear in some partition of `longer_len`
/// elements into `shorter_len` groups, in (start, end) order
fn feasible_spans(longer_len: usize, shorter_len: usize) -> Vec<Range<usize>> {
    let max_width = longer_len - shorter_len + 1;
    let mut spans = BTreeSet::new();
    for start in 0..longer_len {
        for end in start + 2..=(start + max_width).min(longer_len) {
            spans.insert((start, end));
        }
    }
    spans.into_iter().map(|(s, e)| s..e).collect()
}

/// Maximum-score partition into `groups` contiguous groups
///
/// `score(span, g)` is the similarity of the span's text with counterpart
/// `g`. Ties keep the earliest split point.
fn best_partition<F>(len: usize, groups: usize, score: F) -> Vec<Group>
where
    F: Fn(&Range<usize>, usize) -> f32,
{
    let excess = len - groups;
    // best[g][end] = (total, start of group g) for covering 0..end with groups 0..=g
    let mut best: Vec<Vec<Option<(f32, usize)>>> = vec![vec![None; len + 1]; groups];

    for end in 1..=excess + 1 {
        best[0][end] = Some((score(&(0..end), 0), 0));
    }
    for g in 1..groups {
        for end in g + 1..=g + 1 + excess {
            let mut cell: Option<(f32, usize)> = None;
            for start in g..end {
                let Some((prev, _)) = best[g - 1][start] else {
                    continue;
                };
                let total = prev + score(&(start..end), g);
                if cell.map_or(true, |(t, _)| total > t) {
                    cell = Some((total, start));
                }
            }
            best[g][end] = cell;
        }
    }

    let mut out = Vec::with_capacity(groups);
    let mut end = len;
    for g in (0..groups).rev() {
        let Some((_, start)) = best[g][end] else {
            break;
        };
        let span = start..end;
        out.push(Group {
            score: score(&span, g),
            span,
        });
        end = start;
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feasible_spans() {
        let spans = feasible_spans(4, 2);
        assert_eq!(spans, vec![0..2, 0..3, 1..3, 1..4, 2..4]);
    }

    #[test]
    fn test_best_partition_finds_global_optimum() {
        // Greedy would take 0..2 for group 0 (0.9); the better total groups
        // 0 alone and 1..3 together.
        let scores = |span: &Range<usize>, g: usize| -> f32 {
            match (span.start, span.end, g) {
                (0, 1, 0) => 0.8,
                (0, 2, 0) => 0.9,
                (1, 3, 1) => 0.95,
                (2, 3, 1) => 0.1,
                (1, 2, 1) => 0.2,
                _ => 0.0,
            }
        };
        let groups = best_partition(3, 2, scores);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].span, 0..1);
        assert_eq!(groups[1].span, 1..3);
    }

    #[test]
    fn test_best_partition_covers_everything_in_order() {
        let groups = best_partition(6, 3, |_, _| 0.5);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].span.start, 0);
        assert_eq!(groups[2].span.end, 6);
        for pair in groups.windows(2) {
            assert_eq!(pair[0].span.end, pair[1].span.start);
        }
        // All ties: earliest split points
        assert_eq!(groups[0].span, 0..1);
        assert_eq!(groups[1].span, 1..2);
    }
}
