//! Greedy merge loop
//!
//! One merge per iteration. Every candidate text of an iteration is embedded
//! in a single oracle call; the matrix is then updated for the merged element
//! only. Terminates after at most `|L| - |S|` merges.

use super::candidates::{propose, select};
use super::{balanced, degraded, guarded, Guarded, Run, ToleranceGate};
use crate::error::AlignResult;
use crate::services::similarity::{SimilarityMatrix, SimilarityMatrixBuilder};
use crate::types::{
    AlignmentOutcome, DegradedReason, MergeCandidate, MergeRecord, ParagraphSequence, Side,
};

pub(super) async fn align(
    run: &Run<'_>,
    builder: &mut SimilarityMatrixBuilder<'_>,
    mut a: ParagraphSequence,
    mut b: ParagraphSequence,
) -> AlignResult<AlignmentOutcome> {
    let join = run.config.join_token.clone();

    let (mut emb_a, mut emb_b) = match guarded(run.budget, builder.embed_pair(&a, &b)).await? {
        Guarded::Done(embeddings) => embeddings,
        Guarded::Interrupted(reason) => {
            let stats = run.stats(builder, 0);
            return Ok(degraded(&a, &b, &[], Vec::new(), reason, stats));
        }
    };
    let mut matrix = SimilarityMatrix::from_embeddings(&emb_a, &emb_b);
    let mut gate = ToleranceGate::new(run.config);
    let mut merges: Vec<MergeRecord> = Vec::new();

    loop {
        if a.len() == b.len() {
            let stats = run.stats(builder, merges.len());
            return Ok(balanced(&a, &b, &matrix.diagonal(), merges, stats));
        }

        if let Some(reason) = run.budget.interruption(merges.len()) {
            tracing::debug!(merges = merges.len(), %reason, "Merge loop interrupted");
            let stats = run.stats(builder, merges.len());
            return Ok(degraded(&a, &b, &matrix.diagonal(), merges, reason, stats));
        }

        let longer = if a.len() > b.len() { Side::A } else { Side::B };
        let (l_seq, s_seq, l_emb, s_emb) = match longer {
            Side::A => (&mut a, &b, &mut emb_a, &emb_b),
            Side::B => (&mut b, &a, &mut emb_b, &emb_a),
        };

        let proposals = propose(l_seq, s_seq.len(), &join);
        let texts: Vec<&str> = proposals.iter().map(|p| p.merged_text.as_str()).collect();

        let merged_embeddings = match guarded(run.budget, builder.embed_texts(&texts)).await? {
            Guarded::Done(embeddings) => embeddings,
            Guarded::Interrupted(reason) => {
                let stats = run.stats(builder, merges.len());
                return Ok(degraded(&a, &b, &matrix.diagonal(), merges, reason, stats));
            }
        };

        let candidates: Vec<MergeCandidate> = proposals
            .into_iter()
            .zip(&merged_embeddings)
            .map(|(p, merged)| {
                let score_before = matrix
                    .oriented(longer, p.index, p.counterpart)
                    .max(matrix.oriented(longer, p.index + 1, p.counterpart));
                let score_after = merged.cosine(&s_emb[p.counterpart]);
                MergeCandidate {
                    side: longer,
                    index: p.index,
                    merged_text: p.merged_text,
                    counterpart: p.counterpart,
                    score_before,
                    score_after,
                    delta: score_after - score_before,
                }
            })
            .collect();

        // |L| > |S| >= 1, so there is at least one candidate
        let Some(best_index) = select(&candidates) else {
            let reason = DegradedReason::ToleranceNotMet {
                best_delta: f32::NEG_INFINITY,
            };
            let stats = run.stats(builder, merges.len());
            return Ok(degraded(&a, &b, &matrix.diagonal(), merges, reason, stats));
        };
        let best = &candidates[best_index];

        if let Err(reason) = gate.check(best.delta) {
            tracing::debug!(
                side = %longer,
                index = best.index,
                delta = best.delta,
                %reason,
                "Best merge rejected"
            );
            let stats = run.stats(builder, merges.len());
            return Ok(degraded(&a, &b, &matrix.diagonal(), merges, reason, stats));
        }
        gate.accept(best.delta);

        let merged = merged_embeddings[best_index].clone();
        let scores: Vec<f32> = s_emb.iter().map(|s| merged.cosine(s)).collect();
        matrix = matrix.with_merged(longer, best.index, scores);
        *l_seq = l_seq.merge_adjacent(best.index, &join);
        l_emb.splice(best.index..best.index + 2, [merged]);

        tracing::debug!(
            side = %longer,
            index = best.index,
            counterpart = best.counterpart,
            before = best.score_before,
            after = best.score_after,
            delta = best.delta,
            "Merged adjacent paragraphs"
        );

        merges.push(MergeRecord {
            side: longer,
            index: best.index,
            width: 2,
            delta: best.delta,
            score_after: best.score_after,
        });
    }
}
