//! Merge candidate enumeration and selection
//!
//! Candidates are scored position-anchored: the merge of L[i] and L[i+1] is
//! compared with S[min(i, |S| - 1)] only. An unanchored comparison against
//! every element of S would let a merge near the start "borrow" similarity
//! from a paragraph far away and break monotonic alignment.

use crate::types::{MergeCandidate, ParagraphSequence};

/// One adjacent merge of the longer sequence, before scoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub index: usize,
    pub merged_text: String,
    pub counterpart: usize,
}

/// Counterpart in the shorter sequence for a merge starting at `index`
///
/// # Panics
/// Panics if `shorter_len` is zero.
pub fn anchor(index: usize, shorter_len: usize) -> usize {
    assert!(shorter_len > 0, "anchor needs a non-empty counterpart");
    index.min(shorter_len - 1)
}

/// Every adjacent merge of `longer`, left to right
pub fn propose(longer: &ParagraphSequence, shorter_len: usize, join_token: &str) -> Vec<Proposal> {
    (0..longer.len().saturating_sub(1))
        .map(|index| Proposal {
            index,
            merged_text: longer.merged_text(index, join_token),
            counterpart: anchor(index, shorter_len),
        })
        .collect()
}

/// Index of the candidate with the highest delta
///
/// A positive delta always beats a non-positive one, and among negative
/// deltas the one closest to zero wins, so this is a plain argmax. Ties keep
/// the leftmost candidate.
pub fn select(candidates: &[MergeCandidate]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        match best {
            Some(b) if candidate.delta <= candidates[b].delta => {}
            _ => best = Some(i),
        }
    }
    best
}
