//! Core data model for paragraph alignment
//!
//! Every entity here is created fresh per alignment invocation and discarded
//! once the outcome is handed to the record assembler.
//!
//! # Invariants
//! - Sequence order always reflects original document order. The only
//!   structural operation is merging two *adjacent* elements.
//! - Every normalized input paragraph is covered by exactly one segment, and
//!   every segment appears in exactly one [`AlignedPair`] of any outcome.

use serde::Serialize;
use std::fmt;
use std::ops::Range;
use std::time::Duration;

// ============================================================================
// Sequences
// ============================================================================

/// Language tag of a paragraph sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The opposite sequence
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// One element of a paragraph sequence, original or merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    /// Half-open range of normalized input indices this segment covers
    pub origin: Range<usize>,
}

/// Join two texts with `join_token`, never producing a stray token around an
/// empty side
pub fn join_text(left: &str, right: &str, join_token: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_string(),
        (_, true) => left.to_string(),
        _ => {
            let mut joined = String::with_capacity(left.len() + join_token.len() + right.len());
            joined.push_str(left);
            joined.push_str(join_token);
            joined.push_str(right);
            joined
        }
    }
}

/// Ordered paragraphs of one language version of an article
///
/// Merges return a new sequence; the receiver is never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphSequence {
    side: Side,
    segments: Vec<Segment>,
}

impl ParagraphSequence {
    /// Wrap normalized paragraphs, one segment per paragraph
    pub fn new(side: Side, paragraphs: Vec<String>) -> Self {
        let segments = paragraphs
            .into_iter()
            .enumerate()
            .map(|(index, text)| Segment {
                text,
                origin: index..index + 1,
            })
            .collect();
        Self { side, segments }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn texts(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// Text that merging elements `index` and `index + 1` would produce
    ///
    /// # Panics
    /// Panics if `index + 1` is out of bounds.
    pub fn merged_text(&self, index: usize, join_token: &str) -> String {
        join_text(
            &self.segments[index].text,
            &self.segments[index + 1].text,
            join_token,
        )
    }

    /// Text of the contiguous elements in `span`, joined in order
    pub fn span_text(&self, span: Range<usize>, join_token: &str) -> String {
        self.segments[span]
            .iter()
            .fold(String::new(), |acc, seg| join_text(&acc, &seg.text, join_token))
    }

    /// New sequence with elements `index` and `index + 1` merged
    ///
    /// # Panics
    /// Panics if `index + 1` is out of bounds.
    pub fn merge_adjacent(&self, index: usize, join_token: &str) -> ParagraphSequence {
        self.merge_span(index..index + 2, join_token)
    }

    /// New sequence with every element in `span` merged into one
    ///
    /// # Panics
    /// Panics if `span` is empty or out of bounds.
    pub fn merge_span(&self, span: Range<usize>, join_token: &str) -> ParagraphSequence {
        assert!(span.start < span.end && span.end <= self.segments.len());

        let merged = Segment {
            text: self.span_text(span.clone(), join_token),
            origin: self.segments[span.start].origin.start..self.segments[span.end - 1].origin.end,
        };

        let mut segments = Vec::with_capacity(self.segments.len() - (span.len() - 1));
        segments.extend_from_slice(&self.segments[..span.start]);
        segments.push(merged);
        segments.extend_from_slice(&self.segments[span.end..]);

        ParagraphSequence {
            side: self.side,
            segments,
        }
    }
}

// ============================================================================
// Merge search
// ============================================================================

/// A proposed merge of two adjacent elements of the longer sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeCandidate {
    /// Sequence the merge applies to (always the longer one)
    pub side: Side,
    /// Left index; the merge covers `index` and `index + 1`
    pub index: usize,
    pub merged_text: String,
    /// Position-anchored counterpart index in the shorter sequence
    pub counterpart: usize,
    /// Best similarity of either element alone against the counterpart
    pub score_before: f32,
    /// Similarity of the merged text against the counterpart
    pub score_after: f32,
    /// `score_after - score_before`
    pub delta: f32,
}

/// An accepted merge, in application order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeRecord {
    pub side: Side,
    /// Index in the sequence as it was when the merge was applied
    pub index: usize,
    /// Number of elements collapsed into one (2 for greedy merges)
    pub width: usize,
    pub delta: f32,
    pub score_after: f32,
}

// ============================================================================
// Outcomes
// ============================================================================

/// Final output unit: one (possibly merged) segment from each language
///
/// A missing origin with empty text marks padding in a degraded outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedPair {
    pub text_a: String,
    pub text_b: String,
    pub origin_a: Option<Range<usize>>,
    pub origin_b: Option<Range<usize>>,
    /// Cosine similarity of the pair, when both sides exist and were scored
    pub score: Option<f32>,
}

/// Work counters for one invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignmentStats {
    /// Accepted merge records, equal to `merges.len()`. A global group of
    /// width 3 counts once; paragraphs removed is the sum of `width - 1`.
    pub merges: usize,
    /// Distinct texts sent to the embedding oracle
    pub texts_embedded: usize,
    /// Batched oracle requests issued
    pub oracle_calls: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Ordered pairs plus diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentResult {
    pub pairs: Vec<AlignedPair>,
    pub merges: Vec<MergeRecord>,
    pub stats: AlignmentStats,
}

impl AlignmentResult {
    /// Final per-pair similarity scores, in pair order
    pub fn scores(&self) -> Vec<Option<f32>> {
        self.pairs.iter().map(|p| p.score).collect()
    }
}

/// Why reconciliation stopped before the counts matched
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradedReason {
    /// The best available merge regressed similarity more than allowed
    ToleranceNotMet { best_delta: f32 },
    /// Accepting the best merge would push accumulated drift past the budget
    CumulativeDriftExceeded { drift: f32 },
    MergeBudgetExhausted { max_merges: usize },
    DeadlineExceeded,
    Cancelled,
    /// One sequence is empty; nothing to merge against
    EmptyCounterpart,
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::ToleranceNotMet { best_delta } => {
                write!(f, "no merge met tolerance (best delta {:.4})", best_delta)
            }
            DegradedReason::CumulativeDriftExceeded { drift } => {
                write!(f, "cumulative drift budget exceeded (drift {:.4})", drift)
            }
            DegradedReason::MergeBudgetExhausted { max_merges } => {
                write!(f, "merge budget of {} exhausted", max_merges)
            }
            DegradedReason::DeadlineExceeded => write!(f, "deadline exceeded"),
            DegradedReason::Cancelled => write!(f, "cancelled"),
            DegradedReason::EmptyCounterpart => write!(f, "one sequence is empty"),
        }
    }
}

/// Stuck outcome: best partial pairing plus the unresolved count mismatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentDegraded {
    pub partial: AlignmentResult,
    /// `|L| - |S|` at the point the engine stopped
    pub residual: usize,
    pub longer: Side,
    pub reason: DegradedReason,
}

/// Result of one `align` call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AlignmentOutcome {
    Balanced(AlignmentResult),
    Degraded(AlignmentDegraded),
}

impl AlignmentOutcome {
    pub fn is_balanced(&self) -> bool {
        matches!(self, AlignmentOutcome::Balanced(_))
    }

    pub fn result(&self) -> &AlignmentResult {
        match self {
            AlignmentOutcome::Balanced(result) => result,
            AlignmentOutcome::Degraded(degraded) => &degraded.partial,
        }
    }

    pub fn pairs(&self) -> &[AlignedPair] {
        &self.result().pairs
    }

    /// Unresolved count mismatch (0 when balanced)
    pub fn residual(&self) -> usize {
        match self {
            AlignmentOutcome::Balanced(_) => 0,
            AlignmentOutcome::Degraded(degraded) => degraded.residual,
        }
    }
}
