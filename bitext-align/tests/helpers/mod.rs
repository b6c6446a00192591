//! Test Helper Utilities
//!
//! Shared utilities for testing bitext-align

#![allow(dead_code)]

pub mod mock_oracle;

pub use mock_oracle::MockOracle;

use bitext_align::{ParagraphSequence, Side};

pub fn strings(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|t| t.to_string()).collect()
}

pub fn seq(side: Side, texts: &[&str]) -> ParagraphSequence {
    ParagraphSequence::new(side, strings(texts))
}

/// Origins of one side, in pair order, with padding slots skipped
pub fn origins(pairs: &[bitext_align::AlignedPair], side: Side) -> Vec<std::ops::Range<usize>> {
    pairs
        .iter()
        .filter_map(|p| match side {
            Side::A => p.origin_a.clone(),
            Side::B => p.origin_b.clone(),
        })
        .collect()
}

/// True when `ranges` tile `0..len` in order with no gap or overlap
pub fn tiles(ranges: &[std::ops::Range<usize>], len: usize) -> bool {
    let mut next = 0;
    for range in ranges {
        if range.start != next || range.end <= range.start {
            return false;
        }
        next = range.end;
    }
    next == len
}
