//! Record assembler
//!
//! Turns aligned pairs into numbered output records. Numbering starts at 1
//! and continues across every article of one run.

use crate::types::AlignedPair;
use serde::{Deserialize, Serialize};

/// One output row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedRecord {
    pub id: u64,
    pub text_a: String,
    pub text_b: String,
}

/// Sequential record numbering for one run
#[derive(Debug, Clone)]
pub struct RecordAssembler {
    next_id: u64,
}

impl Default for RecordAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Id the next record will receive
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Number `pairs` in order
    pub fn assemble(&mut self, pairs: &[AlignedPair]) -> Vec<AlignedRecord> {
        pairs
            .iter()
            .map(|pair| {
                let record = AlignedRecord {
                    id: self.next_id,
                    text_a: pair.text_a.clone(),
                    text_b: pair.text_b.clone(),
                };
                self.next_id += 1;
                record
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &str, b: &str) -> AlignedPair {
        AlignedPair {
            text_a: a.to_string(),
            text_b: b.to_string(),
            origin_a: Some(0..1),
            origin_b: Some(0..1),
            score: None,
        }
    }

    #[test]
    fn test_ids_start_at_one() {
        let mut assembler = RecordAssembler::new();
        let records = assembler.assemble(&[pair("X", "x"), pair("Y Z", "yz")]);

        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].id, 2);
        assert_eq!(records[1].text_a, "Y Z");
        assert_eq!(assembler.next_id(), 3);
    }

    #[test]
    fn test_numbering_continues_across_articles() {
        let mut assembler = RecordAssembler::new();
        assembler.assemble(&[pair("a", "b"), pair("c", "d")]);
        let second = assembler.assemble(&[pair("e", "f")]);
        assert_eq!(second[0].id, 3);
    }

    #[test]
    fn test_empty_pairs_consume_no_ids() {
        let mut assembler = RecordAssembler::new();
        assert!(assembler.assemble(&[]).is_empty());
        assert_eq!(assembler.next_id(), 1);
    }
}
