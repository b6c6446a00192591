//! Batch workflow
//!
//! Loads articles, aligns them with bounded concurrency, and turns the
//! reports into numbered records for export:
//! 1. `input::load_articles` reads a JSON array or JSON Lines file
//! 2. `batch::align_articles` runs the aligner per article, keeping input order
//! 3. `batch::collect_records` numbers the pairs of every accepted article
//! 4. `output` writes CSV, `crate::db::records` writes SQLite

pub mod batch;
pub mod input;
pub mod output;

pub use batch::{align_articles, collect_records, ArticleReport, ArticleStatus, BatchSummary};
pub use input::{load_articles, parse_articles, ArticleInput};
pub use output::{default_output_path, write_csv, write_csv_to};
