//! Database operations for aligned runs
//!
//! Pool creation and schema live in `bitext_common::db`.

pub mod records;

pub use bitext_common::db::{init_database_pool, init_tables};
pub use records::{load_records, load_run, save_run, RunRow};
