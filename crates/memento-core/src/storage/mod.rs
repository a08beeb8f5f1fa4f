//! Persistence Gateway: durable, transactional CRUD over Memory, Embedding,
//! Link, Feedback, plus filtered scans for lexical and vector search (spec §4.1).

mod migrations;
mod sqlite;

pub use migrations::MIGRATIONS;
pub use sqlite::{CandidateRow, SqliteStorage};
