//! Shared harness for Memento's end-to-end property and scenario tests
//! (spec §8). Seeds memories through the real `MemoryEngine` facade and,
//! where a test needs to control time, backdates `created_at` with a raw
//! connection to the engine's own SQLite file.

mod harness;

pub use harness::{no_filter, Harness, SearchHarness};
