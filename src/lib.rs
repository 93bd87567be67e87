//! Purpose: Library crate behind the `billfmt` CLI and its tests.
//! Exports: `core` (errors), `record` (line parsing), `extract` (file conversion), `notice`.
//! Role: Converts a `^^^`-delimited bill corpus into a JSON array of bill records.
//! Invariants: Modules take explicit inputs (paths, policies) instead of hidden state.
pub mod core;
pub mod extract;
pub mod notice;
pub mod record;
