//! Single-elimination bracket lifecycle: generation, operator edits, commit,
//! round progression and reset, reconciled against a local draft cache.

pub mod draw;
pub mod state;
