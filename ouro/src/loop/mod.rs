//! Loop execution module for Ouro
//!
//! The Loop Engine runs improvement iterations: prompt → model → extract code →
//! save → evaluate → next prompt, until an evaluation reports a significant
//! improvement.

mod artifact;
mod engine;

pub use artifact::ArtifactWriter;
pub use engine::{IterationReport, LoopEngine, LoopStatus, RunOutcome};
