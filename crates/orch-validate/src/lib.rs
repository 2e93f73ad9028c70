//! Validation Pipeline: quality gates run against an agent's worktree
//! before it is allowed to merge.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod command;
pub mod error;
pub mod gates;
pub mod pipeline;

pub use error::{Error, Result};
pub use gates::{LintValidator, SecurityScanner, SyntaxValidator, TestRunner, TypeCheckValidator};
pub use pipeline::{QualityGate, ValidationPipeline};

/// Construct the standard five-gate pipeline in merge order: syntax,
/// security, type-check, lint, then tests. Security runs early so a
/// credential leak is always caught, even when a later gate (or an earlier
/// one, if the pipeline is run non-stopping) also fails.
#[must_use]
pub fn standard_pipeline() -> ValidationPipeline {
    let mut pipeline = ValidationPipeline::new();
    pipeline
        .add_gate(Box::new(SyntaxValidator))
        .add_gate(Box::new(SecurityScanner))
        .add_gate(Box::new(TypeCheckValidator))
        .add_gate(Box::new(LintValidator))
        .add_gate(Box::new(TestRunner));
    pipeline
}
