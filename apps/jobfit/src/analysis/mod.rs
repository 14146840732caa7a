// Analysis layer: extraction clean-up, recommendation merging and the
// per-run orchestrator that ties gateway, matching and scoring together.

pub mod orchestrator;
pub mod postprocess;
pub mod recommendations;

pub use orchestrator::{AnalysisState, JobFitAnalyzer};
