pub mod runner;

pub use runner::{ExportSummary, RunSummary, ScreeningRunner, StreamOutcome};
