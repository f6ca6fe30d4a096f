//! Streaming CV screening client: decode the screening event stream, aggregate progress,
//! rank, select and compare candidates, request deep analysis and export the session.

pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{HttpScreeningService, SessionArchive};
pub use app::{RunSummary, ScreeningRunner, StreamOutcome};
pub use config::{cli::LocalStorage, toml_config::ScreeningConfig};
#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use core::{ScreeningSession, SessionAction, SessionEffect, SessionSnapshot};
pub use domain::documents::DocumentSet;
pub use domain::model::{ScreeningRequest, SourceDocument};
pub use utils::error::{Result, ScreenError};
