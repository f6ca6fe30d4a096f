pub mod aggregator;
pub mod comparison;
pub mod decoder;
pub mod events;
pub mod export;
pub mod pagination;
pub mod selection;
pub mod session;
pub mod store;

pub use aggregator::{AggregatorPhase, ProgressAggregator, ProgressState, Transition};
pub use comparison::{ComparisonBuilder, ComparisonView};
pub use decoder::FrameDecoder;
pub use events::ScreeningEvent;
pub use export::{ExportReport, ExportSerializer, SessionSnapshot};
pub use pagination::{RevealController, VisibilityObserver};
pub use selection::{SelectionSet, SelectionStatus, MAX_SELECTION};
pub use session::{ScreeningSession, SessionAction, SessionEffect};
pub use store::ResultStore;
