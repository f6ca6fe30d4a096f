pub mod http;
pub mod session_archive;

pub use http::{HealthStatus, HttpChunkStream, HttpScreeningService};
pub use session_archive::{SessionArchive, SessionRecord, SessionStatus};
