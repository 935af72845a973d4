pub mod dispatcher;
pub mod orchestrator;
pub mod result;
pub mod summary;

pub use dispatcher::Dispatcher;
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use result::{DocumentResult, Outcome, ResultStatus, Sentinel, CSV_HEADERS};
pub use summary::{FailedFile, FileSummary, InvocationSummary};
