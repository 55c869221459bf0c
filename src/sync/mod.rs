pub mod orchestrator;
pub mod retry;

pub use orchestrator::{SyncOptions, SyncOrchestrator, DEFAULT_BATCH_SIZE};
pub use retry::RetryPolicy;
