pub mod fetcher;
pub mod orchestrator;
pub mod retry;
pub mod shutdown;
pub mod snapshot;

pub use fetcher::QuoteFetcher;
pub use orchestrator::Monitor;
pub use retry::RetryPolicy;
pub use shutdown::Shutdown;
