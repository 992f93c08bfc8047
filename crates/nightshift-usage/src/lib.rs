mod adapters;
mod error;
mod oracle;

pub use adapters::{CannedAdapter, ClaudeAdapter, CodexAdapter, OllamaAdapter, ScrapeResult, UsageAdapter};
pub use error::{UsageReadError, UsageResult};
pub use oracle::UsageOracle;
