pub mod cancellation;
pub mod config;
pub mod event_bus;
pub mod storage_paths;

pub use cancellation::ShutdownHandle;
pub use config::{ConfigError, ConfigLayers, ConfigLoader, ConfigResult};
pub use event_bus::{EventBus, NightshiftEvent};
pub use storage_paths::StoragePaths;
