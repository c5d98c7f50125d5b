//! Portal core: persisted session state and the host capabilities it runs on

pub mod clock;
pub mod config;
pub mod error;
pub mod keys;
pub mod session;
pub mod storage;
#[cfg(all(feature = "telemetry", not(target_arch = "wasm32")))]
pub mod telemetry;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use error::{CoreError, CoreResult};
pub use keys::StorageKeys;
pub use session::{Session, SessionStore};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use types::PortalUser;

#[cfg(target_arch = "wasm32")]
pub use storage::BrowserStorage;
