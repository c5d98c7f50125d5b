//! Portal HTTP gateway
//!
//! Every call to the portal API goes through [`PortalClient`], which attaches
//! the stored bearer token, recovers from an expired token with one shared
//! refresh, and turns an unrecoverable session into a login redirect.

pub mod client;
pub mod config;
pub mod types;

pub use client::error::ClientError;
pub use client::navigate::{HeadlessNavigator, LoginRedirect, Navigator};
pub use client::options::RequestOptions;
pub use client::refresh::{RefreshCoordinator, RefreshError};
pub use client::{PortalClient, PortalClientBuilder};
pub use config::GatewayConfig;

#[cfg(target_arch = "wasm32")]
pub use client::navigate::BrowserNavigator;

// Re-export the session layer so callers need a single dependency
pub use portal_core::{KeyValueStorage, SessionConfig, SessionStore};
