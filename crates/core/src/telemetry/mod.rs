//! Tracing setup for native hosts
//!
//! Library code only emits `tracing` events; binaries and test harnesses that
//! embed the portal client call [`init_tracing`] once to install a subscriber.

pub mod config;
pub mod init;

pub use config::{LogConfig, LogFormat};
pub use init::init_tracing;
