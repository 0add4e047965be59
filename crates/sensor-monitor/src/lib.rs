//! Sensor Monitor
//!
//! Configuration, session wiring and text reports for the operator CLI
//! built on the [`acquisition`] core.

pub mod config;
pub mod report;
pub mod session;

pub use config::{FileConfig, MonitorConfig};
pub use session::MonitorSession;
