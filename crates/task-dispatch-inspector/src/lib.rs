pub mod config;
pub mod inspector;

pub use config::InspectorConfig;
pub use inspector::{Inspector, ScanReport, ShutdownHandle};
