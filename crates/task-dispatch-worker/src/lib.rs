pub mod config;
pub mod consumer;
pub mod handler;
pub mod heartbeat;
pub mod invoke;

pub use config::WorkerConfig;
pub use consumer::{Consumer, ShutdownHandle};
pub use handler::{Handler, HandlerRegistry};
