//! In-process pool used by tests and the `mock-pool` subcommand

pub mod config;
pub mod job_manager;
pub mod pool;
pub mod responses;
pub mod validator;

pub use config::MockConfig;
pub use pool::{MockPool, MockPoolHandle, RecordedShare};
