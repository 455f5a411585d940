// Protocol layer: downstream WebSocket messages and upstream pool JSON-RPC

pub mod messages;
pub mod parser;
pub mod types;

pub use messages::{ClientMessage, ProxyMessage, ShareSubmission};
pub use parser::{PoolMessage, PoolParser};
