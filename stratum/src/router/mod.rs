//! Central coordinator between the pool session and connected miners

mod commands;
mod handle;
mod proxy;

pub use commands::RouterCommand;
pub use handle::RouterHandle;
pub use proxy::ProxyRouter;
