mod registry;
mod session;

pub use registry::ClientRegistry;
pub use session::{ClientId, ClientSession, Outbound, OutboundSender};
