//! Shared pool session: state machine plus socket task

pub mod connection;
mod link;
mod state;

pub use connection::{
    ConnectRequest, Connector, TcpConnector, UpstreamEvent, UpstreamEventSender,
};
pub use link::{LinkEvent, Submitted, UpstreamLink};
pub use state::UpstreamState;
