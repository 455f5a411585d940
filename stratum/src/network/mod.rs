// Network layer - client WebSocket sessions

pub mod connection;
pub mod handler;

pub use connection::DisconnectReason;
pub use handler::WebSocketHandler;
