//! WebSocket layer: transport, frames, connection state and dispatch.
//!
//! The WebSocket endpoint at `/ws` carries the JSON frame protocol. Each
//! accepted socket is served by one [`dispatcher::Dispatcher::on_connect`]
//! task.

pub mod connection;
pub mod dispatcher;
pub mod handler;
pub mod messages;
pub mod transport;

pub use connection::{Connection, ConnectionHandle, ConnectionState};
pub use dispatcher::{Dispatcher, DispatcherSettings};
pub use messages::{ClientFrame, ServerFrame};
pub use transport::Transport;
