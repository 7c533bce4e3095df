//! Transport abstraction between the dispatcher and a client stream.
//!
//! The dispatcher only needs text frames in, text frames out and a way to
//! hang up. [`Transport`] captures that so the relay core runs unchanged over
//! axum's [`WebSocket`] in production and over in-memory channels in tests.

use std::future::Future;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::{SinkExt, StreamExt};

use crate::error::{ProtocolError, RelayError, TransportError};

/// A persistent, bidirectional stream of text frames to one client.
pub trait Transport: Send {
    /// Waits for the next text frame. `None` once the peer has gone away.
    ///
    /// Errors are either [`TransportError`] (the stream is unusable) or
    /// [`ProtocolError`] (the client sent something that is not a text
    /// frame; the stream still works and the client gets told).
    ///
    /// Must be cancel-safe: the dispatcher races it against its outbound
    /// queue.
    fn receive(&mut self) -> impl Future<Output = Option<Result<String, RelayError>>> + Send;

    /// Writes one text frame.
    fn send(&mut self, text: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Terminates the stream. Errors are ignored; the peer may be gone.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

impl Transport for WebSocket {
    async fn receive(&mut self) -> Option<Result<String, RelayError>> {
        loop {
            let msg = match StreamExt::next(self).await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(TransportError::Io(e.to_string()).into())),
            };
            match msg {
                Message::Text(text) => return Some(Ok(text.as_str().to_owned())),
                Message::Binary(bytes) => return Some(decode_binary(&bytes)),
                Message::Close(_) => return None,
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        SinkExt::send(self, Message::text(text))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) {
        let frame = CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        };
        if let Err(e) = SinkExt::send(self, Message::Close(Some(frame))).await {
            tracing::debug!(error = %e, "close frame not delivered");
        }
    }
}

/// Accepts a binary frame only if it carries UTF-8 text.
fn decode_binary(bytes: &[u8]) -> Result<String, RelayError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| ProtocolError::MalformedFrame(format!("binary frame is not UTF-8: {e}")).into())
}
