//! # chat-relay
//!
//! Real-time chat room relay over WebSocket.
//!
//! Clients connect to `GET /ws`, present a token in a `join` frame and are
//! placed into a named room. Every message a member sends is sequenced by the
//! room and fanned out to all members in the same order. Rooms are created on
//! first join and torn down once empty. A small read-only REST surface exposes
//! health and room state.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS Handler ──► Dispatcher (ws/)
//!     │                    │
//!     │                    ├── AuthGate ──► IdentityVerifier (auth/)
//!     │                    └── Connection ◄─ outbound queue
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     └── RoomRegistry ──► Room (domain/)
//!                            ├── members (ConnectionHandle)
//!                            └── history (ChatMessage)
//! ```
//!
//! ## Wire protocol
//!
//! ```text
//! → {"type":"join","room":"lobby","token":"t-alice"}
//! → {"type":"send","message":"hi"}
//! ← {"type":"message","sender":"alice","body":"hi","seq":1}
//! ← {"type":"error","code":"NotJoined","detail":"..."}
//! → {"type":"close"}            ← {"type":"close"}
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod ws;
