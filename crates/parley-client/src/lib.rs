//! Client
//!
//! Action-based sync engine for the Parley chat client. Keeps the viewer's
//! conversations, messages, typing indicators, presence and read cursors
//! consistent across REST responses, WebSocket frames and optimistic sends.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and Action-Based patterns as
//! [`parley_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`]) for
//! the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine, single writer of the session
//! - [`Session`]: Immutable snapshot readers render from
//! - [`dispatcher`]: Inbound frame decoding and routing
//! - [`Reconciler`]: Optimistic sends and their confirmation
//! - [`TypingTracker`], [`PresenceMap`], [`ReadReceipts`]: Ephemeral state
//!
//! # Transport and API (optional)
//!
//! With the `transport` feature enabled, this crate also provides
//! [`transport::ConnectedClient`], a WebSocket connection task. The `api`
//! feature adds [`api::ApiClient`] for the REST endpoints.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
pub mod dispatcher;
mod error;
mod event;
mod presence;
mod receipts;
mod reconciler;
mod session;
mod typing;

#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "transport")]
pub mod transport;

pub use client::{Client, ClientConfig, DEFAULT_TYPING_EXPIRY};
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent, LogLevel, RequestId, RestFailure};
pub use parley_core::{ChannelState, Environment};
pub use presence::PresenceMap;
pub use receipts::ReadReceipts;
pub use reconciler::{DeliveryPath, Incoming, Reconciler, SendCompletion};
pub use session::{Confirmation, ConnectionStatus, LocalMessage, Session};
pub use typing::{TypingLabel, TypingTracker};
