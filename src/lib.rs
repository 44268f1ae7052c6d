//! A push engine for IMAP mailbox folders.
//!
//! This crate implements the client side of [IMAP
//! `IDLE`](https://tools.ietf.org/html/rfc2177) as a long-lived worker: one
//! [`FolderPusher`] per folder keeps a connection parked in `IDLE`, watches
//! the untagged responses the server pushes while the command is
//! outstanding, and tells the host *when* it should re-synchronize and, on
//! [QRESYNC](https://tools.ietf.org/html/rfc7162) connections, *which* flag
//! updates can be applied without a full re-sync.
//!
//! The engine is deliberately transport- and codec-agnostic. The host
//! brings its own connection management, authentication and response
//! parser, and plugs them in through the traits in this crate:
//!
//! - [`Folder`]: an openable mailbox folder that can run commands and
//!   report `UIDNEXT`/message counts,
//! - [`Connection`]: the out-of-band control surface of the folder's
//!   connection (capability check, read timeout, the `DONE` continuation),
//! - [`PushReceiver`]: where sync requests, flag changes and errors go,
//! - [`StoreConfig`]: account tunables (display window, refresh interval),
//! - [`WakeLock`]: a power-management hook so the device can sleep while
//!   the server holds the connection.
//!
//! Hosts whose codec is [`imap-proto`](https://docs.rs/imap-proto) can
//! convert responses with `UntaggedResponse::try_from` and feed the
//! pusher's callback directly.
//!
//! The worker survives flaky connections by closing and reopening the
//! folder with exponential backoff (5 s doubling to 5 min), resets the
//! ladder after every successful `IDLE` cycle, and disables itself after
//! [`IDLE_FAILURE_COUNT_LIMIT`] consecutive failures. A persisted one-line
//! cursor ([`PushState`]) keeps restarts from re-announcing mail the host
//! already saw.

#![warn(missing_docs)]

mod buffer;
mod classify;
mod host;
mod pusher;
mod session;
mod state;

pub mod error;
pub mod types;

pub use crate::error::{Error, Result};
pub use crate::host::{
    Connection, Folder, PushReceiver, SharedConnection, StoreConfig, UntaggedHandler, WakeLock,
};
pub use crate::pusher::{
    FolderPusher, IDLE_FAILURE_COUNT_LIMIT, IDLE_READ_TIMEOUT_INCREMENT, MAX_DELAY_TIME,
    NORMAL_DELAY_TIME,
};
pub use crate::session::IdleSession;
pub use crate::state::PushState;
pub use crate::types::{FetchAttribute, Flag, FlagUpdate, Seq, Uid, UntaggedResponse};
