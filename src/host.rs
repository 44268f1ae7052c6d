//! The seams between the push engine and its host.
//!
//! The pusher deliberately knows nothing about sockets, TLS, authentication
//! or the wire codec. The host hands it a [`Folder`] (an open mailbox
//! folder with its own connection underneath), a [`PushReceiver`] (where
//! sync requests and errors go), a [`StoreConfig`] (account tunables) and a
//! [`WakeLock`] (power management). Everything the engine does goes through
//! these traits.

use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{FlagUpdate, Uid, UntaggedResponse};

/// A connection handle shared between the worker thread and the host
/// threads calling [`FolderPusher::refresh`]/[`FolderPusher::stop`].
///
/// The handle must stay usable for control operations (sending the `DONE`
/// continuation, adjusting the read timeout, closing) while another thread
/// is blocked reading responses inside [`Folder::execute_command`], the
/// same way a socket can be shut down from one thread to unblock a read on
/// another.
///
/// [`FolderPusher::refresh`]: crate::FolderPusher::refresh
/// [`FolderPusher::stop`]: crate::FolderPusher::stop
pub type SharedConnection = Arc<Mutex<dyn Connection + Send>>;

/// Control surface of one open folder connection.
pub trait Connection: Send {
    /// Whether the server advertised the named capability.
    fn has_capability(&mut self, name: &str) -> Result<bool>;

    /// Adjust the socket read timeout for subsequent reads.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Send a continuation line, e.g. the literal `DONE` that terminates an
    /// outstanding `IDLE`.
    fn send_continuation(&mut self, text: &str) -> Result<()>;

    /// Non-blocking check for already-received, not-yet-delivered
    /// responses.
    fn more_responses_available(&mut self) -> bool;

    /// Close the underlying socket. Must unblock a concurrent read.
    fn close(&mut self);
}

impl Debug for dyn Connection + Send {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "folder connection")
    }
}

/// Called back by [`Folder::execute_command`] for every untagged response
/// that arrives while the command is outstanding.
pub trait UntaggedHandler {
    /// Handle one untagged response, in arrival order.
    ///
    /// An error returned from here must abort the running command and
    /// propagate out of [`Folder::execute_command`].
    fn on_untagged(&mut self, response: &UntaggedResponse) -> Result<()>;
}

/// One mailbox folder, with a connection underneath.
///
/// Implementations must synchronize internally: the pusher calls `close`
/// from host threads while its worker thread may be blocked inside
/// [`Folder::execute_command`], and expects the close to break that read.
pub trait Folder: Send + Sync {
    /// Open the folder read-only, reconnecting if needed. A no-op if the
    /// folder is already open.
    fn open_read_only(&self) -> Result<()>;

    /// Close the folder and its connection. Never fails; must unblock a
    /// concurrent [`Folder::execute_command`].
    fn close(&self);

    /// Whether the folder is currently open.
    fn is_open(&self) -> bool;

    /// The `UIDNEXT` value reported for this folder, or `None` if the
    /// server did not provide one.
    fn uid_next(&self) -> Result<Option<Uid>>;

    /// The highest UID present in the folder, or `None` if it cannot be
    /// determined.
    fn highest_uid(&self) -> Result<Option<Uid>>;

    /// The number of messages currently in the folder.
    fn message_count(&self) -> u32;

    /// Whether the connection underneath has QRESYNC enabled.
    fn supports_qresync(&self) -> bool;

    /// Run the named command, feeding every untagged response to `handler`
    /// in arrival order. Blocks until the command completes or fails, and
    /// propagates handler errors.
    fn execute_command(&self, command: &str, handler: &mut dyn UntaggedHandler) -> Result<()>;

    /// A shared handle to the folder's current connection, for out-of-band
    /// control while a command is outstanding. Fails if the folder is not
    /// open.
    fn connection(&self) -> Result<SharedConnection>;
}

/// Host-side sink for everything the pusher decides.
///
/// The receiver also owns the persisted push state: the engine reads the
/// cursor through [`PushReceiver::push_state`] at the top of every loop
/// iteration, and the host is expected to update it as part of handling
/// [`PushReceiver::sync_folder`].
pub trait PushReceiver: Send + Sync {
    /// The named folder should be re-synchronized with the server.
    fn sync_folder(&self, folder: &str);

    /// A single message's flags changed; apply without a full re-sync.
    fn message_flags_changed(&self, folder: &str, update: FlagUpdate);

    /// The folder's highest modification sequence advanced.
    fn highest_mod_seq_changed(&self, folder: &str, modseq: u64);

    /// Push for the named folder became active/inactive.
    fn set_push_active(&self, folder: &str, active: bool);

    /// A push failure, with the underlying error when there is one.
    fn push_error(&self, message: &str, cause: Option<&Error>);

    /// The server rejected our credentials; pushing stops.
    fn authentication_failed(&self);

    /// Sleep for the given duration during backoff. The wake-lock is passed
    /// so the host can decide how the sleep interacts with power
    /// management.
    fn sleep(&self, wake_lock: &dyn WakeLock, duration: Duration);

    /// The persisted push state for the named folder, as written by a
    /// previous run, or `None` if there is none.
    fn push_state(&self, folder: &str) -> Option<String>;
}

/// Account-level tunables the pusher consults.
pub trait StoreConfig: Send + Sync {
    /// How many of the newest messages the host displays; changes to
    /// anything older never trigger a sync.
    fn display_count(&self) -> u32;

    /// How often the server-side `IDLE` should be refreshed, in minutes.
    fn idle_refresh_minutes(&self) -> u32;

    /// Whether to request a sync every time the folder connection is
    /// (re)established.
    fn push_poll_on_connect(&self) -> bool;
}

/// A host-provided lock that keeps the device awake while held.
///
/// The lock is a single-holder switch, not a counter: `acquire` while held
/// simply renews the window, and one `release` suffices regardless of how
/// many times it was acquired.
pub trait WakeLock: Send + Sync {
    /// Hold the lock for at most `timeout`.
    fn acquire(&self, timeout: Duration);

    /// Release the lock.
    fn release(&self);
}
