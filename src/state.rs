//! The persisted push cursor.
//!
//! One record survives process restarts: the last `UIDNEXT` the pusher
//! observed, serialized as the single line `uidNext=<N>`. The host stores
//! the string opaquely (see [`PushReceiver::push_state`]) and hands it back
//! on the next run.
//!
//! [`PushReceiver::push_state`]: crate::PushReceiver::push_state

use std::fmt;

/// The mailbox cursor carried across runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PushState {
    /// The last observed `UIDNEXT`, or `-1` if unknown.
    pub uid_next: i64,
}

impl PushState {
    /// Parse a serialized push state.
    ///
    /// Parsing is total: a missing key, an unrecognized key, or a garbled
    /// value all yield the unknown cursor, never an error.
    pub fn parse(s: &str) -> PushState {
        let mut uid_next = -1;
        if let Some((key, value)) = s.trim().split_once('=') {
            if key == "uidNext" {
                if let Ok(n) = value.parse::<i64>() {
                    uid_next = n;
                }
            }
        }
        PushState { uid_next }
    }
}

impl Default for PushState {
    fn default() -> PushState {
        PushState { uid_next: -1 }
    }
}

impl fmt::Display for PushState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uidNext={}", self.uid_next)
    }
}
