//! Types shared across the push engine.

/// A unique message identifier, from section [2.3.1.1 of RFC
/// 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.1).
///
/// UIDs are assigned in strictly ascending order as messages are added to
/// the mailbox, which is what makes `UIDNEXT` usable as a monotonic cursor:
/// any message arriving after the cursor was read will have a UID greater
/// than or equal to it.
pub type Uid = u32;

/// A message sequence number, from section [2.3.1.2 of RFC
/// 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.2).
///
/// A relative position from 1 to the number of messages in the mailbox.
/// Sequence numbers are reassigned during the session: when a message is
/// expunged, the sequence number of every later message is decremented.
pub type Seq = u32;

mod flag;
pub use self::flag::Flag;

mod response;
pub use self::response::{FetchAttribute, UntaggedResponse};

/// A flag change reported for a single message, extracted from a QRESYNC
/// `FETCH` response.
///
/// Delivered through [`PushReceiver::message_flags_changed`] so the host
/// can update its local copy without a full folder re-sync.
///
/// [`PushReceiver::message_flags_changed`]: crate::PushReceiver::message_flags_changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlagUpdate {
    /// The unique identifier of the changed message.
    pub uid: Uid,

    /// The complete new flag set of the message.
    pub flags: Vec<Flag<'static>>,
}
