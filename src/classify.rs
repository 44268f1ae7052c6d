//! Interpretation of the untagged-response stream.
//!
//! Two pure decision layers: [`classify`] routes a response as it arrives
//! (buffer it, treat it as the server accepting `IDLE`, or ignore it), and
//! [`decide_sync`] interprets a buffered response once the connection goes
//! quiet, deciding between a full folder sync, a flag-only update, or
//! nothing.

use tracing::debug;

use crate::types::{FetchAttribute, FlagUpdate, Seq, UntaggedResponse};

/// What to do with an untagged response the moment it arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Classification {
    /// A continuation request: the server accepted `IDLE` and is holding
    /// the connection for us.
    IdleAccepted,
    /// A mailbox change worth interpreting once the stream quiesces.
    Buffer,
    /// Nothing the pusher reacts to.
    Ignore,
}

/// Route one untagged response.
pub(crate) fn classify(response: &UntaggedResponse) -> Classification {
    match response {
        UntaggedResponse::Continue { .. } => Classification::IdleAccepted,
        UntaggedResponse::Exists(_)
        | UntaggedResponse::Expunge(_)
        | UntaggedResponse::Fetch { .. }
        | UntaggedResponse::Vanished { .. } => Classification::Buffer,
        _ => Classification::Ignore,
    }
}

/// Folder facts a sync decision depends on.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SyncContext {
    /// The lowest sequence number still inside the host's display window.
    pub(crate) smallest_seq_num: Seq,
    /// Whether the connection has QRESYNC enabled.
    pub(crate) qresync: bool,
}

/// The outcome of interpreting one buffered response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SyncDecision {
    /// The change is outside the display window; drop it.
    Ignore,
    /// The host must re-synchronize the folder.
    Sync,
    /// A QRESYNC flag change that can be applied without a re-sync.
    FlagsChanged {
        update: FlagUpdate,
        modseq: Option<u64>,
    },
}

/// The lowest sequence number the host still displays.
///
/// With `message_count` messages in the folder and the newest
/// `display_count` of them shown, everything below this number is invisible
/// to the user and never worth a sync.
pub(crate) fn smallest_seq_num(message_count: u32, display_count: u32) -> Seq {
    (message_count.saturating_sub(display_count) + 1).max(1)
}

/// Interpret one buffered untagged response.
pub(crate) fn decide_sync(response: &UntaggedResponse, ctx: &SyncContext) -> SyncDecision {
    match response {
        UntaggedResponse::Expunge(seq) => {
            debug!(seq, "got untagged EXPUNGE");
            if *seq >= ctx.smallest_seq_num {
                SyncDecision::Sync
            } else {
                debug!(seq, "expunged message is below the display window");
                SyncDecision::Ignore
            }
        }
        UntaggedResponse::Fetch { seq, attributes } => {
            debug!(seq, "got untagged FETCH");
            if *seq < ctx.smallest_seq_num {
                debug!(seq, "fetched message is below the display window");
                SyncDecision::Ignore
            } else if ctx.qresync {
                flag_change(attributes)
            } else {
                SyncDecision::Sync
            }
        }
        UntaggedResponse::Exists(count) => {
            debug!(count, "got untagged EXISTS");
            SyncDecision::Sync
        }
        UntaggedResponse::Vanished { uids, .. } => {
            debug!(?uids, "got untagged VANISHED");
            SyncDecision::Sync
        }
        _ => SyncDecision::Ignore,
    }
}

/// Extract a [`FlagUpdate`] from a QRESYNC `FETCH` attribute list.
///
/// A response with no `UID` attribute cannot be applied locally and
/// degrades to a full sync request.
fn flag_change(attributes: &[FetchAttribute]) -> SyncDecision {
    let mut uid = None;
    let mut flags = Vec::new();
    let mut modseq = None;

    for attribute in attributes {
        match attribute {
            FetchAttribute::Uid(u) => uid = Some(*u),
            FetchAttribute::Flags(f) => flags = f.clone(),
            FetchAttribute::ModSeq(m) => modseq = Some(*m),
        }
    }

    match uid {
        Some(uid) => SyncDecision::FlagsChanged {
            update: FlagUpdate { uid, flags },
            modseq,
        },
        None => SyncDecision::Sync,
    }
}
