use std::ops::RangeInclusive;

use imap_proto::{AttributeValue, MailboxDatum, Response, Status};

use super::{Flag, Seq, Uid};

/// An untagged response delivered by the server while an `IDLE` command is
/// outstanding, already parsed by the host's wire codec.
///
/// [RFC 3501](https://tools.ietf.org/html/rfc3501#section-7) states that
/// clients need to be able to accept any response at any time; only the
/// shapes the push engine reacts to are enumerated here, everything else
/// should be fed through [`UntaggedResponse::Ok`]/[`UntaggedResponse::Bye`]
/// or dropped by the host. Note that `Exists`, `Expunge`, `Recent` and
/// `Fetch` refer to the currently selected folder.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum UntaggedResponse {
    /// A `+ …` continuation request: the server has accepted the `IDLE`
    /// command and is now holding the connection open for us.
    Continue {
        /// Information text sent with the continuation, e.g. `idling`.
        information: Option<String>,
    },

    /// An [`EXISTS` response](https://tools.ietf.org/html/rfc3501#section-7.3.1)
    /// reporting the number of messages in the folder.
    Exists(u32),

    /// An [`EXPUNGE` response](https://tools.ietf.org/html/rfc3501#section-7.4.1)
    /// reporting that the message with this sequence number has been
    /// permanently removed. Sequence numbers of all later messages are
    /// immediately decremented by one.
    Expunge(Seq),

    /// A [`RECENT` response](https://tools.ietf.org/html/rfc3501#section-7.3.2)
    /// with the number of messages carrying `\Recent`.
    Recent(u32),

    /// An unsolicited [`FETCH` response](https://tools.ietf.org/html/rfc3501#section-7.4.2),
    /// typically announcing a flag change on an existing message.
    Fetch {
        /// Sequence number of the affected message.
        seq: Seq,
        /// The attributes reported for this message.
        attributes: Vec<FetchAttribute>,
    },

    /// A [`VANISHED` response](https://tools.ietf.org/html/rfc7162#section-3.2.10)
    /// enumerating UIDs expunged from the folder. Only sent by servers with
    /// QRESYNC enabled.
    Vanished {
        /// Whether the `EARLIER` tag was set on the response.
        earlier: bool,
        /// The removed UIDs.
        uids: Vec<RangeInclusive<Uid>>,
    },

    /// An untagged `OK`, e.g. a keep-alive.
    Ok {
        /// Information text that may be presented to the user.
        information: Option<String>,
    },

    /// An untagged `BYE`: the server is closing the connection.
    Bye {
        /// Information text that may be presented to the user.
        information: Option<String>,
    },
}

/// A message attribute reported inside an unsolicited `FETCH` response.
///
/// Only the attributes the push engine consumes are modeled; anything else
/// the codec produces is dropped during conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum FetchAttribute {
    /// The unique identifier of the message.
    Uid(Uid),
    /// The flag set of the message.
    Flags(Vec<Flag<'static>>),
    /// The modification sequence of the message
    /// ([RFC 7162](https://tools.ietf.org/html/rfc7162)).
    ModSeq(u64),
}

/// Try to convert from an `imap_proto::Response`.
///
/// Hosts whose codec is `imap-proto` can feed the pusher directly from
/// their response stream. Only the variants a server plausibly sends while
/// an `IDLE` is outstanding are converted; for anything else the input
/// `Response` is returned so the host can decide what to do with it.
impl<'a> TryFrom<Response<'a>> for UntaggedResponse {
    type Error = Response<'a>;

    fn try_from(response: Response<'a>) -> Result<Self, Self::Error> {
        match response {
            Response::Continue { information, .. } => Ok(UntaggedResponse::Continue {
                information: information.map(|s| s.to_string()),
            }),
            Response::Expunge(seq) => Ok(UntaggedResponse::Expunge(seq)),
            Response::Fetch(seq, attributes) => Ok(UntaggedResponse::Fetch {
                seq,
                attributes: attributes.iter().filter_map(convert_attribute).collect(),
            }),
            Response::MailboxData(MailboxDatum::Exists(n)) => Ok(UntaggedResponse::Exists(n)),
            Response::MailboxData(MailboxDatum::Recent(n)) => Ok(UntaggedResponse::Recent(n)),
            Response::Vanished { earlier, uids } => {
                Ok(UntaggedResponse::Vanished { earlier, uids })
            }
            Response::Data {
                status: Status::Ok,
                information,
                ..
            } => Ok(UntaggedResponse::Ok {
                information: information.map(|s| s.to_string()),
            }),
            Response::Data {
                status: Status::Bye,
                information,
                ..
            } => Ok(UntaggedResponse::Bye {
                information: information.map(|s| s.to_string()),
            }),
            _ => Err(response),
        }
    }
}

fn convert_attribute(attr: &AttributeValue<'_>) -> Option<FetchAttribute> {
    match attr {
        AttributeValue::Uid(uid) => Some(FetchAttribute::Uid(*uid)),
        AttributeValue::Flags(flags) => Some(FetchAttribute::Flags(
            flags.iter().map(|f| Flag::from(f.to_string())).collect(),
        )),
        AttributeValue::ModSeq(modseq) => Some(FetchAttribute::ModSeq(*modseq)),
        _ => None,
    }
}
