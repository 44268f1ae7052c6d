//! Holding area for untagged responses received during an `IDLE`.
//!
//! The command engine delivers untagged responses from inside a blocking
//! read; interesting ones are parked here and only interpreted once the
//! connection goes quiet. The buffer preserves arrival order.

use std::sync::Mutex;

use crate::types::UntaggedResponse;

/// A mutex-guarded, ordered list of buffered untagged responses.
///
/// The lock is held only for the list operations themselves; callers get
/// the drained responses back by value and interpret them with no lock
/// held, so receiver callbacks can never contend with the response stream.
#[derive(Debug, Default)]
pub struct UntaggedBuffer {
    responses: Mutex<Vec<UntaggedResponse>>,
}

impl UntaggedBuffer {
    /// Create an empty buffer.
    pub fn new() -> UntaggedBuffer {
        UntaggedBuffer::default()
    }

    /// Append a response at the end of the buffer.
    pub fn append(&self, response: UntaggedResponse) {
        self.responses.lock().unwrap().push(response);
    }

    /// Atomically take every buffered response, in arrival order, leaving
    /// the buffer empty.
    pub fn drain(&self) -> Vec<UntaggedResponse> {
        std::mem::take(&mut *self.responses.lock().unwrap())
    }

    /// Discard everything without interpreting it. Used when the folder is
    /// torn down after a failure.
    pub fn clear(&self) {
        self.responses.lock().unwrap().clear();
    }
}
