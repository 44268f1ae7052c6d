//! Ownership of the connection while an `IDLE` command is outstanding.
//!
//! An [`IdleSession`] wraps one open folder connection for the duration of
//! one or more `IDLE` cycles. Its job is small but delicate: hand out
//! timeout control, and guarantee that the
//! [`DONE` continuation](https://tools.ietf.org/html/rfc2177#section-3)
//! terminating an outstanding `IDLE` is written to the wire at most once
//! per cycle, no matter how many threads ask for it.

use std::sync::Mutex;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};
use crate::host::SharedConnection;

/// The read timeout restored on the socket just before `DONE` is written,
/// so the tagged completion of the `IDLE` command cannot hang for the full
/// idle-refresh window.
pub(crate) const SOCKET_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// One folder connection, held for the duration of an `IDLE`.
///
/// The session moves through a small state machine, every transition
/// serialized under one lock:
///
/// ```text
/// (attached, not accepting) --start_accepting_done--> (attached, accepting)
/// (attached, accepting)     --stop_idle-->            (attached, not accepting), DONE sent
/// (attached, *)             --stop_accepting_done-->  (detached)
/// (detached)                --stop_idle-->            no-op
/// ```
///
/// A session is created each time the folder is (re)opened and abandoned on
/// any I/O failure; it is never re-attached.
#[derive(Debug)]
pub struct IdleSession {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    connection: Option<SharedConnection>,
    accepting_done: bool,
}

impl Inner {
    fn connection(&self) -> Result<&SharedConnection> {
        self.connection
            .as_ref()
            .ok_or(Error::BadState("idle session has no connection"))
    }
}

impl IdleSession {
    /// Wrap the given connection in a fresh session.
    pub fn new(connection: SharedConnection) -> IdleSession {
        IdleSession {
            inner: Mutex::new(Inner {
                connection: Some(connection),
                accepting_done: false,
            }),
        }
    }

    /// Whether the server advertised the `IDLE` capability.
    pub fn has_idle_capability(&self) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        let connection = inner.connection()?;
        let has = connection.lock().unwrap().has_capability("IDLE");
        has
    }

    /// Adjust the connection's read timeout.
    pub fn set_read_timeout(&self, timeout: Duration) -> Result<()> {
        let inner = self.inner.lock().unwrap();
        let connection = inner.connection()?;
        let result = connection.lock().unwrap().set_read_timeout(timeout);
        result
    }

    /// Non-blocking check for responses that have already arrived but not
    /// yet been delivered. `false` once the connection is detached.
    pub fn more_responses_available(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        match &inner.connection {
            Some(connection) => connection.lock().unwrap().more_responses_available(),
            None => false,
        }
    }

    /// Arm the `DONE` guard.
    ///
    /// Called when the server answers the `IDLE` command with a `+`
    /// continuation: from here until [`IdleSession::stop_idle`] or
    /// [`IdleSession::stop_accepting_done`], the session will terminate the
    /// cycle on request. Fails with [`Error::BadState`] if the connection
    /// has already been detached.
    pub fn start_accepting_done(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.connection()?;
        inner.accepting_done = true;
        Ok(())
    }

    /// Disarm the guard and detach the connection.
    ///
    /// Runs unconditionally after every `IDLE` command returns; any later
    /// [`IdleSession::stop_idle`] on this session is a no-op.
    pub fn stop_accepting_done(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.accepting_done = false;
        inner.connection = None;
    }

    /// Terminate an outstanding `IDLE` by sending `DONE`, at most once.
    ///
    /// If the guard is not armed this does nothing, so callers never need
    /// to know whether an `IDLE` is actually in flight. A failure to write
    /// `DONE` closes the connection and is otherwise absorbed: the blocked
    /// `IDLE` command will surface a more useful error through its own
    /// return path.
    ///
    /// The write happens while the session lock is held; a host whose
    /// [`Connection::send_continuation`](crate::Connection::send_continuation)
    /// can block on write backpressure will stall concurrent session calls
    /// for that duration.
    pub fn stop_idle(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.accepting_done {
            return;
        }
        inner.accepting_done = false;

        if let Some(connection) = &inner.connection {
            let mut connection = connection.lock().unwrap();
            let mut send_done = || -> Result<()> {
                connection.set_read_timeout(SOCKET_READ_TIMEOUT)?;
                connection.send_continuation("DONE")
            };
            if let Err(err) = send_done() {
                warn!("failed to terminate IDLE, closing the connection: {err}");
                connection.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Connection;
    use std::io::{Error as IoError, ErrorKind};
    use std::sync::Arc;

    #[derive(Default)]
    struct MockConnection {
        continuations: Vec<String>,
        read_timeout: Option<Duration>,
        more_available: bool,
        closed: bool,
        fail_send: bool,
    }

    impl Connection for MockConnection {
        fn has_capability(&mut self, name: &str) -> Result<bool> {
            Ok(name == "IDLE")
        }

        fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
            self.read_timeout = Some(timeout);
            Ok(())
        }

        fn send_continuation(&mut self, text: &str) -> Result<()> {
            if self.fail_send {
                return Err(Error::Io(IoError::new(ErrorKind::BrokenPipe, "gone")));
            }
            self.continuations.push(text.to_string());
            Ok(())
        }

        fn more_responses_available(&mut self) -> bool {
            self.more_available
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn mock_session(connection: MockConnection) -> (IdleSession, Arc<Mutex<MockConnection>>) {
        let connection = Arc::new(Mutex::new(connection));
        let shared: SharedConnection = connection.clone();
        (IdleSession::new(shared), connection)
    }

    #[test]
    fn done_is_sent_at_most_once() {
        let (session, connection) = mock_session(MockConnection::default());

        session.start_accepting_done().unwrap();
        session.stop_idle();
        session.stop_idle();

        assert_eq!(connection.lock().unwrap().continuations, vec!["DONE"]);
    }

    #[test]
    fn stop_idle_without_continuation_is_a_no_op() {
        let (session, connection) = mock_session(MockConnection::default());

        session.stop_idle();

        assert!(connection.lock().unwrap().continuations.is_empty());
    }

    #[test]
    fn done_restores_the_normal_read_timeout_first() {
        let (session, connection) = mock_session(MockConnection::default());

        session.set_read_timeout(Duration::from_secs(35 * 60)).unwrap();
        session.start_accepting_done().unwrap();
        session.stop_idle();

        let connection = connection.lock().unwrap();
        assert_eq!(connection.read_timeout, Some(SOCKET_READ_TIMEOUT));
        assert_eq!(connection.continuations, vec!["DONE"]);
    }

    #[test]
    fn failed_done_write_closes_the_connection() {
        let (session, connection) = mock_session(MockConnection {
            fail_send: true,
            ..MockConnection::default()
        });

        session.start_accepting_done().unwrap();
        session.stop_idle();

        let connection = connection.lock().unwrap();
        assert!(connection.closed);
        assert!(connection.continuations.is_empty());
    }

    #[test]
    fn detached_session_rejects_arming_and_absorbs_stop_idle() {
        let (session, connection) = mock_session(MockConnection::default());

        session.stop_accepting_done();

        assert!(matches!(
            session.start_accepting_done(),
            Err(Error::BadState(_))
        ));
        session.stop_idle();
        assert!(connection.lock().unwrap().continuations.is_empty());
        assert!(!session.more_responses_available());
    }

    #[test]
    fn stop_accepting_done_disarms_a_pending_done() {
        let (session, connection) = mock_session(MockConnection::default());

        session.start_accepting_done().unwrap();
        session.stop_accepting_done();
        session.stop_idle();

        assert!(connection.lock().unwrap().continuations.is_empty());
    }

    #[test]
    fn more_responses_available_asks_the_connection() {
        let (session, _connection) = mock_session(MockConnection {
            more_available: true,
            ..MockConnection::default()
        });

        assert!(session.more_responses_available());
    }

    #[test]
    fn capability_check_goes_through_the_connection() {
        let (session, _connection) = mock_session(MockConnection::default());
        assert!(session.has_idle_capability().unwrap());
    }
}
