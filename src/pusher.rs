//! The per-folder push worker and its control surface.
//!
//! A [`FolderPusher`] owns one dedicated worker thread per folder. The
//! worker keeps the folder connection parked in `IDLE`, reacts to the
//! untagged responses the server pushes while the command is outstanding,
//! and asks the host to re-synchronize when something inside the display
//! window changed. Flaky connections are survived with an exponential
//! backoff that gives up after too many consecutive failures, so a dead
//! server cannot drain a mobile battery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::buffer::UntaggedBuffer;
use crate::classify::{self, Classification, SyncContext, SyncDecision};
use crate::error::{Error, Result};
use crate::host::{Folder, PushReceiver, StoreConfig, UntaggedHandler, WakeLock};
use crate::session::IdleSession;
use crate::state::PushState;
use crate::types::UntaggedResponse;

/// Grace period added on top of the configured idle refresh interval when
/// setting the socket read timeout for an `IDLE`. A server that refreshes
/// in time never trips the timeout; a truly hung connection does.
pub const IDLE_READ_TIMEOUT_INCREMENT: Duration = Duration::from_secs(5 * 60);

/// How many consecutive failures the retry ladder tolerates before the
/// pusher disables itself for good.
pub const IDLE_FAILURE_COUNT_LIMIT: u32 = 10;

/// Upper bound of the retry backoff.
pub const MAX_DELAY_TIME: Duration = Duration::from_secs(5 * 60);

/// Initial retry delay, restored after every successful `IDLE` cycle.
pub const NORMAL_DELAY_TIME: Duration = Duration::from_secs(5);

/// Control state shared between the worker thread and the host threads
/// calling [`FolderPusher::refresh`]/[`FolderPusher::stop`].
#[derive(Debug, Default)]
struct Control {
    stop: AtomicBool,
    idling: AtomicBool,
    session: Mutex<Option<Arc<IdleSession>>>,
}

impl Control {
    fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn set_idling(&self, idling: bool) {
        self.idling.store(idling, Ordering::SeqCst);
    }

    fn idling(&self) -> bool {
        self.idling.load(Ordering::SeqCst)
    }

    fn install_session(&self, session: Arc<IdleSession>) {
        *self.session.lock().unwrap() = Some(session);
    }

    fn session(&self) -> Option<Arc<IdleSession>> {
        self.session.lock().unwrap().clone()
    }
}

/// Keeps one mailbox folder pushed.
///
/// Created once per folder, started once, stopped once:
///
/// - [`FolderPusher::start`] launches the worker thread.
/// - [`FolderPusher::refresh`] ends the current `IDLE` cleanly (via `DONE`)
///   so the worker re-reads the folder state right away.
/// - [`FolderPusher::stop`] shuts the worker down and closes the folder to
///   break a blocked read.
///
/// All collaborators are injected; the pusher holds no global state.
pub struct FolderPusher {
    worker: Arc<PushWorker>,
    thread: Mutex<ThreadState>,
}

enum ThreadState {
    NotStarted,
    Running(JoinHandle<()>),
    Stopped,
}

impl FolderPusher {
    /// Create a pusher for the named folder.
    ///
    /// `wake_lock_timeout` bounds every wake-lock window the pusher
    /// acquires; pick it long enough to cover folder setup plus one sync
    /// request.
    pub fn new(
        folder_name: impl Into<String>,
        folder: Arc<dyn Folder>,
        config: Arc<dyn StoreConfig>,
        receiver: Arc<dyn PushReceiver>,
        wake_lock: Arc<dyn WakeLock>,
        wake_lock_timeout: Duration,
    ) -> FolderPusher {
        FolderPusher {
            worker: Arc::new(PushWorker {
                name: folder_name.into(),
                folder,
                config,
                receiver,
                wake_lock,
                wake_lock_timeout,
                buffer: UntaggedBuffer::new(),
                control: Control::default(),
            }),
            thread: Mutex::new(ThreadState::NotStarted),
        }
    }

    /// The folder this pusher watches.
    pub fn name(&self) -> &str {
        &self.worker.name
    }

    /// Launch the worker thread. Fails with [`Error::BadState`] if called
    /// more than once.
    pub fn start(&self) -> Result<()> {
        let mut thread = self.thread.lock().unwrap();
        match *thread {
            ThreadState::NotStarted => {
                let worker = Arc::clone(&self.worker);
                let handle = thread::Builder::new()
                    .name(format!("imap-push-{}", self.worker.name))
                    .spawn(move || worker.run())?;
                *thread = ThreadState::Running(handle);
                Ok(())
            }
            _ => Err(Error::BadState("start() called twice")),
        }
    }

    /// End the current `IDLE` so the worker polls the folder immediately.
    ///
    /// The `IDLE` is terminated cleanly with `DONE`, preserving the
    /// connection for the next cycle. A no-op when the worker is not
    /// currently idling.
    pub fn refresh(&self) {
        if self.worker.control.idling() {
            self.worker.wake_lock.acquire(self.worker.wake_lock_timeout);
            if let Some(session) = self.worker.control.session() {
                session.stop_idle();
            }
        }
    }

    /// Shut the pusher down.
    ///
    /// Cooperative: sets the stop flag and closes the folder, which breaks
    /// the worker out of a blocked read. Fails with [`Error::BadState`]
    /// unless called exactly once after [`FolderPusher::start`].
    pub fn stop(&self) -> Result<()> {
        {
            let mut thread = self.thread.lock().unwrap();
            match std::mem::replace(&mut *thread, ThreadState::Stopped) {
                ThreadState::Running(_handle) => {
                    self.worker.control.request_stop();
                }
                other => {
                    *thread = other;
                    return Err(Error::BadState("stop() called twice"));
                }
            }
        }

        if self.worker.folder.is_open() {
            debug!(folder = %self.worker.name, "closing folder to stop pushing");
            self.worker.folder.close();
        } else {
            warn!(folder = %self.worker.name, "no open folder to close while stopping push");
        }
        Ok(())
    }
}

/// The worker half: everything that runs on the dedicated thread, plus the
/// state the untagged callback needs to reach.
struct PushWorker {
    name: String,
    folder: Arc<dyn Folder>,
    config: Arc<dyn StoreConfig>,
    receiver: Arc<dyn PushReceiver>,
    wake_lock: Arc<dyn WakeLock>,
    wake_lock_timeout: Duration,
    buffer: UntaggedBuffer,
    control: Control,
}

impl PushWorker {
    fn run(&self) {
        self.wake_lock.acquire(self.wake_lock_timeout);
        info!(folder = %self.name, "pusher starting");

        let mut last_uid_next: i64 = -1;
        let mut needs_poll = false;
        let mut delay_time = NORMAL_DELAY_TIME;
        let mut idle_failure_count: u32 = 0;

        while !self.control.stopping() {
            match self.iterate(&mut last_uid_next, &mut needs_poll) {
                Ok(idled) => {
                    if idled {
                        delay_time = NORMAL_DELAY_TIME;
                        idle_failure_count = 0;
                    }
                }
                Err(Error::AuthenticationFailed(msg)) => {
                    self.clean_up_after_failure();
                    error!(folder = %self.name, "authentication failed, stopping pusher: {msg}");
                    self.receiver.authentication_failed();
                    self.control.request_stop();
                }
                Err(err) => {
                    self.clean_up_after_failure();
                    if self.control.stopping() {
                        info!(folder = %self.name, "error while idling, but pusher is stopping: {err}");
                        continue;
                    }

                    error!(folder = %self.name, "error while idling: {err}");
                    self.receiver
                        .push_error(&format!("Push error for {}", self.name), Some(&err));
                    self.receiver.sleep(&*self.wake_lock, delay_time);

                    delay_time = (delay_time * 2).min(MAX_DELAY_TIME);
                    idle_failure_count += 1;
                    if idle_failure_count > IDLE_FAILURE_COUNT_LIMIT {
                        error!(
                            folder = %self.name,
                            idle_failure_count,
                            "disabling pusher after consecutive errors"
                        );
                        self.receiver.push_error(
                            &format!(
                                "Push disabled for {} after {} consecutive errors",
                                self.name, idle_failure_count
                            ),
                            Some(&err),
                        );
                        self.control.request_stop();
                    }
                }
            }
        }

        self.receiver.set_push_active(&self.name, false);
        info!(folder = %self.name, "pusher exiting");
        self.folder.close();
        self.wake_lock.release();
    }

    /// One trip through the loop: open if needed, poll if asked, and either
    /// request a sync (when the cursor moved) or park in `IDLE`.
    ///
    /// Returns whether an `IDLE` cycle completed, which is what resets the
    /// retry ladder.
    fn iterate(&self, last_uid_next: &mut i64, needs_poll: &mut bool) -> Result<bool> {
        self.wake_lock.acquire(self.wake_lock_timeout);

        let mut old_uid_next = self.old_uid_next();
        // A lagging host can hand back a cursor older than a UIDNEXT we
        // already reported. The cursor never moves backwards within one
        // worker lifetime, or the loop would issue the same sync endlessly.
        if old_uid_next < *last_uid_next {
            old_uid_next = *last_uid_next;
        }

        let opened_new = self.open_folder_if_closed()?;
        if self.control.stopping() {
            return Ok(false);
        }

        if self.config.push_poll_on_connect() && (opened_new || *needs_poll) {
            *needs_poll = false;
            self.receiver.sync_folder(&self.name);
        }
        if self.control.stopping() {
            return Ok(false);
        }

        let new_uid_next = self.new_uid_next()?;
        *last_uid_next = new_uid_next;
        let start_uid = start_uid(old_uid_next, new_uid_next, self.config.display_count());

        if new_uid_next > start_uid {
            debug!(
                folder = %self.name,
                new_uid_next, start_uid, "messages arrived since the last sync"
            );
            self.receiver.sync_folder(&self.name);
            return Ok(false);
        }

        info!(folder = %self.name, "about to IDLE");
        self.receiver.set_push_active(&self.name, true);
        self.control.set_idling(true);

        self.set_read_timeout_for_idle()?;
        self.send_idle()?;

        self.control.set_idling(false);
        Ok(true)
    }

    /// The persisted cursor, or `-1` when there is none.
    fn old_uid_next(&self) -> i64 {
        let state = match self.receiver.push_state(&self.name) {
            Some(state) => PushState::parse(&state),
            None => PushState::default(),
        };
        debug!(folder = %self.name, uid_next = state.uid_next, "read persisted push state");
        state.uid_next
    }

    /// (Re)open the folder, install a fresh idle session, and make sure the
    /// server can actually push. Returns whether a new connection was made.
    fn open_folder_if_closed(&self) -> Result<bool> {
        let opened_new = !self.folder.is_open();
        self.folder.open_read_only()?;

        let session = Arc::new(IdleSession::new(self.folder.connection()?));
        self.control.install_session(Arc::clone(&session));
        self.check_idle_capability(&session)?;

        Ok(opened_new)
    }

    fn check_idle_capability(&self, session: &IdleSession) -> Result<()> {
        if session.has_idle_capability()? {
            return Ok(());
        }

        self.control.request_stop();
        let message = format!("IMAP server is not IDLE capable: {}", self.name);
        self.receiver.push_error(&message, None);
        Err(Error::IdleUnsupported(message))
    }

    /// The folder's current `UIDNEXT`, derived from the highest UID when
    /// the server does not report one; `-1` if neither is known.
    fn new_uid_next(&self) -> Result<i64> {
        if let Some(uid_next) = self.folder.uid_next()? {
            return Ok(i64::from(uid_next));
        }

        debug!(folder = %self.name, "folder reports no UIDNEXT, deriving it from the highest UID");
        match self.folder.highest_uid()? {
            Some(highest_uid) => Ok(i64::from(highest_uid) + 1),
            None => Ok(-1),
        }
    }

    fn set_read_timeout_for_idle(&self) -> Result<()> {
        let refresh = Duration::from_secs(u64::from(self.config.idle_refresh_minutes()) * 60);
        self.session()?
            .set_read_timeout(refresh + IDLE_READ_TIMEOUT_INCREMENT)
    }

    /// Issue the `IDLE` command and block until it completes.
    ///
    /// The session is detached afterwards no matter how the command ended;
    /// an I/O failure additionally closes the folder so the next iteration
    /// starts from a clean connection.
    fn send_idle(&self) -> Result<()> {
        let result = self
            .folder
            .execute_command("IDLE", &mut IdleHandler { worker: self });

        if let Some(session) = self.control.session() {
            session.stop_accepting_done();
        }
        if matches!(result, Err(Error::Io(_))) {
            self.folder.close();
        }
        result
    }

    fn session(&self) -> Result<Arc<IdleSession>> {
        self.control
            .session()
            .ok_or(Error::BadState("no idle session installed"))
    }

    /// Invoked by the command engine for every untagged response that
    /// arrives while the `IDLE` is outstanding.
    fn handle_untagged(&self, response: &UntaggedResponse) -> Result<()> {
        if self.control.stopping() {
            debug!(folder = %self.name, ?response, "got untagged response, but pusher is stopping");
            if let Some(session) = self.control.session() {
                session.stop_idle();
            }
        } else {
            match classify::classify(response) {
                Classification::Buffer => {
                    self.wake_lock.acquire(self.wake_lock_timeout);
                    debug!(folder = %self.name, ?response, "buffering untagged response");
                    self.buffer.append(response.clone());
                }
                Classification::IdleAccepted => {
                    debug!(folder = %self.name, "server is idling, releasing the wake-lock");
                    if let Some(session) = self.control.session() {
                        session.start_accepting_done()?;
                    }
                    self.wake_lock.release();
                }
                Classification::Ignore => {}
            }
        }

        let quiescent = !self
            .control
            .session()
            .map_or(false, |session| session.more_responses_available());
        if quiescent {
            // Deliberately also reached while stopping: pending flag-change
            // side effects are flushed before teardown.
            self.process_stored_responses();
        }
        Ok(())
    }

    /// Interpret everything buffered during the `IDLE`, in arrival order,
    /// stopping at the first response that requires a full sync.
    fn process_stored_responses(&self) {
        let responses = self.buffer.drain();
        if responses.is_empty() {
            return;
        }
        info!(
            folder = %self.name,
            count = responses.len(),
            "processing stored untagged responses"
        );

        for response in &responses {
            let ctx = SyncContext {
                smallest_seq_num: classify::smallest_seq_num(
                    self.folder.message_count(),
                    self.config.display_count(),
                ),
                qresync: self.folder.supports_qresync(),
            };
            match classify::decide_sync(response, &ctx) {
                SyncDecision::Sync => {
                    self.receiver.sync_folder(&self.name);
                    break;
                }
                SyncDecision::FlagsChanged { update, modseq } => {
                    debug!(
                        folder = %self.name,
                        uid = update.uid,
                        "applying flag change without a sync"
                    );
                    self.receiver.message_flags_changed(&self.name, update);
                    if let Some(modseq) = modseq {
                        self.receiver.highest_mod_seq_changed(&self.name, modseq);
                    }
                }
                SyncDecision::Ignore => {}
            }
        }
    }

    /// Failure-path cleanup: get the device awake again, forget anything
    /// buffered, and tear the folder down so the next iteration reopens it.
    fn clean_up_after_failure(&self) {
        self.wake_lock.acquire(self.wake_lock_timeout);
        self.buffer.clear();
        self.control.set_idling(false);
        self.receiver.set_push_active(&self.name, false);
        self.folder.close();
    }
}

/// Thin adapter between the command engine's callback and the worker. Owns
/// nothing; the worker outlives every command it issues.
struct IdleHandler<'a> {
    worker: &'a PushWorker,
}

impl UntaggedHandler for IdleHandler<'_> {
    fn on_untagged(&mut self, response: &UntaggedResponse) -> Result<()> {
        self.worker.handle_untagged(response)
    }
}

/// The UID a requested sync should start from: the persisted cursor,
/// clamped into the host's display window and floored at 1.
fn start_uid(old_uid_next: i64, new_uid_next: i64, display_count: u32) -> i64 {
    let mut start_uid = old_uid_next;
    if start_uid < new_uid_next - i64::from(display_count) {
        start_uid = new_uid_next - i64::from(display_count);
    }
    start_uid.max(1)
}
