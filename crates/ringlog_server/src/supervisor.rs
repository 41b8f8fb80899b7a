//! Accept loop, session registry and graceful drain.

use crate::error::{ServerError, ServerResult};
use crate::session::{SessionCoordinator, SessionReport, SessionState, Termination};
use ringlog_core::RecordLog;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pause after the first listener failure; doubles with each one after.
const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(1);
/// Longest pause between accept attempts.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Totals for a supervisor run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Connections accepted and handed to a session.
    pub accepted: u64,
    /// Connections closed immediately because the session limit was reached.
    pub rejected: u64,
    /// Sessions reaped while the accept loop was running.
    pub reaped: u64,
    /// Sessions still live at shutdown and drained.
    pub drained: u64,
    /// Records committed across all sessions.
    pub records_committed: u64,
}

impl SupervisorReport {
    fn absorb(&mut self, report: &SessionReport) {
        self.records_committed += report.records_committed;
    }
}

struct SessionHandle {
    peer: SocketAddr,
    terminate: watch::Sender<bool>,
    completed: Arc<AtomicBool>,
    task: JoinHandle<SessionReport>,
}

impl SessionHandle {
    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire) || self.task.is_finished()
    }
}

/// Owns the accept loop and every live session.
pub struct ConnectionSupervisor {
    log: Arc<RecordLog>,
    recv_chunk_size: usize,
    max_sessions: usize,
    max_consecutive_accept_failures: u32,
    sessions: HashMap<u64, SessionHandle>,
    next_id: u64,
    report: SupervisorReport,
}

impl ConnectionSupervisor {
    /// Creates a supervisor sharing `log` with every session.
    pub fn new(log: Arc<RecordLog>) -> Self {
        Self {
            log,
            recv_chunk_size: 1024,
            max_sessions: 1000,
            max_consecutive_accept_failures: 64,
            sessions: HashMap::new(),
            next_id: 1,
            report: SupervisorReport::default(),
        }
    }

    /// Sets the receive chunk size handed to sessions.
    pub fn with_recv_chunk_size(mut self, bytes: usize) -> Self {
        self.recv_chunk_size = bytes;
        self
    }

    /// Sets the maximum concurrent sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Sets how many listener failures in a row end the accept loop.
    ///
    /// Errors that concern only the connection being accepted, such as a
    /// peer resetting before the handshake finished, do not count.
    pub fn with_max_consecutive_accept_failures(mut self, max: u32) -> Self {
        self.max_consecutive_accept_failures = max;
        self
    }

    /// Returns the number of registered sessions, finished ones not yet
    /// reaped included.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Accepts connections until `shutdown` resolves, then drains.
    ///
    /// Every live session is asked to stop and awaited before this returns,
    /// so a record being committed when shutdown arrives still commits and
    /// gets its response.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Listener`] if the listener fails the
    /// configured number of times in a row. Each failure pauses the loop,
    /// starting at 1ms and doubling up to 1s, so exhausted descriptors do not
    /// turn into a busy loop. Sessions are drained first.
    pub async fn run<F>(mut self, listener: TcpListener, shutdown: F) -> ServerResult<SupervisorReport>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut failures = 0u32;

        let outcome = loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!(live = self.sessions.len(), "shutdown requested, draining sessions");
                    break Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        failures = 0;
                        self.reap().await;
                        self.admit(stream, peer);
                    }
                    Err(err) if is_connection_error(&err) => {
                        debug!(error = %err, "connection dropped during accept");
                    }
                    Err(err) => {
                        failures += 1;
                        let delay = accept_backoff(failures);
                        error!(error = %err, failures, ?delay, "failed to accept connection");
                        if failures >= self.max_consecutive_accept_failures {
                            break Err(ServerError::Listener { failures, source: err });
                        }
                        self.reap().await;

                        tokio::select! {
                            biased;
                            () = &mut shutdown => {
                                info!(live = self.sessions.len(), "shutdown requested during accept backoff");
                                break Ok(());
                            }
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        };

        self.drain().await;
        outcome.map(|()| self.report)
    }

    fn admit(&mut self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        if self.sessions.len() >= self.max_sessions {
            warn!(%peer, limit = self.max_sessions, "session limit reached, closing connection");
            self.report.rejected += 1;
            return;
        }

        let id = self.next_id;
        self.next_id += 1;

        let (terminate, terminate_rx) = watch::channel(false);
        let completed = Arc::new(AtomicBool::new(false));
        let state = SessionState::new(id, peer, terminate_rx, Arc::clone(&completed));
        let session =
            SessionCoordinator::new(stream, state, Arc::clone(&self.log), self.recv_chunk_size);

        info!(id, %peer, "accepted connection");
        self.report.accepted += 1;
        self.sessions.insert(
            id,
            SessionHandle {
                peer,
                terminate,
                completed,
                task: tokio::spawn(session.run()),
            },
        );
    }

    /// Awaits and removes every session whose completion flag is set.
    async fn reap(&mut self) {
        let finished: Vec<u64> = self
            .sessions
            .iter()
            .filter(|(_, handle)| handle.is_completed())
            .map(|(id, _)| *id)
            .collect();

        for id in finished {
            if let Some(handle) = self.sessions.remove(&id) {
                if let Some(report) = Self::join(id, handle).await {
                    self.report.absorb(&report);
                }
                self.report.reaped += 1;
            }
        }
    }

    async fn drain(&mut self) {
        for handle in self.sessions.values() {
            // A session that already finished has dropped its receiver.
            let _ = handle.terminate.send(true);
        }

        let mut ids: Vec<u64> = self.sessions.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(handle) = self.sessions.remove(&id) {
                if let Some(report) = Self::join(id, handle).await {
                    self.report.absorb(&report);
                }
                self.report.drained += 1;
            }
        }
        debug!(drained = self.report.drained, "all sessions terminated");
    }

    async fn join(id: u64, handle: SessionHandle) -> Option<SessionReport> {
        match handle.task.await {
            Ok(report) => {
                match &report.termination {
                    Termination::Failed { message, .. } => {
                        warn!(id, peer = %report.peer, error = %message, "session ended with error");
                    }
                    termination => {
                        info!(id, peer = %report.peer, ?termination, "closed connection");
                    }
                }
                debug!(
                    id,
                    records = report.records_committed,
                    commands = report.commands_served,
                    bytes_in = report.bytes_received,
                    bytes_out = report.bytes_sent,
                    "session report"
                );
                Some(report)
            }
            Err(err) => {
                error!(id, peer = %handle.peer, error = %err, "session task failed");
                None
            }
        }
    }
}

/// Delay before the next accept after `failures` listener failures in a row.
fn accept_backoff(failures: u32) -> Duration {
    let shift = failures.saturating_sub(1).min(16);
    ACCEPT_BACKOFF_START
        .saturating_mul(1 << shift)
        .min(ACCEPT_BACKOFF_MAX)
}

/// Accept errors caused by the peer rather than the listener.
fn is_connection_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}
