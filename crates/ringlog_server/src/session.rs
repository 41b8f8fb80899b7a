//! Per-connection session state machine.
//!
//! A session moves through `ACCEPTED -> ASSEMBLING -> (COMMAND | COMMIT) ->
//! RESPONDING -> ASSEMBLING ...` until the client disconnects, an error
//! occurs, or the supervisor asks it to stop. The shared log lock is only
//! taken inside [`RecordLog`] calls, never across a socket read or write.

use crate::error::ServerResult;
use ringlog_core::{
    AssemblerOutcome, ErrorCategory, Inbound, ReadRequest, Record, RecordLog, WriteAssembler,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The client closed its side of the connection.
    EndOfStream,
    /// The supervisor asked the session to stop.
    Shutdown,
    /// An error ended the session.
    Failed {
        /// Error category.
        category: ErrorCategory,
        /// Rendered error.
        message: String,
    },
}

/// What a finished session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Session identifier assigned by the supervisor.
    pub id: u64,
    /// Remote address.
    pub peer: SocketAddr,
    /// Records appended to the log.
    pub records_committed: u64,
    /// Seek commands answered.
    pub commands_served: u64,
    /// Bytes read from the client.
    pub bytes_received: u64,
    /// Bytes written to the client.
    pub bytes_sent: u64,
    /// Unterminated bytes dropped when the session ended.
    pub discarded_bytes: usize,
    /// Why the session ended.
    pub termination: Termination,
}

/// Identity and shared flags of one session.
///
/// The termination flag is written by the supervisor and observed by the
/// session before every receive, and while a receive is pending. The
/// completion flag is set by the session when it stops, whichever way it
/// stops.
#[derive(Debug)]
pub struct SessionState {
    id: u64,
    peer: SocketAddr,
    terminate: watch::Receiver<bool>,
    completed: Arc<AtomicBool>,
}

impl SessionState {
    /// Creates session state wired to the supervisor's flags.
    pub fn new(
        id: u64,
        peer: SocketAddr,
        terminate: watch::Receiver<bool>,
        completed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            peer,
            terminate,
            completed,
        }
    }

    /// Returns the session identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns true once the supervisor has asked the session to stop.
    pub fn termination_requested(&self) -> bool {
        *self.terminate.borrow()
    }

    /// Returns true once the session has stopped.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

// Sets the completion flag on every exit path, unwinding included.
struct CompletionGuard(Arc<AtomicBool>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Drives one client connection.
pub struct SessionCoordinator<S> {
    stream: S,
    state: SessionState,
    log: Arc<RecordLog>,
    assembler: WriteAssembler,
    chunk: Vec<u8>,
    records_committed: u64,
    commands_served: u64,
    bytes_received: u64,
    bytes_sent: u64,
}

impl<S> SessionCoordinator<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a session over `stream`, receiving up to `recv_chunk_size`
    /// bytes at a time.
    pub fn new(stream: S, state: SessionState, log: Arc<RecordLog>, recv_chunk_size: usize) -> Self {
        let assembler = WriteAssembler::new(log.config());
        Self {
            stream,
            state,
            log,
            assembler,
            chunk: vec![0; recv_chunk_size.max(1)],
            records_committed: 0,
            commands_served: 0,
            bytes_received: 0,
            bytes_sent: 0,
        }
    }

    /// Runs the session to completion.
    ///
    /// Never fails: errors end the session and are carried in the report.
    #[instrument(name = "session", skip(self), fields(id = self.state.id, peer = %self.state.peer))]
    pub async fn run(mut self) -> SessionReport {
        let _completion = CompletionGuard(Arc::clone(&self.state.completed));

        let termination = match self.serve().await {
            Ok(termination) => termination,
            Err(err) => {
                warn!(error = %err, category = ?err.category(), "session failed");
                Termination::Failed {
                    category: err.category(),
                    message: err.to_string(),
                }
            }
        };

        let discarded_bytes = self.assembler.pending_len();
        self.assembler.reset();
        if let Err(err) = self.stream.shutdown().await {
            debug!(error = %err, "shutdown after session end failed");
        }

        debug!(
            ?termination,
            records = self.records_committed,
            commands = self.commands_served,
            discarded_bytes,
            "session closed"
        );

        SessionReport {
            id: self.state.id,
            peer: self.state.peer,
            records_committed: self.records_committed,
            commands_served: self.commands_served,
            bytes_received: self.bytes_received,
            bytes_sent: self.bytes_sent,
            discarded_bytes,
            termination,
        }
    }

    async fn serve(&mut self) -> ServerResult<Termination> {
        loop {
            // Records completed by an earlier chunk run their cycle before the
            // next receive.
            if let AssemblerOutcome::RecordReady(record) = self.assembler.poll() {
                self.cycle(record).await?;
                continue;
            }

            if *self.state.terminate.borrow_and_update() {
                return Ok(Termination::Shutdown);
            }

            let received = tokio::select! {
                biased;
                changed = self.state.terminate.changed() => {
                    if changed.is_err() {
                        return Ok(Termination::Shutdown);
                    }
                    None
                }
                read = self.stream.read(&mut self.chunk) => Some(read?),
            };

            let Some(n) = received else { continue };
            if n == 0 {
                return Ok(Termination::EndOfStream);
            }
            self.bytes_received += n as u64;

            if let AssemblerOutcome::RecordReady(record) = self.assembler.feed(&self.chunk[..n])? {
                self.cycle(record).await?;
            }
        }
    }

    async fn cycle(&mut self, record: Record) -> ServerResult<()> {
        let request = match Inbound::classify(record)? {
            Inbound::Append(record) => {
                self.commit(record).await?;
                ReadRequest::WholeLog
            }
            Inbound::Seek(seek) => {
                debug!(%seek, "seek command");
                self.commands_served += 1;
                ReadRequest::FromCommand(seek)
            }
        };

        let response = self.log.read(request)?;
        self.stream.write_all(&response).await?;
        self.stream.flush().await?;
        self.bytes_sent += response.len() as u64;
        Ok(())
    }

    async fn commit(&mut self, record: Record) -> ServerResult<()> {
        let len = record.len();
        let handle = if self.log.is_durable() {
            let log = Arc::clone(&self.log);
            tokio::task::spawn_blocking(move || log.append(record)).await??
        } else {
            self.log.append(record)?
        };

        self.records_committed += 1;
        debug!(%handle, len, "record committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringlog_core::{LogConfig, SeekTo};
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    struct Harness {
        client: DuplexStream,
        terminate: watch::Sender<bool>,
        completed: Arc<AtomicBool>,
        task: JoinHandle<SessionReport>,
    }

    fn start(log: &Arc<RecordLog>, chunk: usize) -> Harness {
        start_with_pipe(log, chunk, 4096)
    }

    fn start_with_pipe(log: &Arc<RecordLog>, chunk: usize, pipe: usize) -> Harness {
        let (client, server) = duplex(pipe);
        let (terminate, rx) = watch::channel(false);
        let completed = Arc::new(AtomicBool::new(false));
        let state = SessionState::new(1, "127.0.0.1:0".parse().unwrap(), rx, Arc::clone(&completed));
        let session = SessionCoordinator::new(server, state, Arc::clone(log), chunk);

        Harness {
            client,
            terminate,
            completed,
            task: tokio::spawn(session.run()),
        }
    }

    fn log(capacity: usize) -> Arc<RecordLog> {
        Arc::new(RecordLog::in_memory(LogConfig::new().capacity(capacity)).unwrap())
    }

    async fn expect(client: &mut DuplexStream, expected: &[u8]) {
        let mut buf = vec![0u8; expected.len()];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, expected);
    }

    #[tokio::test]
    async fn record_is_answered_with_whole_log() {
        let log = log(10);
        let mut h = start(&log, 1024);

        h.client.write_all(b"hello\n").await.unwrap();
        expect(&mut h.client, b"hello\n").await;
        h.client.write_all(b"world\n").await.unwrap();
        expect(&mut h.client, b"hello\nworld\n").await;

        drop(h.client);
        let report = h.task.await.unwrap();
        assert_eq!(report.termination, Termination::EndOfStream);
        assert_eq!(report.records_committed, 2);
        assert_eq!(report.bytes_received, 12);
        assert_eq!(report.bytes_sent, 18);
        assert!(h.completed.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn fragments_assemble_across_receives() {
        let log = log(10);
        let mut h = start(&log, 2);

        h.client.write_all(b"fra").await.unwrap();
        tokio::task::yield_now().await;
        h.client.write_all(b"gmented\n").await.unwrap();
        expect(&mut h.client, b"fragmented\n").await;
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn each_terminator_runs_its_own_cycle() {
        let log = log(10);
        let mut h = start(&log, 1024);

        h.client.write_all(b"one\ntwo\n").await.unwrap();
        expect(&mut h.client, b"one\none\ntwo\n").await;
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn receive_larger_than_record_limit_is_accepted() {
        let log = Arc::new(
            RecordLog::in_memory(LogConfig::new().capacity(10).max_record_len(8)).unwrap(),
        );
        let mut h = start(&log, 1024);

        h.client.write_all(b"abc\ndef\nghi\n").await.unwrap();
        expect(&mut h.client, b"abc\nabc\ndef\nabc\ndef\nghi\n").await;
        assert_eq!(log.len(), 3);
    }

    #[tokio::test]
    async fn seek_command_reads_tail_without_storing() {
        let log = log(2);
        for r in ["a\n", "bb\n", "ccc\n"] {
            log.append(Record::from(r)).unwrap();
        }
        let mut h = start(&log, 1024);

        h.client.write_all(&SeekTo::new(0, 1).to_line()).await.unwrap();
        expect(&mut h.client, b"b\nccc\n").await;
        assert_eq!(log.len(), 2);
        assert_eq!(log.read_all().unwrap(), b"bb\nccc\n");

        drop(h.client);
        let report = h.task.await.unwrap();
        assert_eq!(report.commands_served, 1);
        assert_eq!(report.records_committed, 0);
    }

    #[tokio::test]
    async fn invalid_address_closes_session() {
        let log = log(2);
        log.append(Record::from("a\n")).unwrap();
        log.append(Record::from("b\n")).unwrap();
        let mut h = start(&log, 1024);

        h.client.write_all(&SeekTo::new(5, 0).to_line()).await.unwrap();
        let mut rest = Vec::new();
        h.client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let report = h.task.await.unwrap();
        assert!(matches!(
            report.termination,
            Termination::Failed {
                category: ErrorCategory::Addressing,
                ..
            }
        ));
        assert!(h.completed.load(Ordering::Acquire));
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn malformed_command_is_protocol_failure() {
        let log = log(2);
        let mut h = start(&log, 1024);

        h.client.write_all(b"AESDCHAR_IOCSEEKTO:x,y\n").await.unwrap();
        let report = h.task.await.unwrap();
        assert!(matches!(
            report.termination,
            Termination::Failed {
                category: ErrorCategory::Protocol,
                ..
            }
        ));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn shutdown_interrupts_blocked_receive() {
        let log = log(10);
        let mut h = start(&log, 1024);

        h.client.write_all(b"complete\npartial").await.unwrap();
        expect(&mut h.client, b"complete\n").await;

        h.terminate.send(true).unwrap();
        let report = h.task.await.unwrap();

        assert_eq!(report.termination, Termination::Shutdown);
        assert_eq!(report.discarded_bytes, 7);
        assert_eq!(log.read_all().unwrap(), b"complete\n");
        assert!(h.completed.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn shutdown_lets_blocked_response_finish() {
        let log = log(10);
        let big = format!("{}\n", "x".repeat(199));
        log.append(Record::from(big.clone().into_bytes())).unwrap();
        let mut h = start_with_pipe(&log, 1024, 16);

        h.client.write_all(b"go\n").await.unwrap();
        // The record commits, then the response overflows the 16-byte pipe
        // and the session waits inside the write.
        while log.len() < 2 {
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;
        h.terminate.send(true).unwrap();
        assert!(!h.completed.load(Ordering::Acquire));

        let mut response = Vec::new();
        h.client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, format!("{big}go\n").into_bytes());

        let report = h.task.await.unwrap();
        assert_eq!(report.termination, Termination::Shutdown);
        assert_eq!(report.records_committed, 1);
        assert_eq!(report.bytes_sent, response.len() as u64);
        assert!(h.completed.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn dropped_supervisor_stops_session() {
        let log = log(10);
        let h = start(&log, 1024);

        drop(h.terminate);
        let report = h.task.await.unwrap();
        assert_eq!(report.termination, Termination::Shutdown);
    }
}
