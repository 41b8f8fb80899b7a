//! The log server: data file, listener and supervisor.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::supervisor::{ConnectionSupervisor, SupervisorReport};
use ringlog_core::RecordLog;
use ringlog_storage::FileBackend;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// A bound log server.
///
/// # Example
///
/// ```rust,no_run
/// use ringlog_server::{LogServer, ServerConfig};
///
/// # async fn example() -> ringlog_server::ServerResult<()> {
/// let config = ServerConfig::new("127.0.0.1:0".parse().unwrap()).with_capacity(4);
/// let server = LogServer::bind(config).await?;
/// println!("listening on {}", server.local_addr());
/// server.run_until(std::future::pending()).await?;
/// # Ok(())
/// # }
/// ```
pub struct LogServer {
    config: ServerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    log: Arc<RecordLog>,
}

impl LogServer {
    /// Opens the log and binds the listening socket.
    ///
    /// With a data path the journal is opened under an exclusive lock and
    /// replayed before the first connection is accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the data file is
    /// locked or unreadable, or the address cannot be bound.
    pub async fn bind(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;

        let log = match &config.data_path {
            Some(path) => {
                let backend = FileBackend::open_locked(path)?;
                info!(path = %path.display(), "opened data file");
                RecordLog::with_journal(config.log.clone(), Box::new(backend))?
            }
            None => RecordLog::in_memory(config.log.clone())?,
        };

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, capacity = config.log.capacity, "listening");

        Ok(Self {
            config,
            listener,
            local_addr,
            log: Arc::new(log),
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the shared log.
    pub fn log(&self) -> &Arc<RecordLog> {
        &self.log
    }

    /// Serves connections until `shutdown` resolves.
    ///
    /// Live sessions are drained before the log is released. If configured,
    /// the data file is then deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails persistently or the data file
    /// cannot be removed.
    pub async fn run_until<F>(self, shutdown: F) -> ServerResult<SupervisorReport>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            listener,
            log,
            ..
        } = self;

        let supervisor = ConnectionSupervisor::new(Arc::clone(&log))
            .with_recv_chunk_size(config.recv_chunk_size)
            .with_max_sessions(config.max_sessions)
            .with_max_consecutive_accept_failures(config.max_consecutive_accept_failures);

        let result = supervisor.run(listener, shutdown).await;

        if let Err(err) = log.sync() {
            warn!(error = %err, "final journal sync failed");
        }
        drop(log);

        if config.remove_data_on_shutdown {
            if let Some(path) = &config.data_path {
                match tokio::fs::remove_file(path).await {
                    Ok(()) => info!(path = %path.display(), "removed data file"),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }

        let report = result?;
        info!(
            accepted = report.accepted,
            records = report.records_committed,
            "server stopped"
        );
        Ok(report)
    }
}
