//! Serve command implementation.

use ringlog_server::{LogServer, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info};

/// Options for the serve command.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Data file; the default path is used when absent.
    pub data_file: Option<PathBuf>,
    /// Run without a data file.
    pub in_memory: bool,
    /// Keep the data file after shutdown.
    pub keep_data: bool,
    /// Ring capacity.
    pub capacity: usize,
    /// Receive chunk size.
    pub chunk_size: usize,
    /// Session limit.
    pub max_sessions: usize,
}

impl ServeOptions {
    /// Builds the server configuration these options describe.
    pub fn to_config(&self) -> ServerConfig {
        let config = ServerConfig::default()
            .with_bind_addr(self.bind)
            .with_remove_data_on_shutdown(!self.keep_data)
            .with_capacity(self.capacity)
            .with_recv_chunk_size(self.chunk_size)
            .with_max_sessions(self.max_sessions);

        match (&self.data_file, self.in_memory) {
            (_, true) => config.without_data_file(),
            (Some(path), false) => config.with_data_path(path),
            (None, false) => config,
        }
    }
}

/// Runs the server until SIGINT or SIGTERM.
pub fn run(options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = options.to_config();
    let runtime = tokio::runtime::Runtime::new()?;

    let report = runtime.block_on(async {
        let server = LogServer::bind(config).await?;
        server.run_until(shutdown_signal()).await
    })?;

    info!(
        accepted = report.accepted,
        rejected = report.rejected,
        records = report.records_committed,
        "exiting"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringlog_server::DEFAULT_DATA_PATH;

    fn options() -> ServeOptions {
        ServeOptions {
            bind: "127.0.0.1:9000".parse().unwrap(),
            data_file: None,
            in_memory: false,
            keep_data: false,
            capacity: 10,
            chunk_size: 1024,
            max_sessions: 1000,
        }
    }

    #[test]
    fn defaults_use_standard_data_file() {
        let config = options().to_config();
        assert_eq!(config.data_path, Some(PathBuf::from(DEFAULT_DATA_PATH)));
        assert!(config.remove_data_on_shutdown);
    }

    #[test]
    fn flags_map_onto_config() {
        let options = ServeOptions {
            data_file: Some(PathBuf::from("/tmp/ring.data")),
            keep_data: true,
            capacity: 3,
            chunk_size: 16,
            max_sessions: 2,
            ..options()
        };
        let config = options.to_config();

        assert_eq!(config.data_path, Some(PathBuf::from("/tmp/ring.data")));
        assert!(!config.remove_data_on_shutdown);
        assert_eq!(config.log.capacity, 3);
        assert_eq!(config.recv_chunk_size, 16);
        assert_eq!(config.max_sessions, 2);
    }

    #[test]
    fn in_memory_drops_data_file() {
        let options = ServeOptions {
            in_memory: true,
            ..options()
        };
        assert!(options.to_config().data_path.is_none());
    }
}
