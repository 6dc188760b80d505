use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{Listen, ServerConfig};
use crate::error::ServerResult;
use crate::router::build_router;
use crate::state::AppState;

/// The nptr file-drop server.
pub struct NptrServer {
    state: Arc<AppState>,
}

impl NptrServer {
    /// Validate `config` and open the object store.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        Ok(Self {
            state: Arc::new(AppState::new(config)?),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        match &self.state.config.listen {
            Listen::Tcp(addr) => {
                let listener = TcpListener::bind(addr).await?;
                info!(addr = %listener.local_addr()?, "nptr listening");
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown_signal())
                    .await?;
            }
            #[cfg(unix)]
            Listen::Unix(path) => {
                remove_stale_socket(path)?;
                let listener = tokio::net::UnixListener::bind(path)?;
                info!(socket = %path.display(), "nptr listening");
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown_signal())
                    .await?;
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(socket = %path.display(), error = %e, "could not remove socket");
                }
            }
            #[cfg(not(unix))]
            Listen::Unix(_) => {
                return Err(crate::error::ServerError::Config(
                    "unix sockets are not supported on this platform".into(),
                ));
            }
        }
        info!("nptr stopped");
        Ok(())
    }
}

/// Remove a socket file left by a previous run. Refuses to touch anything
/// that is not a socket.
#[cfg(unix)]
fn remove_stale_socket(path: &std::path::Path) -> ServerResult<()> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            info!(socket = %path.display(), "removing stale socket");
            std::fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Err(crate::error::ServerError::Config(format!(
            "refusing to replace non-socket file {}",
            path.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
