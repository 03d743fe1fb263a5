//! Listener thread lifecycle.
//!
//! The socket is bound on the caller's thread so bind errors surface
//! immediately and port 0 resolves to a real port. Serving happens on a
//! dedicated thread with its own tokio runtime, so request handling never
//! runs on the simulation's poll thread.

use fleet_control::{ComponentError, ListenerHandle};
use fleet_events::CommandSender;
use std::net::SocketAddr;
use std::thread::JoinHandle;
use tokio::sync::oneshot;

use crate::app::{create_app, ListenerState};
use crate::error::ListenerError;

/// A running command listener.
#[derive(Debug)]
pub struct CommandListener {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

/// Binds `addr` and serves the command endpoint until shut down.
pub fn spawn(addr: SocketAddr, sender: CommandSender) -> Result<CommandListener, ListenerError> {
    let std_listener = std::net::TcpListener::bind(addr)?;
    std_listener.set_nonblocking(true)?;
    let local_addr = std_listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = create_app(ListenerState::new(sender));

    let thread = std::thread::Builder::new()
        .name("command-listener".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::error!("Command listener runtime failed: {}", e);
                    return;
                }
            };

            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::from_std(std_listener) {
                    Ok(listener) => listener,
                    Err(e) => {
                        tracing::error!("Command listener socket failed: {}", e);
                        return;
                    }
                };
                let shutdown = async {
                    let _ = shutdown_rx.await;
                };
                if let Err(e) = axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await
                {
                    tracing::error!("Command listener stopped with error: {}", e);
                }
            });
            tracing::debug!("Command listener thread exiting");
        })?;

    tracing::info!("Command listener bound to {}", local_addr);
    Ok(CommandListener {
        local_addr,
        shutdown: Some(shutdown_tx),
        thread: Some(thread),
    })
}

impl CommandListener {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops serving and joins the listener thread. Calling it again does nothing.
    pub fn shutdown(&mut self) -> Result<(), ListenerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|_| ListenerError::Panicked)?;
            tracing::info!("Command listener on {} terminated", self.local_addr);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for CommandListener {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("{}", e);
        }
    }
}

impl ListenerHandle for CommandListener {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn terminate(&mut self) -> Result<(), ComponentError> {
        self.shutdown()
            .map_err(|e| ComponentError::stop("command listener", e))
    }
}
