//! In-process messaging backend.
//!
//! Agents register a mailbox under their `name@host` address and exchange
//! [`Envelope`]s through a router thread. Registration doubles as presence: an
//! address can only be held by one live agent at a time.

use crossbeam_channel::{unbounded, Receiver, Sender};
use fleet_control::setup::MessagingArtifact;
use fleet_control::{BackendPaths, ComponentError, MessagingBackend};
use fleet_events::Position;
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use crate::route::Route;

/// A message between two agents.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub from: String,
    pub to: String,
    pub body: Payload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    RouteRequest {
        id: u64,
        origin: Position,
        destination: Position,
    },
    RouteResponse {
        id: u64,
        route: Option<Route>,
    },
}

enum RouterMsg {
    Deliver(Envelope),
    Shutdown,
}

type Mailboxes = Arc<Mutex<HashMap<String, Sender<Envelope>>>>;

/// Cheap handle agents use to reach the backend.
#[derive(Debug, Clone)]
pub struct MessagingHandle {
    host: String,
    debug: bool,
    inbound: Sender<RouterMsg>,
    mailboxes: Mailboxes,
    running: Arc<AtomicBool>,
}

impl MessagingHandle {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn address_of(&self, name: &str) -> String {
        format!("{}@{}", name, self.host)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Registers a mailbox for `address`.
    pub fn register(&self, address: &str) -> Result<Receiver<Envelope>, ComponentError> {
        if !self.is_running() {
            return Err(ComponentError::unreachable("messaging backend"));
        }
        let mut mailboxes = self.mailboxes();
        if mailboxes.contains_key(address) {
            return Err(ComponentError::start(
                address,
                "address already registered",
            ));
        }
        let (tx, rx) = unbounded();
        mailboxes.insert(address.to_string(), tx);
        if self.debug {
            tracing::debug!("Registered {}", address);
        }
        Ok(rx)
    }

    /// Removes the mailbox for `address`. Unknown addresses are ignored.
    pub fn unregister(&self, address: &str) {
        if self.mailboxes().remove(address).is_some() && self.debug {
            tracing::debug!("Unregistered {}", address);
        }
    }

    pub fn is_registered(&self, address: &str) -> bool {
        self.mailboxes().contains_key(address)
    }

    pub fn send(&self, envelope: Envelope) -> Result<(), ComponentError> {
        if !self.is_running() {
            return Err(ComponentError::unreachable("messaging backend"));
        }
        self.inbound
            .send(RouterMsg::Deliver(envelope))
            .map_err(|_| ComponentError::unreachable("messaging backend"))
    }

    fn mailboxes(&self) -> MutexGuard<'_, HashMap<String, Sender<Envelope>>> {
        self.mailboxes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The running backend. Owns the router thread.
pub struct LocalMessagingBackend {
    handle: MessagingHandle,
    router: Option<JoinHandle<()>>,
}

impl LocalMessagingBackend {
    /// Reads the generated artifacts and starts routing.
    pub fn start(paths: &BackendPaths, debug: bool) -> Result<Self, ComponentError> {
        let artifact = MessagingArtifact::load(&paths.messaging_config)
            .map_err(|e| ComponentError::start("messaging backend", e))?;
        let sessions = fs::read_to_string(&paths.session_db)
            .map_err(|e| ComponentError::start("messaging backend", e))?;
        let sessions: serde_json::Value = serde_json::from_str(&sessions)
            .map_err(|e| ComponentError::start("messaging backend", e))?;
        if sessions.get(&artifact.host).is_none() {
            return Err(ComponentError::start(
                "messaging backend",
                format!("session database has no entry for {}", artifact.host),
            ));
        }

        let (inbound, rx) = unbounded();
        let mailboxes: Mailboxes = Arc::default();
        let debug = debug || artifact.debug;
        let router_mailboxes = Arc::clone(&mailboxes);
        let router = std::thread::Builder::new()
            .name("messaging-router".into())
            .spawn(move || route_messages(rx, router_mailboxes, debug))
            .map_err(|e| ComponentError::start("messaging backend", e))?;

        tracing::info!("Messaging backend serving {}", artifact.host);
        Ok(Self {
            handle: MessagingHandle {
                host: artifact.host,
                debug,
                inbound,
                mailboxes,
                running: Arc::new(AtomicBool::new(true)),
            },
            router: Some(router),
        })
    }

    pub fn handle(&self) -> MessagingHandle {
        self.handle.clone()
    }
}

fn route_messages(rx: Receiver<RouterMsg>, mailboxes: Mailboxes, debug: bool) {
    while let Ok(msg) = rx.recv() {
        match msg {
            RouterMsg::Deliver(envelope) => {
                let target = mailboxes
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .get(&envelope.to)
                    .cloned();
                match target {
                    Some(mailbox) => {
                        if debug {
                            tracing::trace!("{} -> {}", envelope.from, envelope.to);
                        }
                        let _ = mailbox.send(envelope);
                    }
                    None => tracing::debug!("Dropping message to unknown {}", envelope.to),
                }
            }
            RouterMsg::Shutdown => break,
        }
    }
}

impl MessagingBackend for LocalMessagingBackend {
    fn shutdown(&mut self) -> Result<(), ComponentError> {
        self.handle.running.store(false, Ordering::SeqCst);
        let Some(router) = self.router.take() else {
            return Ok(());
        };
        let _ = self.handle.inbound.send(RouterMsg::Shutdown);
        router
            .join()
            .map_err(|_| ComponentError::stop("messaging backend", "router thread panicked"))?;
        self.handle.mailboxes().clear();
        tracing::info!("Messaging backend stopped");
        Ok(())
    }
}

impl Drop for LocalMessagingBackend {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::start_backend;
    use std::time::Duration;
    use tempfile::tempdir;

    fn request(from: &str, to: &str) -> Envelope {
        Envelope {
            from: from.into(),
            to: to.into(),
            body: Payload::RouteRequest {
                id: 1,
                origin: Position::default(),
                destination: Position::new(1.0, 1.0),
            },
        }
    }

    #[test]
    fn test_start_requires_artifacts() {
        let dir = tempdir().unwrap();
        let result = LocalMessagingBackend::start(&BackendPaths::in_dir(dir.path()), false);
        assert!(result.is_err());
    }

    #[test]
    fn test_delivers_between_mailboxes() {
        let dir = tempdir().unwrap();
        let mut backend = start_backend(dir.path());
        let handle = backend.handle();

        let inbox = handle.register("b@127.0.0.1").unwrap();
        handle.send(request("a@127.0.0.1", "b@127.0.0.1")).unwrap();

        let received = inbox.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(received.from, "a@127.0.0.1");

        backend.shutdown().unwrap();
    }

    #[test]
    fn test_address_is_exclusive_until_unregistered() {
        let dir = tempdir().unwrap();
        let backend = start_backend(dir.path());
        let handle = backend.handle();

        let _inbox = handle.register("taxi_0@127.0.0.1").unwrap();
        assert!(handle.register("taxi_0@127.0.0.1").is_err());

        handle.unregister("taxi_0@127.0.0.1");
        assert!(!handle.is_registered("taxi_0@127.0.0.1"));
        assert!(handle.register("taxi_0@127.0.0.1").is_ok());
    }

    #[test]
    fn test_shutdown_is_idempotent_and_rejects_traffic() {
        let dir = tempdir().unwrap();
        let mut backend = start_backend(dir.path());
        let handle = backend.handle();

        backend.shutdown().unwrap();
        backend.shutdown().unwrap();

        assert!(!handle.is_running());
        assert!(handle.register("late@127.0.0.1").is_err());
        assert!(handle.send(request("a", "b")).is_err());
    }
}
