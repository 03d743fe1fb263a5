//! Route agent.
//!
//! Answers [`Payload::RouteRequest`] envelopes with a straight-line route.

use crossbeam_channel::{Receiver, RecvTimeoutError};
use fleet_control::{AgentCredentials, ComponentError, RouteAgent};
use fleet_events::Position;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::messaging::{Envelope, MessagingHandle, Payload};

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Waypoints from origin to destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub path: Vec<Position>,
    pub distance: f64,
}

impl Route {
    pub fn straight(origin: Position, destination: Position) -> Self {
        Self {
            path: vec![origin, destination],
            distance: origin.distance_to(&destination),
        }
    }
}

pub struct LocalRouteAgent {
    credentials: AgentCredentials,
    messaging: MessagingHandle,
    debug: bool,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl LocalRouteAgent {
    pub fn new(credentials: AgentCredentials, messaging: MessagingHandle, debug: bool) -> Self {
        Self {
            credentials,
            messaging,
            debug,
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.credentials.address
    }
}

fn serve(
    address: String,
    mailbox: Receiver<Envelope>,
    messaging: MessagingHandle,
    stop: Arc<AtomicBool>,
    debug: bool,
) {
    while !stop.load(Ordering::SeqCst) {
        match mailbox.recv_timeout(IDLE_POLL) {
            Ok(Envelope {
                from,
                body:
                    Payload::RouteRequest {
                        id,
                        origin,
                        destination,
                    },
                ..
            }) => {
                let route = Route::straight(origin, destination);
                if debug {
                    tracing::debug!(
                        "Route {} for {}: {} -> {} ({:.1})",
                        id,
                        from,
                        origin,
                        destination,
                        route.distance
                    );
                }
                let reply = Envelope {
                    from: address.clone(),
                    to: from,
                    body: Payload::RouteResponse {
                        id,
                        route: Some(route),
                    },
                };
                if let Err(e) = messaging.send(reply) {
                    tracing::warn!("Route reply not sent: {}", e);
                }
            }
            Ok(_) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

impl RouteAgent for LocalRouteAgent {
    fn start(&mut self) -> Result<(), ComponentError> {
        if self.worker.is_some() {
            return Ok(());
        }
        let mailbox = self.messaging.register(&self.credentials.address)?;
        self.stop.store(false, Ordering::SeqCst);

        let address = self.credentials.address.clone();
        let messaging = self.messaging.clone();
        let stop = Arc::clone(&self.stop);
        let debug = self.debug;
        let worker = std::thread::Builder::new()
            .name("route-agent".into())
            .spawn(move || serve(address, mailbox, messaging, stop, debug));
        match worker {
            Ok(worker) => {
                self.worker = Some(worker);
                tracing::debug!("Route agent {} started", self.credentials.address);
                Ok(())
            }
            Err(e) => {
                self.messaging.unregister(&self.credentials.address);
                Err(ComponentError::start("route agent", e))
            }
        }
    }

    fn stop(&mut self) -> Result<(), ComponentError> {
        self.stop.store(true, Ordering::SeqCst);
        self.messaging.unregister(&self.credentials.address);
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| ComponentError::stop("route agent", "worker panicked"))?;
        }
        Ok(())
    }
}

impl Drop for LocalRouteAgent {
    fn drop(&mut self) {
        let _ = RouteAgent::stop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::start_backend;
    use tempfile::tempdir;

    #[test]
    fn test_straight_route() {
        let route = Route::straight(Position::new(0.0, 0.0), Position::new(6.0, 8.0));
        assert_eq!(route.distance, 10.0);
        assert_eq!(route.path.len(), 2);
    }

    #[test]
    fn test_stop_wins_over_queued_requests() {
        let dir = tempdir().unwrap();
        let backend = start_backend(dir.path());
        let messaging = backend.handle();
        let inbox = messaging.register("asker@127.0.0.1").unwrap();

        let (tx, mailbox) = crossbeam_channel::unbounded();
        for id in 0..100 {
            tx.send(Envelope {
                from: "asker@127.0.0.1".into(),
                to: "route@127.0.0.1".into(),
                body: Payload::RouteRequest {
                    id,
                    origin: Position::new(0.0, 0.0),
                    destination: Position::new(1.0, 0.0),
                },
            })
            .unwrap();
        }

        serve(
            "route@127.0.0.1".into(),
            mailbox,
            messaging,
            Arc::new(AtomicBool::new(true)),
            false,
        );

        assert_eq!(tx.len(), 100);
        assert!(inbox.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_answers_route_requests() {
        let dir = tempdir().unwrap();
        let backend = start_backend(dir.path());
        let messaging = backend.handle();
        let mut agent = LocalRouteAgent::new(
            AgentCredentials::new("route", "secret", "127.0.0.1"),
            messaging.clone(),
            false,
        );
        agent.start().unwrap();

        let inbox = messaging.register("asker@127.0.0.1").unwrap();
        messaging
            .send(Envelope {
                from: "asker@127.0.0.1".into(),
                to: "route@127.0.0.1".into(),
                body: Payload::RouteRequest {
                    id: 7,
                    origin: Position::new(0.0, 0.0),
                    destination: Position::new(3.0, 4.0),
                },
            })
            .unwrap();

        let reply = inbox.recv_timeout(Duration::from_secs(2)).unwrap();
        match reply.body {
            Payload::RouteResponse { id, route } => {
                assert_eq!(id, 7);
                assert_eq!(route.unwrap().distance, 5.0);
            }
            other => panic!("unexpected reply {other:?}"),
        }

        agent.stop().unwrap();
        assert!(!messaging.is_registered("route@127.0.0.1"));
        agent.stop().unwrap();
    }
}
