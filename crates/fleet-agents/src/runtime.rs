//! Agent runtime.
//!
//! A scheduler thread steps every hosted [`Behaviour`] once per tick with the
//! real elapsed seconds since the previous tick.

use fleet_control::setup::RuntimeArtifact;
use fleet_control::{AgentRuntime, BackendPaths, ComponentError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::messaging::MessagingHandle;

/// Something the runtime advances on every tick.
pub trait Behaviour: Send + Sync {
    fn name(&self) -> &str;

    fn step(&self, dt: f64);
}

type Hosted = Arc<Mutex<Vec<Arc<dyn Behaviour>>>>;

/// Handle used to attach behaviours to a runtime.
#[derive(Clone, Default)]
pub struct RuntimeHandle {
    behaviours: Hosted,
}

impl RuntimeHandle {
    /// A handle not driven by any scheduler. Tests step it by hand.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn attach(&self, behaviour: Arc<dyn Behaviour>) {
        tracing::debug!("Runtime hosting {}", behaviour.name());
        self.hosted().push(behaviour);
    }

    /// Removes every behaviour called `name`. Returns whether any was hosted.
    pub fn detach(&self, name: &str) -> bool {
        let mut hosted = self.hosted();
        let before = hosted.len();
        hosted.retain(|b| b.name() != name);
        hosted.len() != before
    }

    pub fn len(&self) -> usize {
        self.hosted().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Steps every hosted behaviour once.
    pub fn step_all(&self, dt: f64) {
        // Behaviours may attach or detach while stepping.
        let hosted: Vec<_> = self.hosted().iter().cloned().collect();
        for behaviour in hosted {
            behaviour.step(dt);
        }
    }

    fn clear(&self) {
        self.hosted().clear();
    }

    fn hosted(&self) -> MutexGuard<'_, Vec<Arc<dyn Behaviour>>> {
        self.behaviours.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("behaviours", &self.len())
            .finish()
    }
}

/// The running scheduler.
pub struct LocalRuntime {
    handle: RuntimeHandle,
    tick: Duration,
    stop: Arc<AtomicBool>,
    scheduler: Option<JoinHandle<()>>,
}

impl LocalRuntime {
    pub fn start(messaging: &MessagingHandle, paths: &BackendPaths) -> Result<Self, ComponentError> {
        let artifact = RuntimeArtifact::load(&paths.runtime_config)
            .map_err(|e| ComponentError::start("agent runtime", e))?;
        if !messaging.is_running() {
            return Err(ComponentError::unreachable("messaging backend"));
        }
        if artifact.host != messaging.host() {
            return Err(ComponentError::start(
                "agent runtime",
                format!(
                    "runtime host {} does not match messaging host {}",
                    artifact.host,
                    messaging.host()
                ),
            ));
        }

        let handle = RuntimeHandle::default();
        let tick = Duration::from_millis(artifact.tick_interval_ms.max(1));
        let stop = Arc::new(AtomicBool::new(false));

        let scheduler_handle = handle.clone();
        let scheduler_stop = Arc::clone(&stop);
        let scheduler = std::thread::Builder::new()
            .name("agent-runtime".into())
            .spawn(move || schedule(scheduler_handle, tick, scheduler_stop))
            .map_err(|e| ComponentError::start("agent runtime", e))?;

        tracing::info!("Agent runtime ticking every {}ms", tick.as_millis());
        Ok(Self {
            handle,
            tick,
            stop,
            scheduler: Some(scheduler),
        })
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.as_ref().is_some_and(|t| !t.is_finished())
    }
}

fn schedule(handle: RuntimeHandle, tick: Duration, stop: Arc<AtomicBool>) {
    let mut last = Instant::now();
    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(tick);
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;
        handle.step_all(dt);
    }
}

impl AgentRuntime for LocalRuntime {
    fn shutdown(&mut self) -> Result<(), ComponentError> {
        self.stop.store(true, Ordering::SeqCst);
        let Some(scheduler) = self.scheduler.take() else {
            return Ok(());
        };
        let joined = scheduler.join();
        self.handle.clear();
        joined.map_err(|_| ComponentError::stop("agent runtime", "scheduler thread panicked"))?;
        tracing::info!("Agent runtime stopped");
        Ok(())
    }
}

impl Drop for LocalRuntime {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
