//! Set lifecycle coordination
//!
//! The lifecycle owns the registered set handle and is the only place a
//! release can happen. Shutdown stops new backend calls first, waits out
//! any call still in flight, then releases the handle exactly once. A
//! release that fails is logged and the handle is considered released
//! anyway; retrying against a torn-down backend is not meaningful.

use std::thread;
use std::time::Duration;

use super::backend::SetHandle;
use super::pipeline::PropagationPipeline;

const POLL_DELAY: Duration = Duration::from_millis(10);

/// Owner of the registered set handle.
pub struct SetLifecycle {
    handle: Option<SetHandle>,
    released: bool,
}

impl SetLifecycle {
    pub fn new(handle: SetHandle) -> Self {
        Self {
            handle: Some(handle),
            released: false,
        }
    }

    /// Lifecycle for a pipeline whose registration never completed.
    pub(crate) fn unregistered() -> Self {
        Self {
            handle: None,
            released: false,
        }
    }

    /// The handle, while it is still valid to propagate against.
    pub fn handle(&self) -> Option<SetHandle> {
        if self.released {
            None
        } else {
            self.handle
        }
    }
}

impl PropagationPipeline {
    /// Tear the pipeline down. Safe to call at any point — before
    /// registration ever completed, mid-flight, or repeatedly.
    pub fn shutdown(&mut self) {
        // Stop new Idle -> InFlight transitions before anything else.
        self.alive = false;

        let handle = match (self.lifecycle.handle, self.lifecycle.released) {
            (None, _) => {
                // Registration never completed: nothing to release.
                self.worker.stop();
                return;
            }
            (Some(_), true) => {
                self.worker.stop();
                return;
            }
            (Some(handle), false) => handle,
        };

        // Wait out any call still in flight; it cannot be aborted, only
        // outlived. The pump also resolves a dead worker.
        while self.in_flight > 0 {
            self.pump();
            if self.in_flight > 0 {
                thread::sleep(POLL_DELAY);
            }
        }

        match self.worker.release(handle) {
            Ok(()) => log::info!("Released set {:?}", handle),
            Err(e) => log::warn!(
                "Failed to release set {:?} ({}); considering it released",
                handle,
                e
            ),
        }
        self.lifecycle.released = true;

        self.worker.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::propagation::backend::testing::ScriptedBackend;
    use crate::propagation::pipeline::tests::{pump_until_idle, scripted_pipeline, test_clock};

    #[test]
    fn test_shutdown_releases_once_after_in_flight_resolves() {
        let mut backend = ScriptedBackend::new(3);
        backend.delay = Duration::from_millis(50);
        let (mut pipeline, probes) = scripted_pipeline(backend, 2, true);
        let clock = test_clock();

        pipeline.tick(1.0, 20.0, &clock);
        assert_eq!(pipeline.in_flight(), 1);

        pipeline.shutdown();
        assert_eq!(pipeline.in_flight(), 0);
        assert_eq!(probes.calls.load(Ordering::SeqCst), 1);
        assert_eq!(probes.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_twice_releases_once() {
        let (mut pipeline, probes) = scripted_pipeline(ScriptedBackend::new(3), 2, true);

        pipeline.shutdown();
        pipeline.shutdown();
        assert_eq!(probes.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_before_registration_is_a_noop() {
        let (mut pipeline, probes) = scripted_pipeline(ScriptedBackend::new(3), 2, false);

        pipeline.shutdown();
        assert_eq!(probes.releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_no_new_calls_after_shutdown() {
        let (mut pipeline, probes) = scripted_pipeline(ScriptedBackend::new(3), 2, true);
        let clock = test_clock();

        pipeline.tick(1.0, 20.0, &clock);
        pump_until_idle(&mut pipeline);
        pipeline.shutdown();

        pipeline.tick(10.0, 20.0, &clock);
        pipeline.tick(10.0, 20.0, &clock);
        assert_eq!(probes.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.stats().calls, 1);
    }

    #[test]
    fn test_release_failure_is_swallowed_and_not_retried() {
        let mut backend = ScriptedBackend::new(3);
        backend.fail_release = true;
        let (mut pipeline, probes) = scripted_pipeline(backend, 2, true);

        pipeline.shutdown();
        pipeline.shutdown();
        // One attempt, considered released afterwards.
        assert_eq!(probes.releases.load(Ordering::SeqCst), 1);
    }
}
