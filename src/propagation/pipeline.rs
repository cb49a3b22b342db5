//! Propagation loop and streaming double buffer
//!
//! The pipeline is paced by the frame loop but never runs on it: each ripe
//! tick dispatches one batched backend call to the worker thread, and each
//! frame's pump drains finished replies into the target buffer. At most one
//! call is ever outstanding per registered set; a tick that fires mid-call
//! defers instead of queueing. The render consumer only ever sees the
//! target/current pair, so a suspended backend call can never tear a frame.

use std::time::Duration;

use anyhow::{bail, Result};
use glam::Vec3;

use crate::clock::SimClock;

use super::backend::PropagationBackend;
use super::lifecycle::SetLifecycle;
use super::registry::{self, SatelliteMetadata};
use super::worker::{BackendWorker, Drained};
use crate::data::RawElement;

/// One satellite's sample in object-centered Cartesian meters (and m/s).
/// Velocity is zero for 3-wide backends.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PositionSample {
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Producer-written target and consumer-read current sample sequences.
/// Both are always exactly as long as the registered set.
pub struct SampleBuffers {
    target: Vec<PositionSample>,
    current: Vec<PositionSample>,
}

impl SampleBuffers {
    pub fn new(len: usize) -> Self {
        Self {
            target: vec![PositionSample::default(); len],
            current: vec![PositionSample::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn target(&self) -> &[PositionSample] {
        &self.target
    }

    pub fn current(&self) -> &[PositionSample] {
        &self.current
    }

    /// Copy target into current, index by index. Called by the render
    /// consumer only.
    pub fn promote(&mut self) {
        self.current.copy_from_slice(&self.target);
    }

    /// Overwrite the target from one backend reply (kilometers, `width`
    /// components per satellite). The reply is validated in full before the
    /// first write so a contract violation never leaves a half-new target.
    pub fn commit(&mut self, samples: &[f32], width: usize) -> Result<()> {
        if width != 3 && width != 6 {
            bail!("Unsupported sample width {}", width);
        }
        if samples.len() != self.target.len() * width {
            bail!(
                "Reply has {} components, expected {} x {}",
                samples.len(),
                self.target.len(),
                width
            );
        }
        if let Some(bad) = samples.iter().position(|c| !c.is_finite()) {
            bail!("Non-finite component at index {}", bad);
        }

        for (i, chunk) in samples.chunks_exact(width).enumerate() {
            // Kilometers in, meters stored.
            self.target[i].position =
                Vec3::new(chunk[0], chunk[1], chunk[2]) * 1000.0;
            self.target[i].velocity = if width >= 6 {
                Vec3::new(chunk[3], chunk[4], chunk[5]) * 1000.0
            } else {
                Vec3::ZERO
            };
        }
        Ok(())
    }
}

/// Counters surfaced in the stats panel.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Backend calls dispatched
    pub calls: u64,
    /// Ticks that fired while a call was in flight
    pub deferred: u64,
    /// Failed calls, including contract violations
    pub failed: u64,
    /// Duration of the most recent successful batch
    pub last_batch: Duration,
}

/// The batched propagation pipeline for one registered set.
pub struct PropagationPipeline {
    pub(crate) worker: BackendWorker,
    pub(crate) lifecycle: SetLifecycle,
    pub(crate) in_flight: u32,
    pub(crate) alive: bool,
    metadata: Vec<SatelliteMetadata>,
    buffers: SampleBuffers,
    sample_width: usize,
    backend_name: &'static str,
    accumulator: f64,
    stats: PipelineStats,
}

impl PropagationPipeline {
    /// Register the raw batch with the backend, then move the backend onto
    /// its worker thread. Registration failures and unusable backends
    /// escalate to the caller; nothing starts without them.
    pub fn new(mut backend: Box<dyn PropagationBackend>, raw: &[RawElement]) -> Result<Self> {
        let (handle, metadata) = registry::register(backend.as_mut(), raw)?;
        let sample_width = backend.sample_width();
        let backend_name = backend.name();
        let len = metadata.len();
        let worker = BackendWorker::spawn(backend);

        Ok(Self {
            worker,
            lifecycle: SetLifecycle::new(handle),
            in_flight: 0,
            alive: true,
            metadata,
            buffers: SampleBuffers::new(len),
            sample_width,
            backend_name,
            accumulator: 0.0,
            stats: PipelineStats::default(),
        })
    }

    pub fn metadata(&self) -> &[SatelliteMetadata] {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn buffers(&self) -> &SampleBuffers {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut SampleBuffers {
        &mut self.buffers
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Propagation tick. Paced by an accumulator against `update_hz`; the
    /// accumulator is only cleared when a call actually starts, so a
    /// deferred tick fires again on the next frame.
    pub fn tick(&mut self, frame_dt: f64, update_hz: f32, clock: &SimClock) {
        if !self.alive {
            return;
        }

        let interval = 1.0 / update_hz.clamp(1.0, 60.0) as f64;
        self.accumulator += frame_dt.max(0.0);
        if self.accumulator < interval {
            return;
        }

        let Some(set) = self.lifecycle.handle() else {
            return;
        };
        if self.metadata.is_empty() {
            return;
        }
        if self.in_flight > 0 {
            self.stats.deferred += 1;
            return;
        }

        let now = clock.now();
        let offsets_min: Vec<f64> = self
            .metadata
            .iter()
            .map(|m| (now - m.epoch).num_milliseconds() as f64 / 60_000.0)
            .collect();

        self.in_flight += 1;
        match self.worker.dispatch(set, offsets_min) {
            Ok(()) => {
                self.stats.calls += 1;
                self.accumulator = 0.0;
            }
            Err(e) => {
                self.in_flight -= 1;
                self.stats.failed += 1;
                log::error!("Failed to dispatch propagation call: {}", e);
            }
        }
    }

    /// Drain finished backend replies into the target buffer. A failed call
    /// or a contract violation leaves the target at its previous value; the
    /// next tick retries by construction.
    pub fn pump(&mut self) {
        loop {
            match self.worker.drain() {
                Drained::Reply(reply) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    match reply.result {
                        Ok(samples) => {
                            match self.buffers.commit(&samples, self.sample_width) {
                                Ok(()) => self.stats.last_batch = reply.elapsed,
                                Err(e) => {
                                    self.stats.failed += 1;
                                    log::error!("Backend contract violation: {}", e);
                                }
                            }
                        }
                        Err(e) => {
                            self.stats.failed += 1;
                            log::warn!("Propagation call failed: {}", e);
                        }
                    }
                }
                Drained::Empty => break,
                Drained::Disconnected => {
                    if self.in_flight > 0 {
                        self.stats.failed += self.in_flight as u64;
                        self.in_flight = 0;
                        log::error!("Backend worker is gone; dropping in-flight call");
                    }
                    break;
                }
            }
        }
    }
}

impl Drop for PropagationPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::propagation::backend::testing::{Probes, Reply, ScriptedBackend};
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use std::time::Instant;

    pub(crate) fn test_clock() -> SimClock {
        let start: DateTime<Utc> = "2024-04-14T00:00:00Z".parse().unwrap();
        SimClock::new(start, start + ChronoDuration::days(3))
    }

    pub(crate) fn test_metadata(n: usize) -> Vec<SatelliteMetadata> {
        let base: DateTime<Utc> = "2024-04-14T00:00:00Z".parse().unwrap();
        (0..n)
            .map(|i| SatelliteMetadata {
                name: format!("SAT-{}", i),
                catalog_id: 1000 + i as u32,
                epoch: base + ChronoDuration::minutes(i as i64),
                index: i,
                mean_altitude_km: 550.0,
            })
            .collect()
    }

    /// Pipeline wired to a scripted backend, skipping real registration.
    pub(crate) fn scripted_pipeline(
        backend: ScriptedBackend,
        n: usize,
        registered: bool,
    ) -> (PropagationPipeline, Probes) {
        let probes = backend.probes.clone();
        let width = backend.width;
        let name = "scripted";
        let lifecycle = if registered {
            SetLifecycle::new(crate::propagation::backend::SetHandle(42))
        } else {
            SetLifecycle::unregistered()
        };
        let pipeline = PropagationPipeline {
            worker: BackendWorker::spawn(Box::new(backend)),
            lifecycle,
            in_flight: 0,
            alive: true,
            metadata: test_metadata(n),
            buffers: SampleBuffers::new(n),
            sample_width: width,
            backend_name: name,
            accumulator: 0.0,
            stats: PipelineStats::default(),
        };
        (pipeline, probes)
    }

    pub(crate) fn pump_until_idle(pipeline: &mut PropagationPipeline) {
        let deadline = Instant::now() + std::time::Duration::from_secs(2);
        loop {
            pipeline.pump();
            if pipeline.in_flight() == 0 {
                return;
            }
            assert!(Instant::now() < deadline, "backend reply never arrived");
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    #[test]
    fn test_tick_dispatches_and_commits_target() {
        let (mut pipeline, probes) = scripted_pipeline(ScriptedBackend::new(3), 3, true);
        let clock = test_clock();

        pipeline.tick(1.0, 20.0, &clock);
        assert_eq!(pipeline.in_flight(), 1);
        pump_until_idle(&mut pipeline);

        assert_eq!(probes.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(pipeline.buffers().len(), 3);

        // Satellite i's epoch is i minutes past the clock, so its offset is
        // -i minutes and the scripted sample is offset + i + 0.25 * c, in
        // kilometers; buffers store meters.
        for (i, sample) in pipeline.buffers().target().iter().enumerate() {
            let expected = Vec3::new(0.0, 0.25, 0.5) * 1000.0;
            assert!(
                (sample.position - expected).length() < 1e-3,
                "satellite {}: {:?}",
                i,
                sample.position
            );
        }
    }

    #[test]
    fn test_tick_defers_while_in_flight() {
        let mut backend = ScriptedBackend::new(3);
        backend.delay = std::time::Duration::from_millis(100);
        let (mut pipeline, probes) = scripted_pipeline(backend, 2, true);
        let clock = test_clock();

        pipeline.tick(1.0, 20.0, &clock);
        assert_eq!(pipeline.in_flight(), 1);
        assert_eq!(pipeline.stats().calls, 1);

        // A ripe tick during the in-flight call defers; no second dispatch.
        pipeline.tick(1.0, 20.0, &clock);
        pipeline.tick(1.0, 20.0, &clock);
        assert_eq!(pipeline.in_flight(), 1);
        assert_eq!(pipeline.stats().calls, 1);
        assert_eq!(pipeline.stats().deferred, 2);

        pump_until_idle(&mut pipeline);
        assert!(!probes.overlapped.load(std::sync::atomic::Ordering::SeqCst));

        // Idle again: the next ripe tick dispatches.
        pipeline.tick(1.0, 20.0, &clock);
        assert_eq!(pipeline.stats().calls, 2);
        pump_until_idle(&mut pipeline);
    }

    #[test]
    fn test_failed_call_keeps_target_and_loop_continues() {
        let mut backend = ScriptedBackend::new(3);
        backend.reply = Reply::Fail;
        let (mut pipeline, _) = scripted_pipeline(backend, 2, true);
        let clock = test_clock();

        pipeline.tick(1.0, 20.0, &clock);
        pump_until_idle(&mut pipeline);

        assert_eq!(pipeline.stats().failed, 1);
        for sample in pipeline.buffers().target() {
            assert_eq!(*sample, PositionSample::default());
        }

        // The loop keeps ticking after a failure.
        pipeline.tick(1.0, 20.0, &clock);
        assert_eq!(pipeline.stats().calls, 2);
        pump_until_idle(&mut pipeline);
    }

    #[test]
    fn test_non_finite_reply_is_a_contract_violation() {
        let mut backend = ScriptedBackend::new(3);
        backend.reply = Reply::NonFinite;
        let (mut pipeline, _) = scripted_pipeline(backend, 2, true);
        let clock = test_clock();

        pipeline.tick(1.0, 20.0, &clock);
        pump_until_idle(&mut pipeline);

        assert_eq!(pipeline.stats().failed, 1);
        for sample in pipeline.buffers().target() {
            assert_eq!(*sample, PositionSample::default());
        }
    }

    #[test]
    fn test_buffer_lengths_stay_equal_to_set_size() {
        let (mut pipeline, _) = scripted_pipeline(ScriptedBackend::new(6), 4, true);
        let clock = test_clock();

        assert_eq!(pipeline.buffers().len(), 4);
        assert_eq!(pipeline.buffers().current().len(), 4);

        pipeline.tick(1.0, 20.0, &clock);
        pump_until_idle(&mut pipeline);
        pipeline.buffers_mut().promote();

        assert_eq!(pipeline.buffers().target().len(), 4);
        assert_eq!(pipeline.buffers().current().len(), 4);
        assert_eq!(pipeline.buffers().current(), pipeline.buffers().target());
    }

    #[test]
    fn test_commit_rejects_wrong_length() {
        let mut buffers = SampleBuffers::new(2);
        assert!(buffers.commit(&[1.0, 2.0, 3.0], 3).is_err());
        assert!(buffers.commit(&[1.0; 6], 3).is_ok());
    }

    #[test]
    fn test_velocity_stored_for_six_wide_backends() {
        let mut buffers = SampleBuffers::new(1);
        buffers.commit(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 6).unwrap();
        assert_eq!(buffers.target()[0].position, Vec3::new(1000.0, 2000.0, 3000.0));
        assert_eq!(buffers.target()[0].velocity, Vec3::new(4000.0, 5000.0, 6000.0));

        buffers.commit(&[1.0, 2.0, 3.0], 3).unwrap();
        assert_eq!(buffers.target()[0].velocity, Vec3::ZERO);
    }
}
