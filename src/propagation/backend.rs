//! Propagation backend capability
//!
//! The pipeline treats the numerical propagator as an opaque capability: a
//! batch of orbital constants is registered once, propagated many times with
//! per-satellite time offsets, and released exactly once. The shipped
//! implementation runs SGP4 via satkit; anything able to honor the contract
//! (a GPU kernel, a different analytic theory) can slot in behind the trait.
//!
//! Contract: `propagate` returns `sample_width()` components per satellite
//! (3 for position, 6 with velocity), flattened in metadata-index order, in
//! kilometers and kilometers per second, with the polar axis mapped to
//! render-frame Y.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;

/// Opaque token for a batch of constants accepted by a backend.
/// Valid from registration until release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetHandle(pub(crate) u64);

/// Backend-ready representation of one element, derived by the registry.
#[derive(Debug, Clone)]
pub struct OrbitalConstants {
    pub(crate) tle: satkit::TLE,
}

/// Capability consumed by the propagation pipeline.
pub trait PropagationBackend: Send {
    /// Human-readable backend name for the stats panel.
    fn name(&self) -> &'static str;

    /// Components per satellite in `propagate` replies: 3 or 6.
    fn sample_width(&self) -> usize;

    /// Accept a whole batch of constants, returning the set token.
    fn register_set(&mut self, constants: Vec<OrbitalConstants>) -> Result<SetHandle>;

    /// Propagate every satellite of `set` to its own offset (minutes past
    /// its reference epoch). Offsets are indexed like the registered batch.
    fn propagate(&mut self, set: SetHandle, offsets_min: &[f64]) -> Result<Vec<f32>>;

    /// Release the set. Using the handle afterwards is a caller bug.
    fn release_set(&mut self, set: SetHandle) -> Result<()>;
}

/// Backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// SGP4 analytic propagation on a worker thread
    Sgp4,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sgp4 => "SGP4 (satkit)",
        }
    }

    pub fn all() -> &'static [BackendKind] {
        &[BackendKind::Sgp4]
    }
}

impl std::fmt::Display for BackendKind {
    /// CLI value name, round-trippable through the argument parser.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sgp4 => write!(f, "sgp4"),
        }
    }
}

/// Construct the selected backend. A backend that cannot initialize is a
/// startup error reported to the caller; the pipeline never starts without
/// a usable backend.
pub fn init(kind: BackendKind) -> Result<Box<dyn PropagationBackend>> {
    match kind {
        BackendKind::Sgp4 => {
            log::info!("Initializing {} backend", kind.name());
            Ok(Box::new(Sgp4Backend::new()))
        }
    }
}

/// SGP4 backend over satkit.
///
/// Keeps the registered TLE batches in memory; each propagate call runs the
/// whole batch at the requested per-satellite instants.
pub struct Sgp4Backend {
    sets: HashMap<u64, Vec<satkit::TLE>>,
    next_handle: u64,
}

impl Sgp4Backend {
    pub fn new() -> Self {
        Self {
            sets: HashMap::new(),
            next_handle: 1,
        }
    }
}

impl PropagationBackend for Sgp4Backend {
    fn name(&self) -> &'static str {
        "SGP4 (satkit)"
    }

    fn sample_width(&self) -> usize {
        6
    }

    fn register_set(&mut self, constants: Vec<OrbitalConstants>) -> Result<SetHandle> {
        let handle = SetHandle(self.next_handle);
        self.next_handle += 1;
        self.sets
            .insert(handle.0, constants.into_iter().map(|c| c.tle).collect());
        Ok(handle)
    }

    fn propagate(&mut self, set: SetHandle, offsets_min: &[f64]) -> Result<Vec<f32>> {
        let tles = self
            .sets
            .get_mut(&set.0)
            .with_context(|| format!("Unknown set handle {:?}", set))?;

        if offsets_min.len() != tles.len() {
            bail!(
                "Offset count {} does not match set size {}",
                offsets_min.len(),
                tles.len()
            );
        }

        let mut samples = Vec::with_capacity(tles.len() * 6);
        for (index, (tle, offset)) in tles.iter_mut().zip(offsets_min).enumerate() {
            let target = tle.epoch + satkit::Duration::from_seconds(offset * 60.0);
            let (positions, velocities, errors) = satkit::sgp4::sgp4(tle, &[target]);
            if errors[0] != satkit::sgp4::SGP4Error::SGP4Success {
                return Err(anyhow!(
                    "SGP4 failed for satellite {}: {:?}",
                    index,
                    errors[0]
                ));
            }

            // satkit reports TEME in meters and m/s. TEME is Z-up (polar
            // axis); rendering is Y-up. Convert preserving right-handedness
            // and emit kilometers.
            let pos = positions.column(0);
            let vel = velocities.column(0);
            samples.push((pos[0] / 1000.0) as f32);
            samples.push((pos[2] / 1000.0) as f32);
            samples.push((-pos[1] / 1000.0) as f32);
            samples.push((vel[0] / 1000.0) as f32);
            samples.push((vel[2] / 1000.0) as f32);
            samples.push((-vel[1] / 1000.0) as f32);
        }

        Ok(samples)
    }

    fn release_set(&mut self, set: SetHandle) -> Result<()> {
        self.sets
            .remove(&set.0)
            .map(|_| ())
            .with_context(|| format!("Unknown set handle {:?}", set))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backend for driving the pipeline deterministically.

    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Reply {
        /// Finite samples derived from the offsets
        Samples,
        /// Whole-call failure
        Fail,
        /// Contract violation: NaN in the reply
        NonFinite,
    }

    /// Shared observers for assertions from the test thread.
    #[derive(Clone, Default)]
    pub struct Probes {
        pub calls: Arc<AtomicUsize>,
        pub releases: Arc<AtomicUsize>,
        pub overlapped: Arc<AtomicBool>,
        active: Arc<AtomicUsize>,
    }

    pub struct ScriptedBackend {
        pub width: usize,
        pub reply: Reply,
        pub delay: Duration,
        pub fail_release: bool,
        pub probes: Probes,
    }

    impl ScriptedBackend {
        pub fn new(width: usize) -> Self {
            Self {
                width,
                reply: Reply::Samples,
                delay: Duration::ZERO,
                fail_release: false,
                probes: Probes::default(),
            }
        }
    }

    impl PropagationBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn sample_width(&self) -> usize {
            self.width
        }

        fn register_set(&mut self, _constants: Vec<OrbitalConstants>) -> Result<SetHandle> {
            Ok(SetHandle(42))
        }

        fn propagate(&mut self, _set: SetHandle, offsets_min: &[f64]) -> Result<Vec<f32>> {
            if self.probes.active.fetch_add(1, Ordering::SeqCst) > 0 {
                self.probes.overlapped.store(true, Ordering::SeqCst);
            }
            std::thread::sleep(self.delay);
            self.probes.calls.fetch_add(1, Ordering::SeqCst);
            self.probes.active.fetch_sub(1, Ordering::SeqCst);

            match self.reply {
                Reply::Fail => bail!("scripted failure"),
                Reply::NonFinite => {
                    let mut samples = vec![1.0_f32; offsets_min.len() * self.width];
                    samples[0] = f32::NAN;
                    Ok(samples)
                }
                Reply::Samples => {
                    let mut samples = Vec::with_capacity(offsets_min.len() * self.width);
                    for (i, offset) in offsets_min.iter().enumerate() {
                        for c in 0..self.width {
                            samples.push(*offset as f32 + i as f32 + c as f32 * 0.25);
                        }
                    }
                    Ok(samples)
                }
            }
        }

        fn release_set(&mut self, _set: SetHandle) -> Result<()> {
            self.probes.releases.fetch_add(1, Ordering::SeqCst);
            if self.fail_release {
                bail!("scripted release failure");
            }
            Ok(())
        }
    }
}
