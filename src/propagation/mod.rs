//! Batched propagation pipeline
//!
//! The pipeline turns a registered element set plus simulated-clock offsets
//! into position samples without ever blocking the frame loop:
//!
//! - `registry` derives backend constants, drops malformed elements, and
//!   registers the surviving batch in one call.
//! - `backend` is the opaque propagation capability (SGP4 via satkit here)
//!   and `worker` runs it on its own thread.
//! - `pipeline` paces the loop, enforces the single-in-flight invariant,
//!   and double-buffers results.
//! - `stream` is the per-frame consumer that promotes target samples into
//!   the current buffer and the renderer's point slots.
//! - `lifecycle` owns the set handle and releases it exactly once, only
//!   after any in-flight call has resolved.

pub mod backend;
mod lifecycle;
pub mod pipeline;
pub mod registry;
mod stream;
mod worker;

pub use backend::{init, BackendKind, PropagationBackend, SetHandle};
pub use lifecycle::SetLifecycle;
pub use pipeline::{PipelineStats, PositionSample, PropagationPipeline, SampleBuffers};
pub use registry::SatelliteMetadata;
pub use stream::RenderStep;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawElement;

    const ISS_L1: &str = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    const ISS_L2: &str = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

    fn tle_checksum(line: &str) -> u32 {
        line.chars()
            .take(68)
            .map(|c| match c {
                '0'..='9' => c.to_digit(10).unwrap(),
                '-' => 1,
                _ => 0,
            })
            .sum::<u32>()
            % 10
    }

    /// ISS line 1 with the epoch field replaced and the checksum redone.
    fn with_epoch(epoch_field: &str) -> String {
        assert_eq!(epoch_field.len(), 14);
        let mut line: Vec<char> = ISS_L1.chars().collect();
        for (i, c) in epoch_field.chars().enumerate() {
            line[18 + i] = c;
        }
        let body: String = line[..68].iter().collect();
        let checksum = tle_checksum(&body);
        format!("{}{}", body, checksum)
    }

    #[test]
    fn test_end_to_end_three_elements_at_their_own_epochs() {
        let mut backend = backend::init(BackendKind::Sgp4).unwrap();
        let raw: Vec<RawElement> = ["24090.50000000", "24091.50000000", "24092.50000000"]
            .iter()
            .enumerate()
            .map(|(i, epoch)| {
                RawElement::new(&format!("SAT-{}", i), &with_epoch(epoch), ISS_L2)
            })
            .collect();

        let (handle, metadata) = registry::register(backend.as_mut(), &raw).unwrap();
        assert_eq!(metadata.len(), 3);
        assert_ne!(metadata[0].epoch, metadata[1].epoch);
        assert_ne!(metadata[1].epoch, metadata[2].epoch);

        // One call with every satellite at its own epoch.
        let samples = backend.propagate(handle, &[0.0, 0.0, 0.0]).unwrap();
        let mut buffers = SampleBuffers::new(3);
        buffers.commit(&samples, backend.sample_width()).unwrap();

        assert_eq!(buffers.target().len(), 3);
        for sample in buffers.target() {
            assert!(sample.position.is_finite());
            assert!(sample.velocity.is_finite());
            // A low orbit sits a bit above one Earth radius.
            let r_km = sample.position.length() as f64 / 1000.0;
            assert!(r_km > 6000.0 && r_km < 8000.0, "radius {} km", r_km);
        }

        backend.release_set(handle).unwrap();
        assert!(backend.propagate(handle, &[0.0, 0.0, 0.0]).is_err());
    }
}
