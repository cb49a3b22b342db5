//! Render consumption step
//!
//! Runs once per frame as the pre-render hook: promotes the freshest target
//! samples into the current buffer and streams them into the point
//! collection. Startup races (pipeline or sink not built yet) are silent
//! no-ops. The earth-frame transform is shared across the whole collection
//! and only recomputed once the simulated clock has moved more than one
//! simulated second since the last recompute.

use chrono::{DateTime, Utc};

use crate::clock::SimClock;
use crate::frame::EarthFrame;
use crate::renderer::PointCollection;

use super::pipeline::PropagationPipeline;

/// Minimum simulated-time movement before the frame transform is recomputed.
const FRAME_REFRESH_MS: i64 = 1000;

/// Per-frame consumer state.
#[derive(Default)]
pub struct RenderStep {
    frame: EarthFrame,
    last_refresh: Option<DateTime<Utc>>,
}

impl RenderStep {
    /// Number of transform recomputes so far (stats panel).
    pub fn frame_recomputes(&self) -> u64 {
        self.frame.recompute_count()
    }

    /// The pre-render hook. Tolerates missing collaborators silently; resets
    /// the simulated clock (and skips the frame's position update) when it
    /// has drifted out of the playback window.
    pub fn consume(
        &mut self,
        pipeline: Option<&mut PropagationPipeline>,
        clock: &mut SimClock,
        points: Option<&mut PointCollection>,
    ) {
        let (Some(pipeline), Some(points)) = (pipeline, points) else {
            return;
        };
        if pipeline.is_empty() || points.is_empty() {
            return;
        }

        if clock.past_window() {
            log::debug!("Simulated clock left the playback window; resetting to start");
            clock.reset_to_start();
            return;
        }

        let now = clock.now();
        let stale = match self.last_refresh {
            None => true,
            Some(prev) => (now - prev).num_milliseconds().abs() > FRAME_REFRESH_MS,
        };
        if stale {
            self.frame.refresh(now);
            self.last_refresh = Some(now);
            points.set_transform(self.frame.transform());
        }

        pipeline.buffers_mut().promote();
        points.write_positions(pipeline.buffers().current());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::backend::testing::ScriptedBackend;
    use crate::propagation::pipeline::tests::{
        pump_until_idle, scripted_pipeline, test_clock, test_metadata,
    };
    use glam::Mat4;

    #[test]
    fn test_missing_collaborators_are_silent() {
        let mut step = RenderStep::default();
        let mut clock = test_clock();
        step.consume(None, &mut clock, None);

        let (mut pipeline, _) = scripted_pipeline(ScriptedBackend::new(3), 2, true);
        step.consume(Some(&mut pipeline), &mut clock, None);
        assert_eq!(step.frame_recomputes(), 0);
    }

    #[test]
    fn test_wraparound_resets_clock_and_skips_update() {
        let (mut pipeline, _) = scripted_pipeline(ScriptedBackend::new(3), 2, true);
        let mut points = PointCollection::new(&test_metadata(2));
        let mut step = RenderStep::default();
        let mut clock = test_clock();

        // Fill the target with fresh samples.
        clock.set_now("2024-04-14T01:00:00Z".parse().unwrap());
        pipeline.tick(1.0, 20.0, &clock);
        pump_until_idle(&mut pipeline);

        // Drift far past the stop bound: farther from stop than the span.
        clock.set_now("2024-04-21T00:00:00Z".parse().unwrap());
        step.consume(Some(&mut pipeline), &mut clock, Some(&mut points));

        assert_eq!(clock.now(), clock.start());
        // The frame's position update was skipped: current is still default.
        assert_eq!(
            pipeline.buffers().current()[0],
            crate::propagation::PositionSample::default()
        );

        // The next frame streams normally again.
        step.consume(Some(&mut pipeline), &mut clock, Some(&mut points));
        assert_ne!(
            pipeline.buffers().current()[0],
            crate::propagation::PositionSample::default()
        );
    }

    #[test]
    fn test_transform_recompute_is_rate_limited() {
        let (mut pipeline, _) = scripted_pipeline(ScriptedBackend::new(3), 2, true);
        let mut points = PointCollection::new(&test_metadata(2));
        let mut step = RenderStep::default();
        let mut clock = test_clock();

        step.consume(Some(&mut pipeline), &mut clock, Some(&mut points));
        assert_eq!(step.frame_recomputes(), 1);
        let first = points.transform();
        assert_ne!(first, Mat4::IDENTITY);

        // Less than one simulated second: the cached transform is reused.
        clock.advance(0.5);
        step.consume(Some(&mut pipeline), &mut clock, Some(&mut points));
        clock.advance(0.4);
        step.consume(Some(&mut pipeline), &mut clock, Some(&mut points));
        assert_eq!(step.frame_recomputes(), 1);
        assert_eq!(points.transform(), first);

        // More than one simulated second: exactly one recompute.
        clock.advance(2.0);
        step.consume(Some(&mut pipeline), &mut clock, Some(&mut points));
        assert_eq!(step.frame_recomputes(), 2);
        assert_ne!(points.transform(), first);
    }

    #[test]
    fn test_consume_streams_target_through_current_into_slots() {
        let (mut pipeline, _) = scripted_pipeline(ScriptedBackend::new(3), 3, true);
        let mut points = PointCollection::new(&test_metadata(3));
        let mut step = RenderStep::default();
        let mut clock = test_clock();

        pipeline.tick(1.0, 20.0, &clock);
        pump_until_idle(&mut pipeline);
        step.consume(Some(&mut pipeline), &mut clock, Some(&mut points));

        assert_eq!(pipeline.buffers().current(), pipeline.buffers().target());
        for i in 0..3 {
            let expected = pipeline.buffers().current()[i].position
                / crate::renderer::EARTH_RADIUS_M;
            let got = points.position(i).unwrap();
            assert!((got - expected).length() < 1e-6);
        }
    }
}
