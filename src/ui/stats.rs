//! Frame timing and pipeline statistics panel

use egui::Ui;

use crate::propagation::PipelineStats;

/// Snapshot of everything the stats panel displays.
pub struct StatsSnapshot<'a> {
    pub frame_delta: f64,
    pub sim_time: String,
    pub window: String,
    pub backend_name: &'a str,
    pub satellites: usize,
    pub in_flight: u32,
    pub pipeline: &'a PipelineStats,
    pub frame_recomputes: u64,
    /// Mean orbital speed over the current buffer, km/s
    pub mean_speed_kms: f64,
}

#[derive(Default)]
pub struct StatsPanel;

impl StatsPanel {
    pub fn show(&mut self, ui: &mut Ui, snapshot: &StatsSnapshot<'_>) {
        let frame_ms = snapshot.frame_delta * 1000.0;
        let fps = 1.0 / snapshot.frame_delta.max(0.001);

        egui::Grid::new("stats_grid")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                ui.label("Frame");
                ui.label(format!("{:.2} ms ({:.0} FPS)", frame_ms, fps));
                ui.end_row();

                ui.label("Simulated time");
                ui.label(&snapshot.sim_time);
                ui.end_row();

                ui.label("Playback window");
                ui.label(&snapshot.window);
                ui.end_row();

                ui.label("Backend");
                ui.label(snapshot.backend_name);
                ui.end_row();

                ui.label("Satellites");
                ui.label(format!("{}", snapshot.satellites));
                ui.end_row();

                ui.label("Propagation calls");
                ui.label(format!(
                    "{} ({} deferred, {} failed)",
                    snapshot.pipeline.calls, snapshot.pipeline.deferred, snapshot.pipeline.failed
                ));
                ui.end_row();

                ui.label("In flight");
                ui.label(format!("{}", snapshot.in_flight));
                ui.end_row();

                ui.label("Last batch");
                ui.label(format!(
                    "{:.2} ms",
                    snapshot.pipeline.last_batch.as_secs_f64() * 1000.0
                ));
                ui.end_row();

                ui.label("Mean speed");
                ui.label(format!("{:.2} km/s", snapshot.mean_speed_kms));
                ui.end_row();

                ui.label("Frame recomputes");
                ui.label(format!("{}", snapshot.frame_recomputes));
                ui.end_row();
            });
    }
}
