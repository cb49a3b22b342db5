//! satstream - real-time satellite constellation visualizer
//!
//! Streams batched propagation results into an instanced wgpu point cloud:
//! a worker thread recomputes every satellite's position against the
//! simulated clock while the frame loop consumes the freshest finished
//! batch, so the viewport never waits on the propagator.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Parser;
use eframe::egui;
use glam::Vec3;
use parking_lot::RwLock;

use satstream::clock::SimClock;
use satstream::data;
use satstream::propagation::{self, BackendKind, PropagationPipeline, RenderStep};
use satstream::renderer::{
    OrbitCamera, PointCollection, SceneCallback, SceneRenderData, SceneResources,
};
use satstream::ui::{PlaybackControls, StatsPanel, StatsSnapshot};

const POINTS_CAPACITY: u32 = 50_000;

#[derive(Parser, Debug)]
#[command(name = "satstream", about = "Real-time satellite constellation visualizer")]
struct Args {
    /// Three-line element file to visualize
    #[arg(long, default_value = "data/elements.tle")]
    elements: PathBuf,

    /// Propagation backend
    #[arg(long, value_enum, default_value_t = BackendKind::Sgp4)]
    backend: BackendKind,

    /// Playback window length in hours, starting at the current time
    #[arg(long, default_value_t = 72.0)]
    window_hours: f64,

    /// Start with playback paused
    #[arg(long)]
    paused: bool,
}

struct SatStreamApp {
    pipeline: PropagationPipeline,
    points: PointCollection,
    render_step: RenderStep,
    clock: SimClock,

    controls: PlaybackControls,
    stats_panel: StatsPanel,
    show_settings: bool,
    show_stats: bool,

    camera: OrbitCamera,
    camera_drag: Option<egui::Pos2>,
    wgpu_initialized: bool,

    last_frame_time: std::time::Instant,
    last_frame_delta: f64,
}

impl SatStreamApp {
    fn new(cc: &eframe::CreationContext<'_>, args: &Args) -> Result<Self> {
        let elements = data::load_elements(&args.elements)?;

        let backend = propagation::init(args.backend)?;
        let pipeline = PropagationPipeline::new(backend, &elements)?;
        let points = PointCollection::new(pipeline.metadata());
        log::info!("Pipeline ready with {} satellites", pipeline.len());

        let start = Utc::now();
        let stop = start + Duration::milliseconds((args.window_hours * 3_600_000.0) as i64);
        let clock = SimClock::new(start, stop);

        let mut controls = PlaybackControls::default();
        controls.playing = !args.paused;

        let wgpu_initialized = if let Some(wgpu_render_state) = &cc.wgpu_render_state {
            let resources = SceneResources::new(
                &wgpu_render_state.device,
                wgpu_render_state.target_format,
                1280,
                720,
                POINTS_CAPACITY,
            );
            wgpu_render_state
                .renderer
                .write()
                .callback_resources
                .insert(resources);
            log::info!("wgpu scene initialized");
            true
        } else {
            log::warn!("No wgpu render state available; viewport disabled");
            false
        };

        Ok(Self {
            pipeline,
            points,
            render_step: RenderStep::default(),
            clock,
            controls,
            stats_panel: StatsPanel::default(),
            show_settings: false,
            show_stats: true,
            camera: OrbitCamera::default(),
            camera_drag: None,
            wgpu_initialized,
            last_frame_time: std::time::Instant::now(),
            last_frame_delta: 0.0,
        })
    }

    fn handle_camera_input(&mut self, ctx: &egui::Context, viewport_rect: egui::Rect) {
        let input = ctx.input(|i| i.clone());

        if let Some(pos) = input.pointer.hover_pos() {
            if viewport_rect.contains(pos) {
                let scroll = input.raw_scroll_delta.y;
                if scroll != 0.0 {
                    self.camera.zoom(scroll * 0.1);
                }

                if input.pointer.button_down(egui::PointerButton::Primary) {
                    if let Some(last_pos) = self.camera_drag {
                        let delta = pos - last_pos;
                        self.camera.orbit(delta.x, delta.y);
                    }
                    self.camera_drag = Some(pos);
                } else {
                    self.camera_drag = None;
                }
            }
        }
    }

    /// Approximate sun direction from the simulated hour of day.
    fn sun_direction(&self) -> Vec3 {
        let seconds = self
            .clock
            .now()
            .signed_duration_since(self.clock.start())
            .num_seconds() as f64;
        let angle = (seconds / 86_400.0).fract() * 2.0 * std::f64::consts::PI;
        Vec3::new(angle.cos() as f32, 0.3, angle.sin() as f32).normalize()
    }

    fn push_render_data(&mut self, frame: &eframe::Frame, aspect_ratio: f32) {
        if let Some(wgpu_render_state) = frame.wgpu_render_state() {
            let renderer = wgpu_render_state.renderer.read();
            if let Some(resources) = renderer.callback_resources.get::<SceneResources>() {
                let instances = if self.controls.show_satellites {
                    self.points.shared_instances()
                } else {
                    Arc::new(RwLock::new(Vec::new()))
                };

                resources.set_render_data(SceneRenderData {
                    camera: self.camera.clone(),
                    aspect_ratio,
                    sun_direction: self.sun_direction(),
                    points_model: self.points.transform(),
                    instances,
                });
            }
        }
    }

    fn show_viewport(&mut self, ui: &mut egui::Ui, frame: &eframe::Frame) {
        let viewport_rect = ui.available_rect_before_wrap();
        let pixels_per_point = ui.ctx().pixels_per_point();
        let viewport_width = (viewport_rect.width() * pixels_per_point).round().max(1.0) as u32;
        let viewport_height = (viewport_rect.height() * pixels_per_point).round().max(1.0) as u32;

        self.handle_camera_input(ui.ctx(), viewport_rect);

        let aspect_ratio = viewport_rect.width() / viewport_rect.height();
        self.push_render_data(frame, aspect_ratio);

        let (response, painter) =
            ui.allocate_painter(viewport_rect.size(), egui::Sense::click_and_drag());

        painter.add(egui_wgpu::Callback::new_paint_callback(
            response.rect,
            SceneCallback {
                viewport_size: (viewport_width, viewport_height),
            },
        ));

        let frame_time = self.last_frame_delta.max(0.001);
        painter.text(
            response.rect.left_top() + egui::vec2(10.0, 10.0),
            egui::Align2::LEFT_TOP,
            format!(
                "Camera: dist={:.2} az={:.1}° el={:.1}°\n\
                 Drag to orbit | Scroll to zoom\n\
                 FPS: {:.0}",
                self.camera.distance,
                self.camera.azimuth.to_degrees(),
                self.camera.elevation.to_degrees(),
                1.0 / frame_time,
            ),
            egui::FontId::monospace(12.0),
            egui::Color32::from_rgb(150, 150, 150),
        );
    }
}

impl eframe::App for SatStreamApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        // Frame pacing against the configured FPS cap
        let max_fps = self.controls.max_fps.clamp(20.0, 500.0) as f64;
        let min_frame_time = 1.0 / max_fps;
        let mut now = std::time::Instant::now();
        let mut frame_time = (now - self.last_frame_time).as_secs_f64();

        if frame_time < min_frame_time {
            std::thread::sleep(std::time::Duration::from_secs_f64(
                min_frame_time - frame_time,
            ));
            now = std::time::Instant::now();
            frame_time = (now - self.last_frame_time).as_secs_f64();
        }

        self.last_frame_time = now;
        self.last_frame_delta = frame_time;

        // Advance the simulated clock
        self.clock.rate = self.controls.effective_rate();
        self.clock.advance(frame_time);

        // Propagation tick and reply pump, then the pre-render consumption
        // step that streams the freshest batch into the point slots.
        self.pipeline
            .tick(frame_time, self.controls.update_hz, &self.clock);
        self.pipeline.pump();
        self.render_step.consume(
            Some(&mut self.pipeline),
            &mut self.clock,
            Some(&mut self.points),
        );

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("satstream");
                ui.separator();
                if ui.button("Settings").clicked() {
                    self.show_settings = true;
                }
                if ui.button("Stats").clicked() {
                    self.show_stats = !self.show_stats;
                }
                ui.separator();
                self.controls.show_top_bar(ui, &self.clock.format_utc());
                if ui.button("⟲").on_hover_text("Back to window start").clicked() {
                    self.clock.reset_to_start();
                }
                ui.separator();
                ui.label(format!(
                    "{} | {} satellites",
                    self.pipeline.backend_name(),
                    self.pipeline.len()
                ));
            });
        });

        if self.show_settings {
            let mut open = true;
            egui::Window::new("Settings")
                .open(&mut open)
                .resizable(false)
                .show(ctx, |ui| {
                    self.controls.show_settings(ui);
                });
            self.show_settings = open;
        }

        if self.show_stats {
            egui::Window::new("Statistics")
                .resizable(false)
                .show(ctx, |ui| {
                    let snapshot = StatsSnapshot {
                        frame_delta: self.last_frame_delta.max(0.001),
                        sim_time: self.clock.format_utc(),
                        window: format!(
                            "{} → {}",
                            self.clock.start().format("%m-%d %H:%M"),
                            self.clock.stop().format("%m-%d %H:%M")
                        ),
                        backend_name: self.pipeline.backend_name(),
                        satellites: self.pipeline.len(),
                        in_flight: self.pipeline.in_flight(),
                        pipeline: self.pipeline.stats(),
                        frame_recomputes: self.render_step.frame_recomputes(),
                        mean_speed_kms: mean_speed_kms(self.pipeline.buffers().current()),
                    };
                    self.stats_panel.show(ui, &snapshot);
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.wgpu_initialized {
                self.show_viewport(ui, frame);
            } else {
                ui.centered_and_justified(|ui| {
                    ui.label("wgpu renderer unavailable");
                });
            }
        });

        // Continuous repaint with the FPS cap
        let frame_delay = 1.0 / max_fps;
        ctx.request_repaint_after(std::time::Duration::from_secs_f64(frame_delay));
    }

    fn on_exit(&mut self) {
        self.pipeline.shutdown();
    }
}

/// Mean orbital speed over the current buffer, km/s.
fn mean_speed_kms(samples: &[satstream::propagation::PositionSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples
        .iter()
        .map(|s| s.velocity.length() as f64 / 1000.0)
        .sum();
    total / samples.len() as f64
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("Starting satstream with {:?}", args.elements);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1600.0, 900.0])
            .with_title("satstream"),
        renderer: eframe::Renderer::Wgpu,
        vsync: false,
        ..Default::default()
    };

    eframe::run_native(
        "satstream",
        options,
        Box::new(move |cc| match SatStreamApp::new(cc, &args) {
            Ok(app) => Ok(Box::new(app)),
            Err(e) => {
                log::error!("Failed to initialize app: {}", e);
                Err(e.into())
            }
        }),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {}", e))
}
