//! spotter - the GUI shell.
//!
//! Presentation only: every widget builds a [`Command`] for the session, the
//! repaint timer drives [`Session::tick`], and notices/errors land in the
//! status line. Startup assets are loaded before the window opens, so a
//! missing asset aborts without ever showing a frame.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use clap::Parser;

use spotter::session::{self, Command, Session, SessionState};
use spotter::{AppConfig, AppError};

#[derive(Parser, Debug)]
#[command(author, version, about = "Spotter - live object detection console")]
struct Args {
    /// Configuration file (TOML).
    #[arg(long, env = "SPOTTER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the camera device prefix (e.g. "stub://bench" for the
    /// synthetic source).
    #[arg(long)]
    device_prefix: Option<String>,

    /// Override the detector backend ("stub" or "tract").
    #[arg(long)]
    backend: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = AppConfig::load_from(args.config.as_deref())?;
    if let Some(prefix) = args.device_prefix {
        config.camera.device_prefix = prefix;
    }
    if let Some(backend) = args.backend {
        config.detector.backend = backend;
    }

    // Fatal on missing assets, before any window exists.
    let session = Session::from_config(&config)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_min_inner_size([720.0, 620.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Spotter",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            Ok(Box::new(SpotterApp::new(session)))
        }),
    )
    .map_err(|err| anyhow!("gui event loop failed: {err}"))
}

struct SpotterApp {
    session: Session,
    camera_index: String,
    screenshot_path: String,
    recording_path: String,
    confidence: f32,
    status: String,
    fps: f32,
    objects_detected: usize,
    texture: Option<egui::TextureHandle>,
}

impl SpotterApp {
    fn new(session: Session) -> Self {
        let stamp = unix_seconds();
        Self {
            session,
            camera_index: "0".to_string(),
            screenshot_path: format!("screenshot-{stamp}.png"),
            recording_path: format!("recording-{stamp}.avi"),
            confidence: session::DEFAULT_CONFIDENCE,
            status: String::new(),
            fps: 0.0,
            objects_detected: 0,
            texture: None,
        }
    }

    fn dispatch(&mut self, command: Command) {
        match self.session.apply(command) {
            Ok(Some(notice)) => self.status = notice.to_string(),
            Ok(None) => {}
            Err(err) => self.status = fault_message(&err),
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui, state: &SessionState) {
        ui.horizontal(|ui| {
            if ui.button("Start Camera").clicked() {
                self.dispatch(Command::StartCamera {
                    index: self.camera_index.clone(),
                });
            }
            if ui.button("Take Screenshot").clicked() {
                self.dispatch(Command::TakeScreenshot {
                    path: PathBuf::from(self.screenshot_path.clone()),
                });
            }
            let record_label = if state.recording {
                "Stop Recording"
            } else {
                "Start Recording"
            };
            if ui.button(record_label).clicked() {
                if state.recording {
                    self.dispatch(Command::StopRecording);
                } else {
                    self.dispatch(Command::StartRecording {
                        path: PathBuf::from(self.recording_path.clone()),
                    });
                }
            }
        });
        ui.horizontal(|ui| {
            if ui.button("Stop Camera").clicked() {
                self.dispatch(Command::StopCamera);
            }
            if ui.button("Toggle Detection").clicked() {
                self.dispatch(Command::ToggleDetection);
            }
            if ui.button("Night Mode").clicked() {
                self.dispatch(Command::ToggleNightMode);
            }
        });
    }

    fn settings_row(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.colored_label(egui::Color32::from_rgb(200, 120, 255), "Confidence Threshold:");
            let slider = egui::Slider::new(
                &mut self.confidence,
                session::MIN_CONFIDENCE..=session::MAX_CONFIDENCE,
            )
            .step_by(0.1);
            if ui.add(slider).changed() {
                self.dispatch(Command::SetConfidence(self.confidence));
            }

            ui.separator();
            ui.colored_label(egui::Color32::from_rgb(200, 120, 255), "Camera Index:");
            ui.add(egui::TextEdit::singleline(&mut self.camera_index).desired_width(48.0));
        });
        ui.horizontal(|ui| {
            ui.label("Screenshot file:");
            ui.add(egui::TextEdit::singleline(&mut self.screenshot_path).desired_width(240.0));
            ui.label("Recording file:");
            ui.add(egui::TextEdit::singleline(&mut self.recording_path).desired_width(240.0));
        });
    }

    fn run_tick(&mut self, ctx: &egui::Context) {
        match self.session.tick() {
            Ok(report) => {
                let size = [report.frame.width() as usize, report.frame.height() as usize];
                let color = egui::ColorImage::from_rgb(size, report.frame.as_rgb_bytes());
                match &mut self.texture {
                    Some(texture) => texture.set(color, egui::TextureOptions::LINEAR),
                    None => {
                        self.texture =
                            Some(ctx.load_texture("live-feed", color, egui::TextureOptions::LINEAR))
                    }
                }
                self.fps = report.fps;
                self.objects_detected = report.objects_detected;
            }
            Err(err) => self.status = fault_message(&err),
        }
    }
}

impl eframe::App for SpotterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let state = self.session.state();
        if state.running {
            self.run_tick(ctx);
            ctx.request_repaint_after(session::TICK_DELAY);
        }
        let state = self.session.state();

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(6.0);
            self.controls(ui, &state);
            ui.add_space(6.0);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            if state.recording {
                let elapsed = self.session.recording_elapsed().unwrap_or(Duration::ZERO);
                ui.horizontal(|ui| {
                    ui.colored_label(egui::Color32::RED, "Recording...");
                    ui.monospace(format_hms(elapsed));
                });
            }
            if !self.status.is_empty() {
                ui.label(&self.status);
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                match &self.texture {
                    Some(texture) => {
                        ui.add(
                            egui::Image::new(texture)
                                .fit_to_exact_size(egui::vec2(640.0, 480.0)),
                        );
                    }
                    None => {
                        let (rect, _) = ui
                            .allocate_exact_size(egui::vec2(640.0, 480.0), egui::Sense::hover());
                        ui.painter().rect_filled(
                            rect,
                            egui::CornerRadius::ZERO,
                            egui::Color32::from_rgb(46, 46, 46),
                        );
                    }
                }

                let stats = format!(
                    "Stats: FPS = {:.2}, Objects Detected = {}",
                    self.fps, self.objects_detected
                );
                ui.label(
                    egui::RichText::new(stats)
                        .color(egui::Color32::GREEN)
                        .monospace(),
                );
                ui.add_space(4.0);
                self.settings_row(ui);
            });
        });
    }
}

/// Prefer the taxonomy message for known faults; fall back to the full chain.
fn fault_message(err: &anyhow::Error) -> String {
    match AppError::classify(err) {
        Some(app_err) => app_err.to_string(),
        None => format!("{err:#}"),
    }
}

fn format_hms(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
