//! demo - headless end-to-end run on the synthetic camera.
//!
//! Exercises the whole pipeline without hardware, model assets, or a display:
//! synthetic frames, a scripted detector, optional AVI recording and a PNG
//! screenshot. Ctrl-C stops cleanly.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use spotter::capture::CameraConfig;
use spotter::detect::{BoundingBox, Detection, LabelMap, StubBackend};
use spotter::session::{Command, Session};
use spotter::Overlay;

#[derive(Parser, Debug)]
#[command(author, version, about = "spotter demo - synthetic end-to-end run")]
struct Args {
    /// Duration of the run in seconds.
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    /// Tick rate for the synthetic session.
    #[arg(long, default_value_t = 20)]
    fps: u32,

    /// Record the run to this AVI file.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Save one screenshot halfway through the run.
    #[arg(long)]
    screenshot: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let fps = args.fps.max(1);

    let camera = CameraConfig {
        device: "stub://bench".to_string(),
        width: 640,
        height: 480,
        target_fps: fps,
    };
    // One "person" every third tick, so the stats line moves.
    let detector = StubBackend::repeating(
        vec![Detection {
            class_id: 1,
            confidence: 0.9,
            bbox: BoundingBox {
                x: 200,
                y: 140,
                width: 240,
                height: 200,
            },
        }],
        3,
    );
    let labels = LabelMap::from_names(vec!["person", "car", "bicycle"]);
    let mut session =
        Session::with_components(camera, Box::new(detector), labels, Overlay::without_font());

    let running = Arc::new(AtomicBool::new(true));
    let running_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_flag.store(false, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;

    if let Some(notice) = session.apply(Command::StartCamera {
        index: "0".to_string(),
    })? {
        log::info!("{notice}");
    }
    if let Some(path) = &args.record {
        if let Some(notice) = session.apply(Command::StartRecording { path: path.clone() })? {
            log::info!("{notice}");
        }
    }

    let total_ticks = args.seconds * fps as u64;
    let delay = Duration::from_secs(1) / fps;
    let mut objects_total = 0usize;
    let mut fps_sum = 0.0f32;

    for tick in 0..total_ticks {
        if !running.load(Ordering::SeqCst) {
            log::info!("interrupted after {} ticks", tick);
            break;
        }

        let report = session.tick()?;
        objects_total += report.objects_detected;
        fps_sum += report.fps;

        if tick == total_ticks / 2 {
            if let Some(path) = &args.screenshot {
                if let Some(notice) =
                    session.apply(Command::TakeScreenshot { path: path.clone() })?
                {
                    log::info!("{notice}");
                }
            }
        }
        if (tick + 1) % fps as u64 == 0 {
            log::info!(
                "tick {}: instantaneous fps {:.1}, objects this tick {}",
                tick + 1,
                report.fps,
                report.objects_detected
            );
        }

        std::thread::sleep(delay);
    }

    if let Some(notice) = session.apply(Command::StopRecording)? {
        log::info!("{notice}");
    }
    if let Some(notice) = session.apply(Command::StopCamera)? {
        log::info!("{notice}");
    }

    let ticks = total_ticks.max(1) as f32;
    log::info!(
        "done: {} ticks, mean pipeline fps {:.1}, {} detections total",
        total_ticks,
        fps_sum / ticks,
        objects_total
    );
    Ok(())
}
