//! Headless scenarios for the command layer and the per-tick pipeline.

use std::path::PathBuf;

use spotter::capture::CameraConfig;
use spotter::detect::{BoundingBox, Detection, LabelMap, StubBackend};
use spotter::session::{Command, Notice, Session};
use spotter::{AppError, Frame, Overlay};

fn solid_camera() -> CameraConfig {
    CameraConfig {
        device: "stub://solid".to_string(),
        width: 640,
        height: 480,
        target_fps: 20,
    }
}

fn session_with(detector: StubBackend) -> Session {
    Session::with_components(
        solid_camera(),
        Box::new(detector),
        LabelMap::from_names(vec!["person", "car"]),
        Overlay::without_font(),
    )
}

fn start(session: &mut Session) {
    session
        .apply(Command::StartCamera {
            index: "0".to_string(),
        })
        .expect("start camera");
}

fn person() -> Detection {
    Detection {
        class_id: 1,
        confidence: 0.9,
        bbox: BoundingBox {
            x: 100,
            y: 80,
            width: 200,
            height: 160,
        },
    }
}

fn is_uniform(frame: &Frame) -> bool {
    let bytes = frame.as_rgb_bytes();
    bytes.chunks(3).all(|px| px == &bytes[0..3])
}

#[test]
fn non_integer_camera_index_is_invalid_input() {
    let mut session = session_with(StubBackend::new());

    let err = session
        .apply(Command::StartCamera {
            index: "abc".to_string(),
        })
        .unwrap_err();

    assert!(matches!(
        AppError::classify(&err),
        Some(AppError::InvalidInput { .. })
    ));
    // No device open was attempted.
    assert!(!session.state().running);
}

#[test]
fn camera_lifecycle_start_stop() {
    let mut session = session_with(StubBackend::new());

    start(&mut session);
    assert!(session.state().running);

    let notice = session.apply(Command::StopCamera).unwrap();
    assert_eq!(notice, Some(Notice::CameraStopped));
    assert!(!session.state().running);

    // Stopping again stays safe.
    session.apply(Command::StopCamera).unwrap();
    assert!(!session.state().running);
}

#[test]
fn detection_toggle_suppresses_overlays() {
    // The stub would report a person on every tick.
    let mut session = session_with(StubBackend::scripted(vec![vec![person()], vec![person()]]));
    start(&mut session);

    let annotated = session.tick().unwrap();
    assert_eq!(annotated.objects_detected, 1);
    assert!(!is_uniform(&annotated.frame), "expected drawn overlays");

    session.apply(Command::ToggleDetection).unwrap();
    let plain = session.tick().unwrap();
    assert_eq!(plain.objects_detected, 0);
    assert!(is_uniform(&plain.frame), "overlays drawn while disabled");
}

#[test]
fn night_mode_inverts_and_restores() {
    let mut session = session_with(StubBackend::new());
    start(&mut session);

    let base = session.tick().unwrap().frame;

    session.apply(Command::ToggleNightMode).unwrap();
    let mut inverted = session.tick().unwrap().frame;
    assert_ne!(base, inverted);

    // Inverting the inverted frame restores the original pixels.
    inverted.invert();
    assert_eq!(base, inverted);

    session.apply(Command::ToggleNightMode).unwrap();
    let restored = session.tick().unwrap().frame;
    assert_eq!(base, restored);
}

#[test]
fn recording_lifecycle_writes_one_sink() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.avi");
    let second = dir.path().join("second.avi");
    let mut session = session_with(StubBackend::new());

    // Stop without start is a no-op.
    assert_eq!(session.apply(Command::StopRecording).unwrap(), None);

    // Recording without a running camera is a no-op.
    assert_eq!(
        session
            .apply(Command::StartRecording {
                path: first.clone()
            })
            .unwrap(),
        None
    );

    start(&mut session);
    let notice = session
        .apply(Command::StartRecording {
            path: first.clone(),
        })
        .unwrap();
    assert!(matches!(notice, Some(Notice::RecordingStarted { .. })));
    assert!(session.state().recording);

    // Second start is a no-op; only one sink exists.
    assert_eq!(
        session
            .apply(Command::StartRecording {
                path: second.clone()
            })
            .unwrap(),
        None
    );
    assert!(!second.exists());

    for _ in 0..5 {
        session.tick().unwrap();
    }

    let stopped = session.apply(Command::StopRecording).unwrap();
    assert!(matches!(stopped, Some(Notice::RecordingStopped { .. })));
    assert!(!session.state().recording);

    let bytes = std::fs::read(&first).unwrap();
    assert!(!bytes.is_empty());
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"AVI ");
    let frames = u32::from_le_bytes(bytes[48..52].try_into().unwrap());
    assert_eq!(frames, 5);
}

#[test]
fn unusable_recording_path_leaves_session_usable() {
    let mut session = session_with(StubBackend::new());
    start(&mut session);

    let err = session
        .apply(Command::StartRecording {
            path: PathBuf::from("/nonexistent/dir/clip.avi"),
        })
        .unwrap_err();
    assert!(matches!(
        AppError::classify(&err),
        Some(AppError::CannotCreateSink { .. })
    ));

    // Session unaffected: still running, not recording, ticks fine.
    assert!(session.state().running);
    assert!(!session.state().recording);
    session.tick().unwrap();
}

#[test]
fn stopping_the_camera_finalizes_the_recording() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.avi");
    let mut session = session_with(StubBackend::new());

    start(&mut session);
    session
        .apply(Command::StartRecording { path: path.clone() })
        .unwrap();
    session.tick().unwrap();

    session.apply(Command::StopCamera).unwrap();
    let state = session.state();
    assert!(!state.running);
    assert!(!state.recording);

    // The sink was finalized, not abandoned.
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");
    let frames = u32::from_le_bytes(bytes[48..52].try_into().unwrap());
    assert_eq!(frames, 1);
}

#[test]
fn screenshot_is_a_raw_frame_and_requires_a_camera() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shot.png");
    // Detections every tick; the screenshot must not contain them.
    let mut session = session_with(StubBackend::repeating(vec![person()], 1));

    // No camera: no-op, no file.
    assert_eq!(
        session
            .apply(Command::TakeScreenshot { path: path.clone() })
            .unwrap(),
        None
    );
    assert!(!path.exists());

    start(&mut session);
    session.apply(Command::ToggleNightMode).unwrap();
    let notice = session
        .apply(Command::TakeScreenshot { path: path.clone() })
        .unwrap();
    assert!(matches!(notice, Some(Notice::ScreenshotSaved { .. })));

    let saved = image::open(&path).unwrap().into_rgb8();
    // Raw capture: no overlay, no night-mode inversion, so the solid source
    // color survives untouched.
    let first = saved.get_pixel(0, 0).0;
    assert!(saved.pixels().all(|px| px.0 == first));
    assert_eq!(first, [32, 32, 32]);
}

#[test]
fn mid_session_read_failure_stops_and_releases() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut-short.avi");
    let mut session = Session::with_components(
        CameraConfig {
            device: "stub://failing".to_string(),
            ..solid_camera()
        },
        Box::new(StubBackend::new()),
        LabelMap::from_names(vec!["person"]),
        Overlay::without_font(),
    );

    start(&mut session);
    session
        .apply(Command::StartRecording { path: path.clone() })
        .unwrap();

    let err = session.tick().unwrap_err();
    assert!(matches!(
        AppError::classify(&err),
        Some(AppError::ReadFailure { .. })
    ));

    // The device was released and the recording finalized.
    let state = session.state();
    assert!(!state.running);
    assert!(!state.recording);
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");
}
