use std::sync::Mutex;

use tempfile::NamedTempFile;

use spotter::config::AppConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SPOTTER_CONFIG",
        "SPOTTER_DEVICE_PREFIX",
        "SPOTTER_ASSET_DIR",
        "SPOTTER_BACKEND",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        [camera]
        device_prefix = "stub://bench"
        width = 800
        height = 600
        target_fps = 30

        [detector]
        backend = "stub"

        [assets]
        dir = "fixtures"
        labels = "classes.txt"

        [recording]
        fps = 25
        jpeg_quality = 90
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("SPOTTER_CONFIG", file.path());
    std::env::set_var("SPOTTER_DEVICE_PREFIX", "/dev/video");

    let cfg = AppConfig::load().expect("load config");

    // Env beats file.
    assert_eq!(cfg.camera.device_prefix, "/dev/video");
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 600);
    assert_eq!(cfg.camera.target_fps, 30);
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.assets.labels_path(), std::path::Path::new("fixtures/classes.txt"));
    // Unset file keys keep their defaults.
    assert_eq!(cfg.assets.weights_path(), std::path::Path::new("fixtures/detector.onnx"));
    assert_eq!(cfg.recording.fps, 25);
    assert_eq!(cfg.recording.jpeg_quality, 90);
    assert_eq!(cfg.recording.width, 640);

    clear_env();
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AppConfig::load().expect("load defaults");

    assert_eq!(cfg.camera.device_prefix, "/dev/video");
    assert_eq!(cfg.camera.width, 640);
    assert_eq!(cfg.camera.height, 480);
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.recording.fps, 20);

    clear_env();
}

#[test]
fn invalid_dimensions_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"[camera]\nwidth = 0\n").expect("write config");
    std::env::set_var("SPOTTER_CONFIG", file.path());

    assert!(AppConfig::load().is_err());

    clear_env();
}

#[test]
fn unknown_backend_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SPOTTER_BACKEND", "cloud");
    assert!(AppConfig::load().is_err());

    clear_env();
}
