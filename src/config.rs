//! Configuration for the spotter binaries.
//!
//! Settings come from three layers: built-in defaults, an optional TOML file
//! (path in `SPOTTER_CONFIG`), and environment overrides.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::record::SinkSettings;

const DEFAULT_DEVICE_PREFIX: &str = "/dev/video";
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;
const DEFAULT_CAPTURE_FPS: u32 = 20;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_ASSET_DIR: &str = "assets";
const DEFAULT_LABEL_FILE: &str = "coco.names";
const DEFAULT_WEIGHTS_FILE: &str = "detector.onnx";
const DEFAULT_MODEL_PARAMS_FILE: &str = "detector.toml";
const DEFAULT_SAMPLE_IMAGE_FILE: &str = "sample.png";
const DEFAULT_FONT_FILE: &str = "DejaVuSans.ttf";

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    assets: Option<AssetConfigFile>,
    recording: Option<RecordingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device_prefix: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AssetConfigFile {
    dir: Option<PathBuf>,
    labels: Option<String>,
    weights: Option<String>,
    model_params: Option<String>,
    sample_image: Option<String>,
    font: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RecordingConfigFile {
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    jpeg_quality: Option<u8>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub assets: AssetSettings,
    pub recording: SinkSettings,
}

/// Camera defaults. `device_prefix` is completed with the camera index from
/// the UI ("/dev/video" + "0"); a `stub://` prefix selects the synthetic
/// source as-is.
#[derive(Clone, Debug)]
pub struct CameraSettings {
    pub device_prefix: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device_prefix: DEFAULT_DEVICE_PREFIX.to_string(),
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            target_fps: DEFAULT_CAPTURE_FPS,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DetectorSettings {
    pub backend: String,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
        }
    }
}

/// Startup asset locations, resolved against `dir`.
#[derive(Clone, Debug)]
pub struct AssetSettings {
    pub dir: PathBuf,
    pub labels: String,
    pub weights: String,
    pub model_params: String,
    pub sample_image: String,
    pub font: String,
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_ASSET_DIR),
            labels: DEFAULT_LABEL_FILE.to_string(),
            weights: DEFAULT_WEIGHTS_FILE.to_string(),
            model_params: DEFAULT_MODEL_PARAMS_FILE.to_string(),
            sample_image: DEFAULT_SAMPLE_IMAGE_FILE.to_string(),
            font: DEFAULT_FONT_FILE.to_string(),
        }
    }
}

impl AssetSettings {
    pub fn labels_path(&self) -> PathBuf {
        self.dir.join(&self.labels)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(&self.weights)
    }

    pub fn model_params_path(&self) -> PathBuf {
        self.dir.join(&self.model_params)
    }

    pub fn sample_image_path(&self) -> PathBuf {
        self.dir.join(&self.sample_image)
    }

    pub fn font_path(&self) -> PathBuf {
        self.dir.join(&self.font)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            detector: DetectorSettings::default(),
            assets: AssetSettings::default(),
            recording: SinkSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `SPOTTER_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SPOTTER_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like [`AppConfig::load`], with an explicit file path taking precedence
    /// over `SPOTTER_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => match std::env::var("SPOTTER_CONFIG") {
                Ok(path) => read_config_file(Path::new(&path))?,
                Err(_) => AppConfigFile::default(),
            },
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let mut cfg = Self::default();
        if let Some(camera) = file.camera {
            if let Some(prefix) = camera.device_prefix {
                cfg.camera.device_prefix = prefix;
            }
            if let Some(width) = camera.width {
                cfg.camera.width = width;
            }
            if let Some(height) = camera.height {
                cfg.camera.height = height;
            }
            if let Some(fps) = camera.target_fps {
                cfg.camera.target_fps = fps;
            }
        }
        if let Some(detector) = file.detector {
            if let Some(backend) = detector.backend {
                cfg.detector.backend = backend;
            }
        }
        if let Some(assets) = file.assets {
            if let Some(dir) = assets.dir {
                cfg.assets.dir = dir;
            }
            if let Some(labels) = assets.labels {
                cfg.assets.labels = labels;
            }
            if let Some(weights) = assets.weights {
                cfg.assets.weights = weights;
            }
            if let Some(model_params) = assets.model_params {
                cfg.assets.model_params = model_params;
            }
            if let Some(sample_image) = assets.sample_image {
                cfg.assets.sample_image = sample_image;
            }
            if let Some(font) = assets.font {
                cfg.assets.font = font;
            }
        }
        if let Some(recording) = file.recording {
            if let Some(fps) = recording.fps {
                cfg.recording.fps = fps;
            }
            if let Some(width) = recording.width {
                cfg.recording.width = width;
            }
            if let Some(height) = recording.height {
                cfg.recording.height = height;
            }
            if let Some(quality) = recording.jpeg_quality {
                cfg.recording.jpeg_quality = quality;
            }
        }
        cfg
    }

    fn apply_env(&mut self) {
        if let Ok(prefix) = std::env::var("SPOTTER_DEVICE_PREFIX") {
            if !prefix.trim().is_empty() {
                self.camera.device_prefix = prefix;
            }
        }
        if let Ok(dir) = std::env::var("SPOTTER_ASSET_DIR") {
            if !dir.trim().is_empty() {
                self.assets.dir = PathBuf::from(dir);
            }
        }
        if let Ok(backend) = std::env::var("SPOTTER_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera frame dimensions must be non-zero"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be non-zero"));
        }
        if self.recording.fps == 0 || self.recording.width == 0 || self.recording.height == 0 {
            return Err(anyhow!("recording dimensions and fps must be non-zero"));
        }
        if !(1..=100).contains(&self.recording.jpeg_quality) {
            return Err(anyhow!("recording jpeg_quality must be in 1..=100"));
        }
        if !matches!(self.detector.backend.as_str(), "stub" | "tract") {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected 'stub' or 'tract')",
                self.detector.backend
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
