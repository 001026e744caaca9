//! Object detection: backend trait, pretrained-model parameters, labels.

mod backend;
pub mod backends;
mod labels;
mod result;

use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use labels::LabelMap;
pub use result::{BoundingBox, Detection};

use crate::AppError;

/// Normalization parameters of the pretrained network, shipped next to the
/// weights as a TOML asset.
///
/// `scale` and `mean` mirror the network's training-time preprocessing:
/// each input value becomes `(pixel - mean[channel]) * scale`. `swap_rb`
/// swaps the red and blue channels before inference, for networks trained on
/// BGR input.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ModelSpec {
    pub input_width: u32,
    pub input_height: u32,
    pub scale: f32,
    pub mean: [f32; 3],
    #[serde(default)]
    pub swap_rb: bool,
}

impl ModelSpec {
    /// Load and validate the model parameters asset. An absent or unreadable
    /// file is [`AppError::MissingAsset`].
    pub fn load(path: &Path) -> Result<Self> {
        let missing = || AppError::MissingAsset {
            path: path.to_path_buf(),
        };
        let raw = std::fs::read_to_string(path).map_err(|_| missing())?;
        let spec: ModelSpec = toml::from_str(&raw).map_err(|err| {
            log::error!("model parameters {} are invalid: {}", path.display(), err);
            missing()
        })?;
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        if self.input_width == 0 || self.input_height == 0 {
            return Err(anyhow!("model input dimensions must be non-zero"));
        }
        Ok(())
    }
}

/// Build the configured detector backend.
///
/// The weights file is loaded once here; a backend is never rebuilt at
/// runtime.
pub fn build_backend(
    name: &str,
    weights: &Path,
    spec: &ModelSpec,
) -> Result<Box<dyn DetectorBackend>> {
    match name {
        "stub" => Ok(Box::new(StubBackend::new())),
        #[cfg(feature = "backend-tract")]
        "tract" => Ok(Box::new(TractBackend::new(weights, spec.clone())?)),
        #[cfg(not(feature = "backend-tract"))]
        "tract" => {
            let _ = (weights, spec);
            Err(anyhow!(
                "detector backend 'tract' is not compiled in (enable the backend-tract feature)"
            ))
        }
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn model_spec_loads_from_toml() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "input_width = 320\ninput_height = 320\nscale = 0.00784313725\nmean = [127.5, 127.5, 127.5]\n"
        )?;

        let spec = ModelSpec::load(file.path())?;
        assert_eq!(spec.input_width, 320);
        assert!(!spec.swap_rb);
        Ok(())
    }

    #[test]
    fn missing_model_spec_is_a_missing_asset() {
        let err = ModelSpec::load(Path::new("/nonexistent/detector.toml")).unwrap_err();
        assert!(matches!(
            AppError::classify(&err),
            Some(AppError::MissingAsset { .. })
        ));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let spec = ModelSpec {
            input_width: 320,
            input_height: 320,
            scale: 1.0,
            mean: [0.0; 3],
            swap_rb: false,
        };
        assert!(build_backend("nope", Path::new("w.onnx"), &spec).is_err());
    }
}
