//! Class label list, loaded once at startup.

use std::path::Path;

use anyhow::Result;

use crate::AppError;

/// The model's class names, one per line in the label asset.
///
/// The pretrained network emits 1-based class ids while the list is 0-based,
/// so id `n` maps to line `n - 1`. That convention comes with the model and
/// must not be "fixed" here.
#[derive(Clone, Debug)]
pub struct LabelMap {
    names: Vec<String>,
}

impl LabelMap {
    /// Load the label asset. An absent or unreadable file is
    /// [`AppError::MissingAsset`].
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|_| AppError::MissingAsset {
            path: path.to_path_buf(),
        })?;
        Ok(Self::from_lines(&raw))
    }

    pub fn from_names<S: Into<String>>(names: Vec<S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    fn from_lines(raw: &str) -> Self {
        let names = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { names }
    }

    /// Resolve a 1-based class id. Background (id 0) and out-of-range ids
    /// resolve to `None`.
    pub fn name(&self, class_id: usize) -> Option<&str> {
        class_id
            .checked_sub(1)
            .and_then(|index| self.names.get(index))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
