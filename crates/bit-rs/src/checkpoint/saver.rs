//! Persists a model's parameter set keyed by experiment name.

use anyhow::Result;
use std::path::Path;

use crate::io::weight_archive;
use crate::model::BitResNet;
use crate::tensor::Tensor;

pub struct CheckpointSaver;

impl CheckpointSaver {
    /// Writes every parameter under `{experiment}/{param_path}`.
    pub fn save(path: impl AsRef<Path>, experiment: &str, model: &BitResNet) -> Result<()> {
        let mut entries: Vec<(String, Tensor)> = Vec::new();
        model.for_each_parameter(|name, tensor| {
            entries.push((format!("{experiment}/{name}"), tensor.clone()));
            Ok(())
        })?;
        weight_archive::write_archive(path, &entries)
    }
}
