//! Flat string-keyed tensor store backing checkpoint import.

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

use crate::error::ModelError;
use crate::io::weight_archive;
use crate::tensor::Tensor;

/// Immutable mapping from '/'-delimited keys to tensors, produced by an
/// external training pipeline. The importer only ever reads it.
#[derive(Debug, Default, Clone)]
pub struct WeightStore {
    tensors: HashMap<String, Tensor>,
}

impl WeightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tensors(tensors: HashMap<String, Tensor>) -> Self {
        Self { tensors }
    }

    /// Loads an archive wholesale into memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut tensors = HashMap::new();
        for (name, tensor) in weight_archive::read_archive(path)? {
            tensors.insert(name, tensor);
        }
        Ok(Self { tensors })
    }

    pub fn insert(&mut self, key: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(key.into(), tensor);
    }

    /// Looks a key up, failing loudly on a miss: a checkpoint is assumed
    /// complete, and a silent default would leave garbage parameters behind.
    pub fn get(&self, key: &str) -> Result<&Tensor> {
        self.tensors
            .get(key)
            .ok_or_else(|| ModelError::CheckpointKey(key.to_string()).into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.tensors.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }
}
