use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ModelError;

/// Named depth variant selecting the per-stage residual unit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepthVariant {
    R50,
    R101,
    R152,
}

impl DepthVariant {
    /// Residual units in each of the four stages.
    pub fn unit_counts(self) -> [usize; 4] {
        match self {
            DepthVariant::R50 => [3, 4, 6, 3],
            DepthVariant::R101 => [3, 4, 23, 3],
            DepthVariant::R152 => [3, 8, 36, 3],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DepthVariant::R50 => "r50",
            DepthVariant::R101 => "r101",
            DepthVariant::R152 => "r152",
        }
    }
}

impl FromStr for DepthVariant {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r50" => Ok(DepthVariant::R50),
            "r101" => Ok(DepthVariant::R101),
            "r152" => Ok(DepthVariant::R152),
            other => Err(ModelError::config(format!(
                "unknown depth variant '{other}' (expected r50, r101, or r152)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitResNetConfig {
    pub depth: DepthVariant,
    pub width_factor: usize,
    pub num_classes: usize,
    /// Zero-fill the head convolution instead of importing it; required when
    /// fine-tuning to a class count that differs from the checkpoint's.
    #[serde(default)]
    pub zero_head: bool,
}

impl Default for BitResNetConfig {
    fn default() -> Self {
        Self {
            depth: DepthVariant::R50,
            width_factor: 1,
            num_classes: 1000,
            zero_head: false,
        }
    }
}

impl BitResNetConfig {
    /// Rejects structurally impossible configurations before any
    /// construction work happens.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.width_factor == 0 {
            return Err(ModelError::config("width_factor must be positive"));
        }
        if self.num_classes == 0 {
            return Err(ModelError::config("num_classes must be positive"));
        }
        Ok(())
    }
}
