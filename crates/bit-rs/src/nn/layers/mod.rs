//! Layers used by residual image classifiers.

pub mod conv;
pub mod group_norm;

pub use conv::{Conv2d, StdConv2d};
pub use group_norm::GroupNorm;
