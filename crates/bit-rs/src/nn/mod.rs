//! Neural network building blocks layered on top of the functional kernels.
//!
//! Layers are thin wrappers that own parameters and compose the primitives
//! defined under `ops::functional`, exposing ergonomic `forward` helpers.

pub mod layers;

pub use layers::*;
