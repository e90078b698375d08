//! Eager functional operators over host tensors.
//!
//! All kernels consume and produce NCHW activations and OIHW convolution
//! weights. Each entry point validates its inputs up front and computes the
//! result in one pass; no state is retained between calls.

pub mod activation;
pub mod conv;
pub mod normalization;
pub mod pooling;
pub mod shape;

pub use activation::relu;
pub use conv::{conv2d, Conv2dParams2d, Padding2d};
pub use normalization::group_norm;
pub use pooling::{global_avg_pool2d, max_pool2d};
pub use shape::pad2d;
