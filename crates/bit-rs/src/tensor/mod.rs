//! Host tensor abstractions shared across layers and models.
//!
//! Everything in this crate runs eagerly on the CPU over `f32` data, so the
//! tensor module stays small: a shape wrapper plus a host-backed tensor that
//! owns its values.

mod host_tensor;
pub mod shape;

pub use host_tensor::Tensor;
pub use shape::Shape;
