extern crate self as bit_rs;

pub mod checkpoint;
pub mod error;
pub mod io;
pub mod layout;
pub mod model;
pub mod module;
pub mod nn;
pub mod ops;
pub mod profiling;
pub mod tensor;
pub mod train;

pub use error::ModelError;
pub use model::{BitResNet, BitResNetConfig, DepthVariant};
pub use tensor::{Shape, Tensor};
