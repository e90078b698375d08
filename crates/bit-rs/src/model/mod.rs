pub mod bit_resnet;
pub mod config;

pub use bit_resnet::{BitResNet, PreActBottleneck, NORM_GROUPS};
pub use config::{BitResNetConfig, DepthVariant};
