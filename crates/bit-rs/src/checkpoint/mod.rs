pub mod importer;
pub mod saver;
pub mod store;

pub use importer::{load_weights, DEFAULT_PREFIX};
pub use saver::CheckpointSaver;
pub use store::WeightStore;
