pub mod results;
pub mod weight_archive;
