//! Persistence of final evaluation results.
//!
//! A flat JSON document mapping dataset name to test accuracy, maintained
//! read-modify-write with last-write-wins semantics per key.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Reads the results document, returning an empty map when none exists yet.
pub fn read_results(path: impl AsRef<Path>) -> Result<BTreeMap<String, f32>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Records the final accuracy for `dataset`, overwriting any previous entry.
pub fn record_accuracy(path: impl AsRef<Path>, dataset: &str, accuracy: f32) -> Result<()> {
    let path = path.as_ref();
    let mut results = read_results(path)?;
    results.insert(dataset.to_string(), accuracy);
    fs::write(path, serde_json::to_string_pretty(&results)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins_per_dataset() {
        let path = std::env::temp_dir().join(format!("bit-rs-results-{}.json", std::process::id()));
        let _ = fs::remove_file(&path);

        assert!(read_results(&path).unwrap().is_empty());
        record_accuracy(&path, "cifar10", 0.971).unwrap();
        record_accuracy(&path, "cifar100", 0.862).unwrap();
        record_accuracy(&path, "cifar10", 0.978).unwrap();

        let results = read_results(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results["cifar10"], 0.978);
        assert_eq!(results["cifar100"], 0.862);
    }
}
