//! Env-gated timing scopes for forward passes.
//!
//! Set `BITRS_PROFILE=1` to print per-layer wall-clock timings to stderr.
//! When disabled (the default) scopes compile down to a no-op guard.

use std::env;
use std::sync::OnceLock;
use std::time::Instant;

static PROFILE: OnceLock<bool> = OnceLock::new();

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

fn enabled() -> bool {
    *PROFILE.get_or_init(|| match env::var("BITRS_PROFILE") {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}

/// RAII guard that reports elapsed time for a labelled layer on drop.
pub struct LayerScope {
    label: &'static str,
    start: Option<Instant>,
}

/// Opens a timing scope around a layer's forward computation.
pub fn layer_scope(label: &'static str) -> LayerScope {
    let start = enabled().then(Instant::now);
    LayerScope { label, start }
}

impl Drop for LayerScope {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            eprintln!("[bit-rs] {}: {:.3?}", self.label, start.elapsed());
        }
    }
}
