// src/engine/common.rs
//
// Common utilities shared across engine modules.

use crate::error::{BitmapError, Result};
use std::panic::{self, AssertUnwindSafe};

/// Run a codec call, converting a panic inside it into `InternalPanic`.
///
/// Encoders and decoders are external capabilities; a panic in one must not
/// unwind through the optimization loop (the pooled surface is still released
/// by its guard either way).
pub fn run_with_panic_policy<T>(stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            tracing::warn!(stage, %message, "codec panicked");
            Err(BitmapError::internal_panic(format!("{stage}: {message}")))
        }
    }
}
