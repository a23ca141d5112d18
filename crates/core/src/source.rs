//! Loads source text from disk.

use std::fs;
use std::path::Path;

use crate::errors::{Diagnostic, Reason};

/// Reads the whole file. If it cannot be read, the result is the fatal
/// [Reason::NoSource] diagnostic.
pub fn load_source(path: impl AsRef<Path>) -> Result<Vec<u8>, Diagnostic> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| {
        tracing::warn!(path = %path.display(), error = %e, "failed to open source file");
        Diagnostic::new(Reason::NoSource, 0)
    })
}
