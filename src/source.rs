//! Source file loading

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::ImportError;

/// Load a CRD source file fully into memory.
///
/// The path must exist and point at a regular file; directories, sockets and
/// other special files are rejected before any read is attempted.
pub fn load_source(path: &Path) -> Result<Vec<u8>, ImportError> {
    let metadata = fs::metadata(path).map_err(|_| ImportError::NotFound {
        path: path.to_path_buf(),
    })?;

    if !metadata.is_file() {
        return Err(ImportError::NotFound {
            path: path.to_path_buf(),
        });
    }

    debug!("loading source file: {:?}", path);
    Ok(fs::read(path)?)
}
