//! Deterministic materialization of generated definitions

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::{ImportError, GENERATED_FILE_NAME};

/// The on-disk layout for one generator invocation: a mapping from
/// generation key to the definition file path under the gen root.
///
/// Computing the layout touches nothing on disk; applying it is the
/// writer's job. Entries are held in strict lexicographic key order so
/// directory creation and progress reporting are reproducible.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    entries: Vec<(String, PathBuf)>,
}

impl OutputLayout {
    /// Compute the layout for a set of generation keys.
    pub fn new<'a>(gen_root: &Path, keys: impl IntoIterator<Item = &'a String>) -> Self {
        let mut entries: Vec<(String, PathBuf)> = keys
            .into_iter()
            .map(|key| (key.clone(), gen_root.join(key).join(GENERATED_FILE_NAME)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        Self { entries }
    }

    /// The layout entries, in ascending key order.
    pub fn entries(&self) -> &[(String, PathBuf)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Writes generated sources to their layout paths.
pub struct DefinitionWriter;

impl DefinitionWriter {
    /// Apply a layout to the filesystem.
    ///
    /// For each key in layout order: create the target directory (and any
    /// missing parents), then write the definition file, truncating any
    /// prior content. The first failure aborts further writes; files
    /// already written remain on disk. Every layout key must have a
    /// matching source; a divergence is an error.
    pub fn write_all(
        layout: &OutputLayout,
        sources: &BTreeMap<String, Vec<u8>>,
    ) -> Result<Vec<PathBuf>, ImportError> {
        let mut written = Vec::with_capacity(layout.len());

        for (key, path) in layout.entries() {
            let data = sources.get(key).ok_or_else(|| {
                ImportError::Generation(format!("no generated source for key {key}"))
            })?;

            info!("generating: {}", key);

            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(path, data)?;

            written.push(path.clone());
        }

        Ok(written)
    }
}
