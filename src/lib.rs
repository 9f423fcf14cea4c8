//! CUE Generator Library
//!
//! A Rust library for generating CUE type definitions from Kubernetes
//! CustomResourceDefinitions (CRDs). A multi-document YAML file is decoded,
//! the CRD objects are extracted and re-serialized, and the resulting CUE
//! definitions are written into a CUE module's `cue.mod/gen` directory.

pub mod cli;
pub mod crd;
pub mod generator;
pub mod source;
pub mod writer;

pub use crd::{decode_objects, filter_crds, KubernetesObject};
pub use generator::{CueImporter, Importer};
pub use writer::{DefinitionWriter, OutputLayout};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

/// Directory marking a CUE module root.
pub const MODULE_MARKER: &str = "cue.mod";

/// Subdirectory of `cue.mod` holding generated sources.
pub const GEN_DIR: &str = "gen";

/// File name used for every generated definition file.
pub const GENERATED_FILE_NAME: &str = "types_gen.cue";

/// Build the provenance header embedded at the top of every generated file.
///
/// The header marks the file as generated and records the exact command that
/// regenerates it, including the original source file path.
pub fn provenance_header(crd_file: &Path) -> String {
    format!(
        "// Code generated by cue-gen. DO NOT EDIT.\n\n//cue-gen:generate cue-gen import -f {}",
        crd_file.display()
    )
}

/// Orchestrates the import pipeline: validate the module root, load the
/// source file, extract CRDs, generate CUE definitions, and write them to
/// disk in lexicographic key order.
///
/// The schema-to-type generator is injectable so the pipeline can be tested
/// with a stub returning fixed maps or synthetic errors.
pub struct CrdImporter<I: Importer> {
    importer: I,
}

impl CrdImporter<CueImporter> {
    /// Create an importer backed by the built-in CUE generator.
    pub fn new() -> Self {
        Self::with_importer(CueImporter::new())
    }
}

impl Default for CrdImporter<CueImporter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Importer> CrdImporter<I> {
    /// Create an importer backed by a custom generator.
    pub fn with_importer(importer: I) -> Self {
        Self { importer }
    }

    /// Run the whole pipeline against a module root.
    ///
    /// Returns the paths of the written definition files, in the order they
    /// were written. The run aborts on the first error; files written before
    /// a failing stage are not rolled back.
    pub fn run(&self, module_root: &Path, crd_file: &Path) -> Result<Vec<PathBuf>, ImportError> {
        // Make sure we're importing into a CUE module before touching
        // anything else on the filesystem.
        let module_dir = module_root.join(MODULE_MARKER);
        if !module_dir.is_dir() {
            return Err(ImportError::NotAModule {
                path: module_root.to_path_buf(),
            });
        }

        let sources = self.generate_sources(crd_file)?;
        info!("generated {} definition(s)", sources.len());

        let layout = OutputLayout::new(&module_dir.join(GEN_DIR), sources.keys());
        DefinitionWriter::write_all(&layout, &sources)
    }

    /// Compute the generated sources for a CRD file without touching the
    /// module on disk.
    pub fn generate_sources(
        &self,
        crd_file: &Path,
    ) -> Result<BTreeMap<String, Vec<u8>>, ImportError> {
        let data = source::load_source(crd_file)?;

        let objects = decode_objects(&data)?;
        let buffer = filter_crds(&objects)?;

        let header = provenance_header(crd_file);
        self.importer.generate(&buffer, &header)
    }
}

/// Errors produced by the import pipeline.
#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    #[error("cue.mod not found in the module path {path}")]
    NotAModule { path: PathBuf },

    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("parsing CRDs failed: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("generating CUE definitions failed: {0}")]
    Generation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
