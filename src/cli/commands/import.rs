//! Import command implementation

use anyhow::Result;
use clap::{ArgMatches, Command};
use std::path::PathBuf;
use tracing::info;

use crate::CrdImporter;

pub fn command() -> Command {
    Command::new("import")
        .about("Generate CUE definitions from Kubernetes CRDs")
        .after_help(
            "Example:\n  # generate CUE definitions from a local YAML file\n  cue-gen import -f crds.yaml\n",
        )
        .arg(
            clap::Arg::new("module")
                .help("Path to the CUE module root")
                .value_name("MODULE_PATH")
                .default_value("."),
        )
        .arg(
            clap::Arg::new("file")
                .short('f')
                .long("file")
                .help("The path to Kubernetes CRD YAML")
                .value_name("FILE")
                .required(true),
        )
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let module_root = PathBuf::from(matches.get_one::<String>("module").unwrap());
    let crd_file = PathBuf::from(matches.get_one::<String>("file").unwrap());

    info!("importing CRDs from {:?}", crd_file);

    let importer = CrdImporter::new();
    let written = importer.run(&module_root, &crd_file)?;

    println!("Import completed successfully!");
    println!("Definition files written: {}", written.len());

    Ok(())
}
