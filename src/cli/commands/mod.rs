//! CLI subcommands

pub mod import;
