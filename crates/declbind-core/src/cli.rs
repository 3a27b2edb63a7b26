//! Command-line arguments for the `declbind` binary.

use std::path::PathBuf;

use clap::Parser;

/// Declaration-to-binding compiler.
///
/// Reads declaration batches (JSON) and writes CPython glue fragments and a
/// signature catalog into OUTPUT_DIR. Directories given as inputs are
/// searched for `*.json` files.
#[derive(Parser, Debug)]
#[command(name = "declbind")]
#[command(version)]
#[command(about = "Generate CPython binding glue from declaration records")]
pub struct Cli {
    /// Directory receiving the generated files
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Declaration batch files or directories
    #[arg(value_name = "INPUTS")]
    pub inputs: Vec<PathBuf>,

    /// File listing one input path per line
    #[arg(long, value_name = "FILE")]
    pub list: Option<PathBuf>,

    /// Generator configuration (JSON)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
