//! Classweave CLI
//!
//! Entry point for the `classweave` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use classweave::{TomlConfigFactory, Weaver};

#[derive(Parser)]
#[command(name = "classweave")]
#[command(about = "Post-compile annotation weaving for JVM class files", version)]
struct Cli {
    /// Build output locations to scan for class files, separated by the
    /// platform path separator
    #[arg(long, short = 'o', value_delimiter = PATH_SEPARATOR, default_value = "target/classes")]
    output_dirs: Vec<PathBuf>,

    /// Location holding the configuration fingerprint marker
    #[arg(long, short = 'm', default_value = "target/test-classes")]
    metadata_dir: PathBuf,

    /// Path to the weave configuration file
    #[arg(long, short = 'c', default_value = ".classweave.toml")]
    config: PathBuf,
}

#[cfg(windows)]
const PATH_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_SEPARATOR: char = ':';

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let weaver = Weaver::new(cli.output_dirs, cli.metadata_dir);
    let factory = TomlConfigFactory::new(cli.config);

    match weaver.run(&factory) {
        Ok(summary) => {
            println!(
                "Woven {changed} of {selected} selected classes ({fields} fields changed, {loaded} loaded)",
                changed = summary.classes_changed,
                selected = summary.classes_selected,
                fields = summary.fields_changed,
                loaded = summary.classes_loaded,
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(e.exit_code());
        }
    }
}
