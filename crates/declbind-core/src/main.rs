use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use declbind_core::cli::Cli;
use declbind_core::config::GeneratorConfig;
use declbind_core::indexer::pipeline::run_generation;

fn main() -> ExitCode {
    // Logging is off unless DECLBIND_LOG is set.
    if let Ok(filter) = EnvFilter::try_from_env("DECLBIND_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }

    let cli = Cli::parse();
    let result = GeneratorConfig::load(cli.config.as_deref()).and_then(|config| {
        run_generation(&cli.output_dir, &cli.inputs, cli.list.as_deref(), &config)
    });

    match result {
        Ok(stats) => {
            println!(
                "declbind: {} records from {} inputs -> {} classes, {} functions, {} namespaces; {} files written, {} unchanged ({} ms)",
                stats.records,
                stats.inputs,
                stats.classes,
                stats.functions,
                stats.namespaces,
                stats.written,
                stats.unchanged,
                stats.elapsed_ms
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "generation failed");
            eprintln!("declbind: {e}");
            ExitCode::FAILURE
        }
    }
}
