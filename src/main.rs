use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use qserv::cli::{self, Cli};
use qserv::config::{AppState, Config};
use qserv::{logger, server};

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", cli::version_string());
        return ExitCode::SUCCESS;
    }

    if let Some(path) = &cli.generate_config {
        return match Config::default().save(path) {
            Ok(()) => {
                println!("Example configuration written to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let mut cfg = match Config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    cfg.apply_overrides(&cli.overrides());

    let cfg = match cfg.validate() {
        Ok(cfg) => cfg,
        Err(report) => {
            eprintln!("Error: {report}");
            return ExitCode::FAILURE;
        }
    };

    // Keep the guard alive so file output is flushed on exit
    let _log_guard = match logger::init(&cfg.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Create Tokio runtime, thread count from the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers.filter(|w| *w > 0) {
        runtime_builder.worker_threads(workers);
        logger::log_info(&format!("Using {workers} worker threads"));
    }
    let runtime = match runtime_builder.build() {
        Ok(runtime) => runtime,
        Err(e) => {
            logger::log_error(&format!("Failed to start runtime: {e}"));
            return ExitCode::FAILURE;
        }
    };

    let state = Arc::new(AppState::new(cfg));
    match runtime.block_on(server::run(state)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger::log_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
