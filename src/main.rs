use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;

use clap::Parser;

use trafmon_service::config::Config;
use trafmon_service::logging::{self, DataSource};
use trafmon_service::scheduler::Scheduler;
use trafmon_service::storage;
use trafmon_service::verify;

#[derive(Parser, Debug)]
#[command(
    name = "trafmon_service",
    version,
    about = "Scheduled TomTom traffic collector",
    after_help = "The TOMTOM_API_KEY environment variable must always be set."
)]
struct Args {
    /// Configuration file (defaults to ./config.toml when present)
    config: Option<PathBuf>,
    /// Probe the configured endpoints and exit
    #[arg(long)]
    verify: bool,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let args = Args::parse();

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Startup error: {}", e);
            return ExitCode::from(1);
        }
    };

    logging::init_logger(
        config.log_level(),
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    );

    if args.verify {
        run_verify(&config)
    } else {
        run_collector(config)
    }
}

fn run_verify(config: &Config) -> ExitCode {
    match verify::run_verification(config) {
        Ok(report) => {
            verify::print_summary(&report);
            if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("Verification could not run: {}", e);
            ExitCode::from(1)
        }
    }
}

fn run_collector(config: Config) -> ExitCode {
    // Output directories must exist before the first fetch needs them.
    for dir in [&config.incidents.output_dir, &config.flow.output_dir] {
        if let Err(e) = storage::ensure_dir(Path::new(dir)) {
            logging::error(
                DataSource::Storage,
                Some(dir),
                &format!("Cannot create output directory: {}", e),
            );
            return ExitCode::from(1);
        }
    }

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let handler_result = ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    });
    if let Err(e) = handler_result {
        logging::error(
            DataSource::System,
            None,
            &format!("Cannot install interrupt handler: {}", e),
        );
        return ExitCode::from(1);
    }

    let mut scheduler = match Scheduler::new(config) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            logging::error(
                DataSource::System,
                None,
                &format!("Cannot build HTTP client: {}", e),
            );
            return ExitCode::from(1);
        }
    };

    match scheduler.run(&shutdown_rx) {
        Ok(()) => {
            logging::info(DataSource::System, None, "Interrupted, shutting down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            logging::error(DataSource::System, None, &format!("Collector stopped: {}", e));
            ExitCode::from(1)
        }
    }
}
