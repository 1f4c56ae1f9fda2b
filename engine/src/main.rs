// safras: compares cohort metrics of two spreadsheets and writes a dashboard
use anyhow::Context;
use clap::Parser;
use engine::cli::{run, Cli};
use engine::logging::{init_logging, LogConfig};
use std::io::Write;
use tracing::info;

fn main() {
    let cli = Cli::parse();
    let log_config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        use_env_filter: !cli.verbosity.is_present(),
        ..LogConfig::default()
    };
    if let Err(err) = init_logging(&log_config) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    if let Err(err) = execute(&cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn execute(cli: &Cli) -> anyhow::Result<()> {
    let document = run(cli)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, &document)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(output = %path.display(), bytes = document.len(), "Dashboard written");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(document.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
