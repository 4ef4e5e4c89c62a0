use clap::Parser;
use pgro_cli::commands::{self, check, simulate, validate};
use pgro_cli::{Cli, Commands};
use std::io;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    match &cli.command {
        Commands::Simulate {
            instance,
            config,
            trace_dir,
        } => {
            info!("Simulating cascades for {}", instance.display());
            let config = commands::load_config(config.as_deref())?;
            simulate::handle(instance, config, trace_dir.as_deref(), &mut stdout)?;
        }
        Commands::Check {
            instance,
            candidate,
            config,
            bounded,
        } => {
            info!(
                "Checking candidate {} against {}",
                candidate.display(),
                instance.display()
            );
            let config = commands::load_config(config.as_deref())?;
            check::handle(instance, candidate, config, *bounded, &mut stdout)?;
        }
        Commands::Validate { instance } => {
            let diagnostics = validate::handle(instance, &mut stdout)?;
            if diagnostics.has_errors() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("could not install log subscriber: {err}");
    }

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
