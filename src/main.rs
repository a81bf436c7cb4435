//! gvmops — operator tooling for a GMP vulnerability-management console.

mod cli;
mod config;
mod delta_mail;
mod error;
mod smtp_probe;
mod sync_assets;

use clap::Parser;
use gvmops_gmp::transport::TlsTransport;
use gvmops_gmp::GmpClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::error::ToolError;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ToolError> {
    match &cli.command {
        Commands::SyncAssets { csv_file } => {
            let mut gmp = connect_console(&cli).await?;
            let summary = sync_assets::run(&mut gmp, csv_file).await?;
            info!(
                "sync finished: {} created, {} already present, {} row(s) skipped",
                summary.created, summary.existing, summary.skipped_rows
            );
            Ok(())
        }
        Commands::DeltaMailer => {
            let settings = config::MailerSettings::from_env()?;
            settings.log_startup();
            let mut gmp = connect_console(&cli).await?;
            let mut mailer = delta_mail::SmtpReportMailer::new(&settings);
            delta_mail::run(&mut gmp, &mut mailer, &settings).await
        }
        Commands::SmtpProbe => {
            let settings = config::SmtpSettings::from_env()?;
            let outcome = smtp_probe::run(&settings).await;
            println!("{}", outcome.message());
            Ok(())
        }
    }
}

async fn connect_console(cli: &Cli) -> Result<GmpClient<TlsTransport>, ToolError> {
    let (username, password) = cli.gmp_credentials()?;
    let mut client = gvmops_gmp::client::connect(&cli.gmp_config()).await?;
    client.authenticate(&username, &password).await?;
    Ok(client)
}
