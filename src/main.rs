mod config;
mod drive;
mod imou;
mod timelapse;

use std::error::Error;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const BANNER: &str = "============================================================";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("{BANNER}");
    println!("IMOU Camera Timelapse - Start");
    println!("{BANNER}");

    match capture().await {
        Ok(()) => {
            println!("{BANNER}");
            println!("Done! The snapshot was uploaded successfully.");
            println!("{BANNER}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{BANNER}");
            eprintln!("ERROR: {err}");
            eprintln!("{BANNER}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            error!("Run failed: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn capture() -> Result<(), timelapse::TimelapseError> {
    let config = Config::from_env()?;
    info!("App ID: {}", config.app_id);
    info!("Device ID: {}", config.device_id);
    info!("Drive folder ID: {}", config.folder_id);

    let file = timelapse::run(&config).await?;
    info!("Stored as {} ({})", file.name, file.id);
    Ok(())
}
