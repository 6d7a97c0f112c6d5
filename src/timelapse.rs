use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use tracing::info;

use crate::{
    config::{Config, ConfigError},
    drive::{DriveError, DriveFile, DriveUploader, ServiceAccountKey},
    imou::{ImouClient, ImouError},
};

/// Any failure that aborts a run.
#[derive(Debug, thiserror::Error)]
pub enum TimelapseError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to set up the HTTP client")]
    HttpClient(#[source] reqwest::Error),
    #[error(transparent)]
    Imou(#[from] ImouError),
    #[error(transparent)]
    Drive(#[from] DriveError),
}

/// Names a snapshot after the minute it was taken, e.g. `timelapse_2024-05-01_14-07.jpg`.
pub fn snapshot_filename<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("timelapse_{}.jpg", at.format("%Y-%m-%d_%H-%M"))
}

/// Captures one snapshot and uploads it, stamped with the local time.
pub async fn run(config: &Config) -> Result<DriveFile, TimelapseError> {
    run_with_clock(config, Local::now).await
}

async fn run_with_clock<Tz, C>(config: &Config, clock: C) -> Result<DriveFile, TimelapseError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
    C: Fn() -> DateTime<Tz>,
{
    let http = reqwest::Client::builder()
        .user_agent(concat!("imou-timelapse/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(TimelapseError::HttpClient)?;

    // Parse the service account up front so a broken document fails before we touch the camera.
    let key = ServiceAccountKey::from_json(&config.credentials_json)?;

    let camera = ImouClient::new(
        http.clone(),
        config.imou_api_url.as_str(),
        &config.app_id,
        &config.app_secret,
    );

    info!("[1/3] Obtaining IMOU access token...");
    let access_token = camera.access_token().await?;

    info!("[2/3] Downloading snapshot from camera {}...", config.device_id);
    let image = camera.snapshot(&access_token, &config.device_id).await?;
    info!("Snapshot downloaded ({} bytes)", image.len());

    let filename = snapshot_filename(&clock());
    info!("[3/3] Uploading '{filename}' to Google Drive...");
    let uploader = DriveUploader::new(
        http,
        key,
        &config.folder_id,
        config.drive_upload_url.clone(),
        config.scratch_dir.clone(),
    );
    Ok(uploader.upload(&image, &filename).await?)
}
