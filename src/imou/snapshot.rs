use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::client::{response_succeeded, ImouClient, ImouError};

const SNAPSHOT_ENDPOINT: &str = "device/snapshot";

/// Cameras with a single sensor expose it as channel 0.
const CHANNEL_ID: &str = "0";

#[derive(Serialize, Debug)]
struct SnapshotParams<'a> {
    token: &'a str,
    #[serde(rename = "deviceId")]
    device_id: &'a str,
    #[serde(rename = "channelId")]
    channel_id: &'a str,
}

impl ImouClient {
    /// Asks the camera for a fresh snapshot and downloads the resulting image.
    pub async fn snapshot(&self, access_token: &str, device_id: &str) -> Result<Vec<u8>, ImouError> {
        if access_token.is_empty() {
            return Err(ImouError::EmptyToken);
        }

        let params = SnapshotParams {
            token: access_token,
            device_id,
            channel_id: CHANNEL_ID,
        };
        let response = self.post(SNAPSHOT_ENDPOINT, params).await?;
        let image_url = extract_snapshot_url(response)?;

        info!("Downloading image from {image_url}");
        let download_error = |source: reqwest::Error| ImouError::Download {
            url: image_url.clone(),
            source,
        };
        let image = self
            .http
            .get(&image_url)
            .timeout(self.download_timeout)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(download_error)?
            .bytes()
            .await
            .map_err(download_error)?;

        Ok(image.to_vec())
    }
}

/// Locates the image URL within a snapshot response.
///
/// It lives either directly under `url`, or in the first entry of `snapshots`.
/// Both are looked up inside `result` when present, and at the top level otherwise.
pub fn extract_snapshot_url(response: Value) -> Result<String, ImouError> {
    if !response_succeeded(&response) {
        return Err(ImouError::SnapshotRejected(response));
    }

    let result = response.get("result").unwrap_or(&response);
    let url = result
        .get("url")
        .or_else(|| {
            result
                .get("snapshots")
                .and_then(|snapshots| snapshots.get(0))
                .and_then(|first| first.get("url"))
        })
        .and_then(Value::as_str)
        .map(str::to_string);

    match url {
        Some(url) => Ok(url),
        None => Err(ImouError::SnapshotUrlMissing(response)),
    }
}
