use chrono::Utc;
use reqwest::header;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::sign::{RequestEnvelope, SystemParams};

/// Upper bound on the image download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Possible errors while talking to the IMOU open API.
#[derive(Debug, thiserror::Error)]
pub enum ImouError {
    #[error("request to {endpoint} failed")]
    Reqwest {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned a body that is not JSON: {body}")]
    Parse {
        endpoint: String,
        body: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("token request failed: {0}")]
    TokenRejected(Value),
    #[error("access token missing from response: {0}")]
    TokenMissing(Value),
    #[error("an access token is required to request a snapshot")]
    EmptyToken,
    #[error("snapshot request failed: {0}")]
    SnapshotRejected(Value),
    #[error("snapshot url missing from response: {0}")]
    SnapshotUrlMissing(Value),
    #[error("downloading the snapshot from {url} failed")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A signed client for the IMOU open API.
#[derive(Debug, Clone)]
pub struct ImouClient {
    pub(super) http: reqwest::Client,
    /// The API root, e.g. `https://openapi.easy4ip.com/openapi`.
    base_url: String,
    app_id: String,
    app_secret: String,
    pub(super) download_timeout: Duration,
}

impl ImouClient {
    pub fn new(http: reqwest::Client, base_url: &str, app_id: &str, app_secret: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
            download_timeout: DOWNLOAD_TIMEOUT,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_download_timeout(mut self, download_timeout: Duration) -> Self {
        self.download_timeout = download_timeout;
        self
    }

    /// Signs `params` into a fresh envelope and POSTs it to the given endpoint.
    ///
    /// The vendor reports failures through `code` rather than the HTTP status,
    /// so only the body is inspected; callers decide what counts as success.
    pub async fn post<P: Serialize>(&self, endpoint: &str, params: P) -> Result<Value, ImouError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let envelope = RequestEnvelope {
            system: SystemParams::new(&self.app_id, &self.app_secret, Utc::now().timestamp_millis()),
            params,
        };

        info!("Requesting {endpoint} from {url}");
        let response = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&envelope)
            .send()
            .await
            .map_err(|source| ImouError::Reqwest {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let body = response.text().await.map_err(|source| ImouError::Reqwest {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let value: Value = serde_json::from_str(&body).map_err(|source| ImouError::Parse {
            endpoint: endpoint.to_string(),
            body: body.clone(),
            source,
        })?;
        debug!(
            "{endpoint} response: {}",
            serde_json::to_string_pretty(&value).unwrap_or(body)
        );

        Ok(value)
    }
}

/// Whether the vendor marked this response as successful.
/// The `code` may sit at the top level or inside `result`.
pub fn response_succeeded(value: &Value) -> bool {
    let is_zero = |code: Option<&Value>| code.and_then(Value::as_str) == Some("0");
    is_zero(value.get("code")) || is_zero(value.get("result").and_then(|result| result.get("code")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn success_code_is_found_in_either_shape() {
        assert!(response_succeeded(&json!({ "code": "0" })));
        assert!(response_succeeded(&json!({ "result": { "code": "0" } })));
    }

    #[test]
    fn other_codes_are_failures() {
        assert!(!response_succeeded(&json!({ "code": "TK1002" })));
        assert!(!response_succeeded(&json!({ "result": { "code": "SN1001" } })));
        assert!(!response_succeeded(&json!({ "code": 0 })));
        assert!(!response_succeeded(&json!({})));
    }

    #[tokio::test]
    async fn post_sends_signed_envelope() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openapi/accessToken")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "system": { "ver": "1.0", "appId": "app-id" },
                "params": {},
            })))
            .with_status(200)
            .with_body(r#"{"code":"0"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = ImouClient::new(
            reqwest::Client::new(),
            &format!("{}/openapi/", server.url()),
            "app-id",
            "s3cr3t",
        );
        let value = client.post("accessToken", json!({})).await.unwrap();

        assert_eq!(value, json!({ "code": "0" }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_json_body_is_reported_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/accessToken")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let client = ImouClient::new(reqwest::Client::new(), &server.url(), "app-id", "s3cr3t");
        let error = client.post("accessToken", json!({})).await.unwrap_err();

        assert!(matches!(error, ImouError::Parse { ref body, .. } if body == "Bad Gateway"));
    }
}
