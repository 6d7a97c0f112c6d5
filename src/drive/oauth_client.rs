use serde::Deserialize;
use tracing::debug;

use super::{credentials::ServiceAccountKey, jwt, DriveError};

/// Grant type for exchanging a self-signed assertion (RFC 7523).
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchanges a signed assertion for a bearer token limited to `scope`.
pub async fn obtain_access_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    scope: &str,
) -> Result<String, DriveError> {
    let assertion = jwt::sign_assertion(key, scope)?;

    debug!("Exchanging assertion for {} at {}", key.client_email, key.token_uri);
    let result = http
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(DriveError::Reqwest)?;

    let status = result.status();
    let response_text = result.text().await.map_err(DriveError::Reqwest)?;
    if !status.is_success() {
        return Err(DriveError::TokenExchange {
            status,
            body: response_text,
        });
    }

    let body: TokenResponse = serde_json::from_str(&response_text).map_err(|source| DriveError::Parse {
        body: response_text.clone(),
        source,
    })?;
    Ok(body.access_token)
}
