use serde_json::{json, Value};
use tracing::info;

use super::client::{response_succeeded, ImouClient, ImouError};

/// The endpoint issuing short-lived access tokens.
const ACCESS_TOKEN_ENDPOINT: &str = "accessToken";

/// How much of the token is safe to show in logs.
const TOKEN_LOG_PREFIX: usize = 20;

impl ImouClient {
    /// Obtains an access token, valid for the remainder of this run.
    pub async fn access_token(&self) -> Result<String, ImouError> {
        let response = self.post(ACCESS_TOKEN_ENDPOINT, json!({})).await?;
        let token = extract_access_token(response)?;

        let shown: String = token.chars().take(TOKEN_LOG_PREFIX).collect();
        info!("Obtained access token {shown}...");
        Ok(token)
    }
}

/// Pulls the access token out of a token response.
///
/// The token has been observed both under `result.accessToken` and at the top level.
pub fn extract_access_token(response: Value) -> Result<String, ImouError> {
    if !response_succeeded(&response) {
        return Err(ImouError::TokenRejected(response));
    }

    let token = response
        .get("result")
        .and_then(|result| result.get("accessToken"))
        .or_else(|| response.get("accessToken"))
        .and_then(Value::as_str)
        .map(str::to_string);

    match token {
        Some(token) => Ok(token),
        None => Err(ImouError::TokenMissing(response)),
    }
}
