use serde::Deserialize;

use super::DriveError;

/// The fields we need from a Google service account key document.
///
/// The document carries more (project ID, client ID, certificate URLs),
/// none of which matter for minting access tokens.
#[derive(Deserialize, Clone)]
pub struct ServiceAccountKey {
    pub client_email: String,
    /// PEM-encoded PKCS#8 RSA private key.
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// Where signed assertions are exchanged for access tokens.
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_json(contents: &str) -> Result<Self, DriveError> {
        serde_json::from_str(contents).map_err(DriveError::InvalidCredentials)
    }
}

// The private key must never end up in logs.
impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}
