use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;

use super::{credentials::ServiceAccountKey, DriveError};

/// Google accepts assertions valid for at most an hour.
const ASSERTION_LIFETIME_MINUTES: i64 = 60;

/// Claims of the self-signed assertion exchanged for an access token.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs an RS256 assertion for `scope` with the service account's private key.
pub fn sign_assertion(key: &ServiceAccountKey, scope: &str) -> Result<String, DriveError> {
    let now = Utc::now();
    let claims = AssertionClaims {
        iss: key.client_email.clone(),
        scope: scope.to_string(),
        aud: key.token_uri.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(ASSERTION_LIFETIME_MINUTES)).timestamp(),
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key =
        EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(DriveError::PrivateKey)?;
    encode(&header, &claims, &encoding_key).map_err(DriveError::PrivateKey)
}
