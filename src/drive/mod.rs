mod credentials;
mod jwt;
mod oauth_client;
mod upload;

pub use credentials::ServiceAccountKey;
pub use upload::{DriveError, DriveFile, DriveUploader};

#[cfg(test)]
pub(crate) use jwt::tests::test_key;
