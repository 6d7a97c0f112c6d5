use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use url::Url;

use super::{credentials::ServiceAccountKey, oauth_client};

/// Only allows touching files this application created.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Every snapshot is stored as a JPEG.
const IMAGE_MIME_TYPE: &str = "image/jpeg";

/// Fields requested back from the create call.
const RESPONSE_FIELDS: &str = "id,name,webViewLink";

/// Possible errors while uploading to Google Drive.
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("credential document is invalid: {0}")]
    InvalidCredentials(#[source] serde_json::Error),
    #[error("service account private key is unusable")]
    PrivateKey(#[source] jsonwebtoken::errors::Error),
    #[error("request to Google failed")]
    Reqwest(#[source] reqwest::Error),
    #[error("token exchange failed with {status}: {body}")]
    TokenExchange { status: StatusCode, body: String },
    #[error("unexpected response from Google: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("file metadata could not be encoded")]
    Metadata(#[source] serde_json::Error),
    #[error("upload failed with {status}: {body}")]
    Upload { status: StatusCode, body: String },
    #[error("temporary file handling failed")]
    TempFile(#[source] std::io::Error),
    #[error("refusing to upload an empty image")]
    EmptyImage,
    #[error("a filename is required for the upload")]
    EmptyFilename,
}

/// The file record Drive hands back once an upload completes.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "webViewLink")]
    pub web_view_link: Option<String>,
}

#[derive(Serialize)]
struct FileMetadata<'a> {
    name: &'a str,
    parents: [&'a str; 1],
}

/// Uploads snapshots into a single Drive folder as a service account.
#[derive(Debug)]
pub struct DriveUploader {
    http: reqwest::Client,
    key: ServiceAccountKey,
    folder_id: String,
    upload_url: Url,
    /// Parent of the per-upload temporary directory.
    scratch_root: PathBuf,
}

impl DriveUploader {
    pub fn new(
        http: reqwest::Client,
        key: ServiceAccountKey,
        folder_id: &str,
        upload_url: Url,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            http,
            key,
            folder_id: folder_id.to_string(),
            upload_url,
            scratch_root,
        }
    }

    /// Stores `image` in the target folder under `filename`.
    ///
    /// The image is staged in a temporary directory that is removed when this
    /// returns, whether or not the upload succeeded.
    pub async fn upload(&self, image: &[u8], filename: &str) -> Result<DriveFile, DriveError> {
        if image.is_empty() {
            return Err(DriveError::EmptyImage);
        }
        if filename.is_empty() {
            return Err(DriveError::EmptyFilename);
        }

        let access_token =
            oauth_client::obtain_access_token(&self.http, &self.key, DRIVE_FILE_SCOPE).await?;

        let staging = tempfile::Builder::new()
            .prefix("imou-timelapse-")
            .tempdir_in(&self.scratch_root)
            .map_err(DriveError::TempFile)?;
        let staged_path = staging.path().join(filename);
        tokio::fs::write(&staged_path, image)
            .await
            .map_err(DriveError::TempFile)?;
        info!("Image saved temporarily to {}", staged_path.display());
        info!("Image size: {} bytes", image.len());

        let metadata = FileMetadata {
            name: filename,
            parents: [self.folder_id.as_str()],
        };
        let contents = tokio::fs::read(&staged_path)
            .await
            .map_err(DriveError::TempFile)?;
        let boundary = format!("imou-timelapse-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata, &contents)?;

        let mut url = self.upload_url.clone();
        url.query_pairs_mut()
            .append_pair("uploadType", "multipart")
            .append_pair("fields", RESPONSE_FIELDS);

        info!("Uploading to Google Drive folder {}", self.folder_id);
        let result = self
            .http
            .post(url)
            .bearer_auth(&access_token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(DriveError::Reqwest)?;

        let status = result.status();
        let response_text = result.text().await.map_err(DriveError::Reqwest)?;
        if !status.is_success() {
            return Err(DriveError::Upload {
                status,
                body: response_text,
            });
        }

        let file: DriveFile =
            serde_json::from_str(&response_text).map_err(|source| DriveError::Parse {
                body: response_text.clone(),
                source,
            })?;
        info!("Uploaded '{}' with ID {}", file.name, file.id);
        info!("Link: {}", file.web_view_link.as_deref().unwrap_or("N/A"));

        Ok(file)
    }
}

/// Lays out the metadata and media parts of a Drive multipart upload.
fn multipart_related<M: Serialize>(
    boundary: &str,
    metadata: &M,
    media: &[u8],
) -> Result<Vec<u8>, DriveError> {
    let metadata = serde_json::to_string(metadata).map_err(DriveError::Metadata)?;

    let mut body = Vec::with_capacity(media.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("--{boundary}\r\nContent-Type: {IMAGE_MIME_TYPE}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::test_key;
    use mockito::{Matcher, Mock, ServerGuard};

    const FILENAME: &str = "timelapse_2024-05-01_14-07.jpg";

    async fn mock_token(server: &mut ServerGuard) -> Mock {
        server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"ya29.token","token_type":"Bearer"}"#)
            .create_async()
            .await
    }

    fn uploader(server: &ServerGuard, scratch_root: PathBuf) -> DriveUploader {
        DriveUploader::new(
            reqwest::Client::new(),
            test_key(&format!("{}/token", server.url())),
            "folder-123",
            Url::parse(&format!("{}/upload/drive/v3/files", server.url())).unwrap(),
            scratch_root,
        )
    }

    fn is_empty_dir(path: &std::path::Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[test]
    fn multipart_body_has_metadata_then_media() {
        let metadata = FileMetadata {
            name: FILENAME,
            parents: ["folder-123"],
        };
        let body = multipart_related("b0undary", &metadata, b"jpeg-bytes").unwrap();

        let expected = format!(
            "--b0undary\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n\
             {{\"name\":\"{FILENAME}\",\"parents\":[\"folder-123\"]}}\r\n\
             --b0undary\r\nContent-Type: image/jpeg\r\n\r\njpeg-bytes\r\n--b0undary--\r\n"
        );
        assert_eq!(String::from_utf8(body).unwrap(), expected);
    }

    #[test]
    fn unencodable_metadata_is_not_blamed_on_google() {
        // JSON objects need string keys.
        let metadata = std::collections::HashMap::from([((1, 2), "folder-123")]);

        let error = multipart_related("b0undary", &metadata, b"jpeg-bytes").unwrap_err();
        assert!(matches!(error, DriveError::Metadata(_)));
        assert!(!error.to_string().contains("Google"));
    }

    #[tokio::test]
    async fn upload_creates_file_in_folder() {
        let mut server = mockito::Server::new_async().await;
        let token = mock_token(&mut server).await;
        let upload = server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("uploadType".into(), "multipart".into()),
                Matcher::UrlEncoded("fields".into(), RESPONSE_FIELDS.into()),
            ]))
            .match_header("authorization", "Bearer ya29.token")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/related; boundary=".into()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(format!(r#""name":"{FILENAME}""#)),
                Matcher::Regex(r#""parents":\["folder-123"\]"#.into()),
                Matcher::Regex("jpeg-bytes".into()),
            ]))
            .with_status(200)
            .with_body(format!(
                r#"{{"id":"file-1","name":"{FILENAME}","webViewLink":"https://drive.google.com/file/d/file-1/view"}}"#
            ))
            .expect(1)
            .create_async()
            .await;

        let scratch = tempfile::tempdir().unwrap();
        let file = uploader(&server, scratch.path().to_path_buf())
            .upload(b"jpeg-bytes", FILENAME)
            .await
            .unwrap();

        assert_eq!(file.id, "file-1");
        assert_eq!(file.name, FILENAME);
        assert_eq!(
            file.web_view_link.as_deref(),
            Some("https://drive.google.com/file/d/file-1/view")
        );
        token.assert_async().await;
        upload.assert_async().await;
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn failed_upload_still_removes_temporary_file() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let upload = server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"message":"insufficientPermissions"}}"#)
            .expect(1)
            .create_async()
            .await;

        let scratch = tempfile::tempdir().unwrap();
        let error = uploader(&server, scratch.path().to_path_buf())
            .upload(b"jpeg-bytes", FILENAME)
            .await
            .unwrap_err();

        assert!(matches!(error, DriveError::Upload { status, .. } if status == StatusCode::FORBIDDEN));
        assert!(error.to_string().contains("insufficientPermissions"));
        upload.assert_async().await;
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn missing_inputs_are_rejected_before_any_request() {
        let mut server = mockito::Server::new_async().await;
        let token = server.mock("POST", "/token").expect(0).create_async().await;

        let scratch = tempfile::tempdir().unwrap();
        let uploader = uploader(&server, scratch.path().to_path_buf());

        assert!(matches!(
            uploader.upload(b"", FILENAME).await,
            Err(DriveError::EmptyImage)
        ));
        assert!(matches!(
            uploader.upload(b"jpeg-bytes", "").await,
            Err(DriveError::EmptyFilename)
        ));
        token.assert_async().await;
    }
}
