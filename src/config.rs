use std::path::PathBuf;
use url::Url;

/// The IMOU open API root.
pub const DEFAULT_IMOU_API_URL: &str = "https://openapi.easy4ip.com/openapi";

/// Drive v3 media upload endpoint.
pub const DEFAULT_DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// Variables that must be set (and non-empty) for a run, in reporting order.
const REQUIRED_VARS: [&str; 5] = [
    "IMOU_APP_ID",
    "IMOU_APP_SECRET",
    "IMOU_DEVICE_ID",
    "GOOGLE_DRIVE_FOLDER_ID",
    "GOOGLE_CREDENTIALS_JSON",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(".env file could not be loaded")]
    DotEnv(#[source] dotenvy::Error),
    #[error("missing environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("{name} is not a valid URL: {value}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Everything a single run needs, sourced from the environment.
#[derive(Clone)]
pub struct Config {
    pub app_id: String,
    pub app_secret: String,
    pub device_id: String,
    pub folder_id: String,
    /// The raw service account key document.
    pub credentials_json: String,
    pub imou_api_url: Url,
    pub drive_upload_url: Url,
    /// Where the snapshot is staged before uploading.
    pub scratch_dir: PathBuf,
}

impl Config {
    /// Reads configuration from the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        env_file_loaded(dotenvy::dotenv())?;
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let missing: Vec<&'static str> = REQUIRED_VARS
            .into_iter()
            .filter(|name| present(*name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let required = |name: &str| present(name).unwrap_or_default();

        let url = |name: &'static str, default: &str| {
            let value = present(name).unwrap_or_else(|| default.to_string());
            Url::parse(&value).map_err(|source| ConfigError::InvalidUrl {
                name,
                value,
                source,
            })
        };

        Ok(Self {
            app_id: required("IMOU_APP_ID"),
            app_secret: required("IMOU_APP_SECRET"),
            device_id: required("IMOU_DEVICE_ID"),
            folder_id: required("GOOGLE_DRIVE_FOLDER_ID"),
            credentials_json: required("GOOGLE_CREDENTIALS_JSON"),
            imou_api_url: url("IMOU_API_URL", DEFAULT_IMOU_API_URL)?,
            drive_upload_url: url("GOOGLE_DRIVE_UPLOAD_URL", DEFAULT_DRIVE_UPLOAD_URL)?,
            scratch_dir: present("TIMELAPSE_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
        })
    }
}

/// A missing .env is fine, the variables may come from the job runner.
/// One that exists but cannot be read or parsed is not.
fn env_file_loaded<T>(result: Result<T, dotenvy::Error>) -> Result<(), ConfigError> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::DotEnv(err)),
    }
}

// Keep the app secret and the service account key out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_id", &self.app_id)
            .field("device_id", &self.device_id)
            .field("folder_id", &self.folder_id)
            .field("imou_api_url", &self.imou_api_url.as_str())
            .field("drive_upload_url", &self.drive_upload_url.as_str())
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}
