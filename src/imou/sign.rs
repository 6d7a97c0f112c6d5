use serde::Serialize;

/// The only protocol version the open API accepts.
const PROTOCOL_VERSION: &str = "1.0";

/// Computes the request signature: the lowercase hex MD5 of `time + nonce + app_secret`.
pub fn sign(time: &str, nonce: &str, app_secret: &str) -> String {
    let digest = md5::compute(format!("{time}{nonce}{app_secret}"));
    format!("{digest:x}")
}

/// The `system` object every request must carry.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SystemParams {
    pub ver: String,
    pub sign: String,
    #[serde(rename = "appId")]
    pub app_id: String,
    /// Milliseconds since the Unix epoch, as a decimal string.
    pub time: String,
}

impl SystemParams {
    /// Stamps and signs a new `system` object for the given millisecond time.
    // TODO: the timestamp doubles as the nonce. Switch to a random nonce if the
    // vendor's signing documentation says the two must differ.
    pub fn new(app_id: &str, app_secret: &str, time_ms: i64) -> Self {
        let time = time_ms.to_string();
        Self {
            ver: PROTOCOL_VERSION.to_string(),
            sign: sign(&time, &time, app_secret),
            app_id: app_id.to_string(),
            time,
        }
    }
}

/// A complete request body, `{ "system": {...}, "params": {...} }`.
#[derive(Serialize, Debug)]
pub struct RequestEnvelope<P: Serialize> {
    pub system: SystemParams,
    pub params: P,
}
