//! HTTP client for the session backend.
//!
//! One typed method per endpoint. Transport failures, non-2xx statuses,
//! unparseable bodies, and `success: false` envelopes each map to their own
//! [`CompanionError`] variant so callers get a uniform failure surface.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bubble::{ImageGenMode, StoredBubble};
use crate::error::CompanionError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for the backend gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the backend (e.g. `http://127.0.0.1:5000`).
    pub base_url: String,
    /// TCP connection timeout.
    pub connect_timeout: Duration,
    /// Per-request read timeout. Image generation is the slow path, so the
    /// default is generous.
    pub request_timeout: Duration,
}

impl GatewayConfig {
    /// Create a config with sensible defaults.
    ///
    /// - connect_timeout: 3 s
    /// - request_timeout: 60 s
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Join a base URL and an endpoint path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Guess the MIME type of an uploaded image from its filename. Unknown
/// extensions fall through to a generic type; the backend owns validation.
pub fn image_mime(filename: &str) -> &'static str {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SessionLoadResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Vec<StoredBubble>>,
}

#[derive(Debug, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct ImageResponse {
    pub image_path: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioSaveResponse {
    pub file_path: String,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct MapUploadResponse {
    pub success: bool,
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OracleResponse {
    pub response: String,
}

/// A generated NPC profile.
#[derive(Debug, Clone, Deserialize)]
pub struct CharacterProfile {
    #[serde(default)]
    pub character_name: Option<String>,
    pub physical_description: String,
    pub personality: String,
}

/// Requested footprint of a generated location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaSize {
    Small,
    Large,
}

impl AreaSize {
    pub fn from_str_loose(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "small" => Ok(AreaSize::Small),
            "large" => Ok(AreaSize::Large),
            _ => Err(format!("Unknown area size: {}", s)),
        }
    }
}

impl std::fmt::Display for AreaSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AreaSize::Small => write!(f, "small"),
            AreaSize::Large => write!(f, "large"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationRequest {
    #[serde(rename = "placeName")]
    pub place_name: String,
    #[serde(rename = "shortDescription")]
    pub short_description: String,
    #[serde(rename = "areaSize")]
    pub area_size: AreaSize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationProfile {
    #[serde(rename = "placeName")]
    pub place_name: String,
    #[serde(rename = "longDescription")]
    pub long_description: String,
    pub secrets: String,
}

#[derive(Debug, Serialize)]
struct ApiKeyRequest<'a> {
    api_key: &'a str,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// The backend gateway client.
pub struct Gateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self, CompanionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CompanionError::Connect {
                url: config.base_url.clone(),
                detail: e.to_string(),
            })?;
        Ok(Gateway { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.config.base_url, path)
    }

    fn connect_err(url: &str, e: reqwest::Error) -> CompanionError {
        CompanionError::Connect {
            url: url.to_string(),
            detail: e.to_string(),
        }
    }

    fn decode_err(endpoint: &str, e: reqwest::Error) -> CompanionError {
        CompanionError::Decode {
            endpoint: endpoint.to_string(),
            detail: e.to_string(),
        }
    }

    fn status_err(resp: &reqwest::Response, url: String) -> Option<CompanionError> {
        if resp.status().is_success() {
            None
        } else {
            Some(CompanionError::Http {
                status: resp.status().as_u16(),
                url,
            })
        }
    }

    // -----------------------------------------------------------------------
    // Session persistence
    // -----------------------------------------------------------------------

    /// Ask whether a prior session exists.
    ///
    /// Returns `Ok(Some(stored))` when the backend has one (possibly empty),
    /// `Ok(None)` when it does not.
    pub async fn load_session(&self) -> Result<Option<Vec<StoredBubble>>, CompanionError> {
        let url = self.url("/load_session");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        let body: SessionLoadResponse = resp
            .json()
            .await
            .map_err(|e| Self::decode_err("/load_session", e))?;
        if body.success {
            Ok(Some(body.data.unwrap_or_default()))
        } else {
            Ok(None)
        }
    }

    /// Persist a full session snapshot. One shot, no retry.
    pub async fn save_session(&self, snapshot: &[StoredBubble]) -> Result<(), CompanionError> {
        let url = self.url("/save_session");
        let resp = self
            .client
            .post(&url)
            .json(snapshot)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        let body: AckResponse = resp
            .json()
            .await
            .map_err(|e| Self::decode_err("/save_session", e))?;
        if body.success {
            Ok(())
        } else {
            Err(CompanionError::Backend {
                endpoint: "/save_session".to_string(),
            })
        }
    }

    /// Archive the stored session so a fresh one can begin.
    pub async fn archive_session(&self) -> Result<(), CompanionError> {
        let url = self.url("/archive_session");
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        let body: AckResponse = resp
            .json()
            .await
            .map_err(|e| Self::decode_err("/archive_session", e))?;
        if body.success {
            Ok(())
        } else {
            Err(CompanionError::Backend {
                endpoint: "/archive_session".to_string(),
            })
        }
    }

    // -----------------------------------------------------------------------
    // Image generation
    // -----------------------------------------------------------------------

    /// Generate an image from bubble text. Returns the backend-relative path
    /// of the stored image.
    pub async fn generate_image(
        &self,
        text: &str,
        mode: Option<ImageGenMode>,
    ) -> Result<String, CompanionError> {
        let url = self.url("/generate_image");
        let mut form: Vec<(&str, String)> = vec![("text", text.to_string())];
        if let Some(mode) = mode {
            form.push(("object", mode.wire_value().to_string()));
        }
        let resp = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        let body: ImageResponse = resp
            .json()
            .await
            .map_err(|e| Self::decode_err("/generate_image", e))?;
        Ok(body.image_path)
    }

    /// Fetch raw image bytes, for the export archive.
    pub async fn fetch_image(&self, image_path: &str) -> Result<Vec<u8>, CompanionError> {
        let url = self.url(image_path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Self::decode_err(image_path, e))?;
        Ok(bytes.to_vec())
    }

    // -----------------------------------------------------------------------
    // Audio
    // -----------------------------------------------------------------------

    /// Upload a recorded WAV, returning the backend's path for it.
    pub async fn save_audio(
        &self,
        wav: Vec<u8>,
        filename: &str,
    ) -> Result<String, CompanionError> {
        let url = self.url("/save_audio");
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name(filename.to_string())
            .mime_str("audio/wav")
            .map_err(|e| Self::decode_err("/save_audio", e))?;
        let form = reqwest::multipart::Form::new().part("audio", part);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        let body: AudioSaveResponse = resp
            .json()
            .await
            .map_err(|e| Self::decode_err("/save_audio", e))?;
        Ok(body.file_path)
    }

    /// Transcribe a previously saved recording.
    pub async fn transcribe(&self, file_path: &str) -> Result<String, CompanionError> {
        let url = self.url("/transcribe");
        let resp = self
            .client
            .post(&url)
            .form(&[("audio", file_path)])
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        let body: TranscriptionResponse = resp
            .json()
            .await
            .map_err(|e| Self::decode_err("/transcribe", e))?;
        Ok(body.text)
    }

    /// Remove a temporary recording from the backend.
    pub async fn delete_audio(&self, file_path: &str) -> Result<(), CompanionError> {
        let url = self.url("/delete_audio");
        let resp = self
            .client
            .post(&url)
            .form(&[("file_path", file_path)])
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Map upload
    // -----------------------------------------------------------------------

    /// Upload a map image, returning the path the backend stored it under.
    pub async fn upload_map(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<String, CompanionError> {
        let url = self.url("/upload_map");
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(image_mime(filename))
            .map_err(|e| Self::decode_err("/upload_map", e))?;
        let form = reqwest::multipart::Form::new().part("map", part);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        let body: MapUploadResponse = resp
            .json()
            .await
            .map_err(|e| Self::decode_err("/upload_map", e))?;
        if !body.success {
            return Err(CompanionError::Backend {
                endpoint: "/upload_map".to_string(),
            });
        }
        body.file_path.ok_or_else(|| CompanionError::Decode {
            endpoint: "/upload_map".to_string(),
            detail: "missing file_path".to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // API key management
    // -----------------------------------------------------------------------

    /// Whether the backend holds a usable API key.
    pub async fn confirm_api_key(&self) -> Result<bool, CompanionError> {
        let url = self.url("/api_key_confirm");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        Ok(resp.status().is_success())
    }

    /// Store an API key on the backend.
    pub async fn set_api_key(&self, api_key: &str) -> Result<(), CompanionError> {
        if api_key.trim().is_empty() {
            return Err(CompanionError::MissingInput { what: "api key" });
        }
        let url = self.url("/api_key");
        let resp = self
            .client
            .post(&url)
            .json(&ApiKeyRequest { api_key })
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Generators
    // -----------------------------------------------------------------------

    /// Ask the oracle for a free-form pronouncement.
    pub async fn consult_oracle(&self) -> Result<String, CompanionError> {
        let url = self.url("/oracle");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        let body: OracleResponse = resp
            .json()
            .await
            .map_err(|e| Self::decode_err("/oracle", e))?;
        Ok(body.response)
    }

    /// Generate an NPC profile.
    pub async fn generate_character(&self) -> Result<CharacterProfile, CompanionError> {
        let url = self.url("/character_generate");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        resp.json()
            .await
            .map_err(|e| Self::decode_err("/character_generate", e))
    }

    /// Generate a location from a name, a short description, and a size.
    pub async fn generate_location(
        &self,
        request: &LocationRequest,
    ) -> Result<LocationProfile, CompanionError> {
        let url = self.url("/generate_location");
        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::connect_err(&url, e))?;
        if let Some(err) = Self::status_err(&resp, url) {
            return Err(err);
        }
        resp.json()
            .await
            .map_err(|e| Self::decode_err("/generate_location", e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_gateway() -> Gateway {
        Gateway::new(GatewayConfig::new("http://127.0.0.1:5000")).expect("client builds")
    }

    // -- config --------------------------------------------------------------

    #[test]
    fn test_config_defaults() {
        let cfg = GatewayConfig::new("http://127.0.0.1:5000");
        assert_eq!(cfg.base_url, "http://127.0.0.1:5000");
        assert_eq!(cfg.connect_timeout, Duration::from_secs(3));
        assert_eq!(cfg.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_gateway_builds_and_reports_base_url() {
        let gw = make_gateway();
        assert_eq!(gw.base_url(), "http://127.0.0.1:5000");
    }

    // -- url joining ---------------------------------------------------------

    #[test]
    fn test_join_url_basic() {
        assert_eq!(
            join_url("http://a:5000", "/load_session"),
            "http://a:5000/load_session"
        );
    }

    #[test]
    fn test_join_url_trailing_slash() {
        assert_eq!(
            join_url("http://a:5000/", "/load_session"),
            "http://a:5000/load_session"
        );
    }

    #[test]
    fn test_join_url_relative_path() {
        assert_eq!(
            join_url("http://a:5000", "static/images/x.png"),
            "http://a:5000/static/images/x.png"
        );
    }

    // -- mime guessing -------------------------------------------------------

    #[test]
    fn test_image_mime_known_extensions() {
        assert_eq!(image_mime("map.png"), "image/png");
        assert_eq!(image_mime("map.JPG"), "image/jpeg");
        assert_eq!(image_mime("map.jpeg"), "image/jpeg");
        assert_eq!(image_mime("map.gif"), "image/gif");
    }

    #[test]
    fn test_image_mime_unknown_falls_through() {
        assert_eq!(image_mime("map.bmp"), "application/octet-stream");
        assert_eq!(image_mime("noextension"), "application/octet-stream");
    }

    // -- wire types ----------------------------------------------------------

    #[test]
    fn test_session_load_response_with_data() {
        let json = r#"{"success":true,"data":[{"timestamp":"1/1/24, 9:00 AM","transcription":"Hello","imagePath":null}]}"#;
        let resp: SessionLoadResponse = serde_json::from_str(json).expect("deser");
        assert!(resp.success);
        let data = resp.data.expect("data present");
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].transcription, "Hello");
        assert!(data[0].image_path.is_none());
    }

    #[test]
    fn test_session_load_response_no_data_field() {
        let json = r#"{"success":false}"#;
        let resp: SessionLoadResponse = serde_json::from_str(json).expect("deser");
        assert!(!resp.success);
        assert!(resp.data.is_none());
    }

    #[test]
    fn test_snapshot_serializes_as_json_array() {
        let snapshot = vec![StoredBubble {
            timestamp: "1/1/24, 9:00 AM".to_string(),
            transcription: "Hello".to_string(),
            image_path: None,
        }];
        let json = serde_json::to_string(&snapshot).expect("serialize");
        assert!(json.starts_with('['), "json: {json}");
        assert!(json.contains("\"imagePath\":null"));
    }

    #[test]
    fn test_image_response_deserializes() {
        let json = r#"{"image_path":"static/images/abc123.png"}"#;
        let resp: ImageResponse = serde_json::from_str(json).expect("deser");
        assert_eq!(resp.image_path, "static/images/abc123.png");
    }

    #[test]
    fn test_audio_save_response_deserializes() {
        let json = r#"{"file_path":"uploads/xyz.wav"}"#;
        let resp: AudioSaveResponse = serde_json::from_str(json).expect("deser");
        assert_eq!(resp.file_path, "uploads/xyz.wav");
    }

    #[test]
    fn test_transcription_response_deserializes() {
        let json = r#"{"text":"The party enters the cave"}"#;
        let resp: TranscriptionResponse = serde_json::from_str(json).expect("deser");
        assert_eq!(resp.text, "The party enters the cave");
    }

    #[test]
    fn test_map_upload_response_success() {
        let json = r#"{"success":true,"file_path":"/static/images/maps/town.png"}"#;
        let resp: MapUploadResponse = serde_json::from_str(json).expect("deser");
        assert!(resp.success);
        assert_eq!(resp.file_path.as_deref(), Some("/static/images/maps/town.png"));
    }

    #[test]
    fn test_map_upload_response_failure_without_path() {
        let json = r#"{"success":false}"#;
        let resp: MapUploadResponse = serde_json::from_str(json).expect("deser");
        assert!(!resp.success);
        assert!(resp.file_path.is_none());
    }

    #[test]
    fn test_character_profile_deserializes() {
        let json = r#"{"character_name":"Maren","physical_description":"Tall, windburned","personality":"Cautious and dry-witted"}"#;
        let profile: CharacterProfile = serde_json::from_str(json).expect("deser");
        assert_eq!(profile.character_name.as_deref(), Some("Maren"));
        assert_eq!(profile.physical_description, "Tall, windburned");
    }

    #[test]
    fn test_character_profile_name_optional() {
        let json = r#"{"physical_description":"Short","personality":"Loud"}"#;
        let profile: CharacterProfile = serde_json::from_str(json).expect("deser");
        assert!(profile.character_name.is_none());
    }

    #[test]
    fn test_location_request_uses_wire_names() {
        let req = LocationRequest {
            place_name: "Gullwatch".to_string(),
            short_description: "A fishing town".to_string(),
            area_size: AreaSize::Small,
        };
        let json = serde_json::to_string(&req).expect("serialize");
        assert!(json.contains("\"placeName\":\"Gullwatch\""), "json: {json}");
        assert!(json.contains("\"shortDescription\""));
        assert!(json.contains("\"areaSize\":\"small\""));
    }

    #[test]
    fn test_location_profile_deserializes_wire_names() {
        let json = r#"{"placeName":"Gullwatch","longDescription":"Salt-stained docks","secrets":"The harbormaster smuggles"}"#;
        let profile: LocationProfile = serde_json::from_str(json).expect("deser");
        assert_eq!(profile.place_name, "Gullwatch");
        assert_eq!(profile.long_description, "Salt-stained docks");
        assert_eq!(profile.secrets, "The harbormaster smuggles");
    }

    #[test]
    fn test_oracle_response_deserializes() {
        let json = r#"{"response":"Yes, but at a cost"}"#;
        let resp: OracleResponse = serde_json::from_str(json).expect("deser");
        assert_eq!(resp.response, "Yes, but at a cost");
    }

    // -- area size -----------------------------------------------------------

    #[test]
    fn test_area_size_from_str_loose() {
        assert_eq!(AreaSize::from_str_loose("small"), Ok(AreaSize::Small));
        assert_eq!(AreaSize::from_str_loose("LARGE"), Ok(AreaSize::Large));
        assert!(AreaSize::from_str_loose("medium").is_err());
    }

    #[test]
    fn test_area_size_display() {
        assert_eq!(AreaSize::Small.to_string(), "small");
        assert_eq!(AreaSize::Large.to_string(), "large");
    }

    #[test]
    fn test_api_key_request_serializes() {
        let req = ApiKeyRequest { api_key: "sk-test" };
        let json = serde_json::to_string(&req).expect("serialize");
        assert_eq!(json, r#"{"api_key":"sk-test"}"#);
    }
}
