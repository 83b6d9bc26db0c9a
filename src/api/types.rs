//! Wire types exchanged with the Sample Exchange API

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::window::{AccessWindow, GatedAction, WindowDiagnostic};

/// Identifiers arrive as numbers or strings depending on the endpoint
fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(n) => Ok(n.to_string()),
        RawId::Text(s) if !s.is_empty() => Ok(s),
        RawId::Text(_) => Err(de::Error::custom("empty identifier")),
    }
}

/// The server sends `null` for empty collections
fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "ID", alias = "id", deserialize_with = "flexible_id")]
    pub id: String,

    #[serde(default)]
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Body returned by login and OAuth callback endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The bearer token; OAuth callbacks call it `token`
    #[serde(
        default,
        rename = "access_token",
        alias = "token",
        alias = "accessToken",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Body returned by the registration endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub user: Option<User>,

    #[serde(default)]
    pub message: Option<String>,
}

/// OAuth identity providers the server accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
    Discord,
    /// Development login, only enabled on servers running in dev mode
    Dev,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
            Self::Discord => "discord",
            Self::Dev => "dev",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            "discord" => Ok(Self::Discord),
            "dev" => Ok(Self::Dev),
            other => Err(Error::general(format!("unsupported OAuth provider: {}", other))),
        }
    }
}

/// A sample contributed to a pack
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    #[serde(rename = "ID", alias = "id", deserialize_with = "flexible_id")]
    pub id: String,

    #[serde(default)]
    pub filename: String,

    #[serde(default)]
    pub file_url: Option<String>,

    #[serde(default)]
    pub file_size: Option<i64>,

    #[serde(default, rename = "userID", alias = "userId")]
    pub user_id: Option<u64>,

    #[serde(default)]
    pub user: Option<User>,

    #[serde(default)]
    pub created_at: Option<String>,
}

impl Sample {
    /// Whether `user` contributed this sample
    pub fn is_owned_by(&self, user: &User) -> bool {
        match (&self.user, self.user_id) {
            (Some(owner), _) => owner.id == user.id,
            (None, Some(owner_id)) => owner_id.to_string() == user.id,
            (None, None) => false,
        }
    }
}

/// A finished track submitted against a pack
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "ID", alias = "id", deserialize_with = "flexible_id")]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub file_url: Option<String>,

    #[serde(default)]
    pub file_size: Option<i64>,

    #[serde(default)]
    pub user: Option<User>,

    #[serde(default, rename = "samplePackID", alias = "packId")]
    pub sample_pack_id: Option<u64>,

    #[serde(default)]
    pub submitted_at: Option<String>,
}

/// A time-boxed collaboration cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePack {
    #[serde(rename = "ID", alias = "id", deserialize_with = "flexible_id")]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Boundaries are kept as sent so a malformed value cannot sink the whole listing
    #[serde(default)]
    pub upload_start: String,

    #[serde(default)]
    pub upload_end: String,

    #[serde(default)]
    pub start_date: String,

    #[serde(default)]
    pub end_date: String,

    #[serde(default)]
    pub is_active: bool,

    #[serde(default, deserialize_with = "nullable_vec")]
    pub samples: Vec<Sample>,

    #[serde(default, deserialize_with = "nullable_vec")]
    pub submissions: Vec<Submission>,
}

impl SamplePack {
    /// Raw `(start, end)` boundaries for an action
    pub fn boundaries(&self, action: GatedAction) -> (&str, &str) {
        match action {
            GatedAction::UploadSample => (&self.upload_start, &self.upload_end),
            GatedAction::SubmitTrack => (&self.start_date, &self.end_date),
        }
    }

    /// The window gating `action` on this pack
    pub fn window_for(&self, action: GatedAction) -> Result<AccessWindow, WindowDiagnostic> {
        let (start, end) = self.boundaries(action);
        AccessWindow::parse(start, end)
    }

    pub fn upload_window(&self) -> Result<AccessWindow, WindowDiagnostic> {
        self.window_for(GatedAction::UploadSample)
    }

    pub fn submission_window(&self) -> Result<AccessWindow, WindowDiagnostic> {
        self.window_for(GatedAction::SubmitTrack)
    }
}

/// Response of the pack listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackListing {
    #[serde(default)]
    pub current_pack: Option<SamplePack>,

    #[serde(default, deserialize_with = "nullable_vec")]
    pub past_packs: Vec<SamplePack>,
}

/// An audio file ready to be sent as multipart form data
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl FileUpload {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            mime_type: guess_audio_mime(file_name).map(str::to_string),
            bytes,
        }
    }

    /// Read a file from disk
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::general(format!("not a file path: {}", path.display())))?;
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::new(file_name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

fn guess_audio_mime(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "wav" => Some("audio/wav"),
        "mp3" => Some("audio/mpeg"),
        "flac" => Some("audio/flac"),
        "aiff" | "aif" => Some("audio/aiff"),
        "ogg" => Some("audio/ogg"),
        _ => None,
    }
}

/// Fields of a track submission
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub title: String,
    pub description: String,
    pub sample_pack_id: String,
    pub file: FileUpload,
}
