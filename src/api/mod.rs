//! The external API collaborators and their HTTP implementation

mod types;

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};

use crate::error::Error;
use crate::fetch::HttpClient;

pub use types::*;

/// Authentication endpoints
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a token and identity
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, Error>;

    /// Create an account
    async fn register(&self, email: &str, password: &str) -> Result<RegisterResponse, Error>;

    /// Identity of the bearer of the current token
    async fn current_user(&self) -> Result<User, Error>;

    /// Identity of the bearer of `token`, without touching the shared header
    async fn identify(&self, token: &str) -> Result<User, Error>;

    /// Finish an OAuth flow with the code handed back by the provider
    async fn oauth_callback(&self, code: &str, provider: OAuthProvider) -> Result<AuthResponse, Error>;
}

/// Sample pack endpoints
#[async_trait]
pub trait PackApi: Send + Sync {
    async fn list_packs(&self) -> Result<PackListing, Error>;

    async fn get_pack(&self, pack_id: &str) -> Result<SamplePack, Error>;

    async fn upload_sample(&self, pack_id: &str, file: FileUpload) -> Result<Sample, Error>;

    /// Zip archive of every sample in the pack
    async fn download_pack(&self, pack_id: &str) -> Result<Vec<u8>, Error>;

    async fn download_sample(&self, sample_id: &str) -> Result<Vec<u8>, Error>;
}

/// Track submission endpoints
#[async_trait]
pub trait SubmissionApi: Send + Sync {
    async fn create_submission(&self, submission: NewSubmission) -> Result<Submission, Error>;

    async fn list_submissions(&self, pack_id: &str) -> Result<Vec<Submission>, Error>;
}

fn file_part(file: FileUpload) -> Result<Part, Error> {
    let part = Part::bytes(file.bytes).file_name(file.file_name);
    match file.mime_type {
        Some(mime) => Ok(part.mime_str(&mime)?),
        None => Ok(part),
    }
}

/// HTTP implementation of every API collaborator
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
}

impl ApiClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Fetch an authenticated download URL
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, Error> {
        self.http.get(url).execute_bytes().await
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, Error> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
        });

        self.http
            .post("/auth/login")
            .json(&body)?
            .execute::<AuthResponse>()
            .await
    }

    async fn register(&self, email: &str, password: &str) -> Result<RegisterResponse, Error> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
        });

        self.http
            .post("/auth/register")
            .json(&body)?
            .execute::<RegisterResponse>()
            .await
    }

    async fn current_user(&self) -> Result<User, Error> {
        self.http.get("/auth/me").execute::<User>().await
    }

    async fn identify(&self, token: &str) -> Result<User, Error> {
        self.http
            .get("/auth/me")
            .bearer_auth(token)
            .execute::<User>()
            .await
    }

    async fn oauth_callback(&self, code: &str, provider: OAuthProvider) -> Result<AuthResponse, Error> {
        let path = format!("/auth/oauth/{}/callback", provider);
        self.http
            .get(&path)
            .query("code", code)
            .execute::<AuthResponse>()
            .await
    }
}

#[async_trait]
impl PackApi for ApiClient {
    async fn list_packs(&self) -> Result<PackListing, Error> {
        self.http.get("/samples/packs").execute::<PackListing>().await
    }

    async fn get_pack(&self, pack_id: &str) -> Result<SamplePack, Error> {
        let mut pack = self
            .http
            .get(&format!("/samples/packs/{}", pack_id))
            .execute::<SamplePack>()
            .await?;

        for sample in &mut pack.samples {
            sample.file_url = Some(self.http.url(&format!("/samples/download/{}", sample.id)));
        }

        Ok(pack)
    }

    async fn upload_sample(&self, pack_id: &str, file: FileUpload) -> Result<Sample, Error> {
        debug!("Uploading {} ({} bytes) to pack {}", file.file_name, file.size(), pack_id);
        let form = Form::new().part("file", file_part(file)?);

        self.http
            .post(&format!("/samples/packs/{}/upload", pack_id))
            .multipart(form)
            .execute::<Sample>()
            .await
    }

    async fn download_pack(&self, pack_id: &str) -> Result<Vec<u8>, Error> {
        self.http
            .get(&format!("/samples/packs/{}/download", pack_id))
            .execute_bytes()
            .await
    }

    async fn download_sample(&self, sample_id: &str) -> Result<Vec<u8>, Error> {
        self.http
            .get(&format!("/samples/download/{}", sample_id))
            .execute_bytes()
            .await
    }
}

#[async_trait]
impl SubmissionApi for ApiClient {
    async fn create_submission(&self, submission: NewSubmission) -> Result<Submission, Error> {
        let form = Form::new()
            .text("title", submission.title)
            .text("description", submission.description)
            .text("samplePackId", submission.sample_pack_id)
            .part("file", file_part(submission.file)?);

        self.http
            .post("/submissions")
            .multipart(form)
            .execute::<Submission>()
            .await
    }

    async fn list_submissions(&self, pack_id: &str) -> Result<Vec<Submission>, Error> {
        self.http
            .get("/submissions")
            .query("pack_id", pack_id)
            .execute::<Vec<Submission>>()
            .await
    }
}
