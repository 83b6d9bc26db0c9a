#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::oneshot;

use sample_exchange::api::{
    AuthApi, AuthResponse, FileUpload, OAuthProvider, PackApi, PackListing, RegisterResponse,
    Sample, SamplePack, User,
};
use sample_exchange::auth::SessionManager;
use sample_exchange::error::Error;
use sample_exchange::fetch::AuthHeader;
use sample_exchange::persist::{MemoryTokenStore, TokenStore};

pub fn user(id: &str, email: &str) -> User {
    User {
        id: id.to_string(),
        email: email.to_string(),
        username: None,
    }
}

fn unauthorized() -> Error {
    Error::Api {
        status: 401,
        message: "invalid or expired token".to_string(),
    }
}

/// In-memory stand-in for the authentication endpoints
pub struct FakeAuthApi {
    header: AuthHeader,
    accounts: Mutex<HashMap<String, (String, User)>>,
    tokens: Arc<Mutex<HashMap<String, User>>>,
    login_body: Mutex<Option<AuthResponse>>,
    oauth_codes: Mutex<HashMap<String, AuthResponse>>,
    hold_login: Mutex<Option<oneshot::Receiver<()>>>,
    pub current_user_calls: AtomicUsize,
}

impl FakeAuthApi {
    pub fn new(header: AuthHeader) -> Self {
        Self {
            header,
            accounts: Mutex::new(HashMap::new()),
            tokens: Arc::new(Mutex::new(HashMap::new())),
            login_body: Mutex::new(None),
            oauth_codes: Mutex::new(HashMap::new()),
            hold_login: Mutex::new(None),
            current_user_calls: AtomicUsize::new(0),
        }
    }

    /// Same server-side token table, seen through a fresh header
    pub fn reloaded(&self, header: AuthHeader) -> Self {
        let fake = Self::new(header);
        Self {
            tokens: self.tokens.clone(),
            ..fake
        }
    }

    pub fn with_account(self, email: &str, password: &str, user: User) -> Self {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), (password.to_string(), user));
        self
    }

    pub fn with_valid_token(self, token: &str, user: User) -> Self {
        self.tokens.lock().unwrap().insert(token.to_string(), user);
        self
    }

    pub fn with_login_body(self, body: AuthResponse) -> Self {
        *self.login_body.lock().unwrap() = Some(body);
        self
    }

    pub fn with_oauth_code(self, code: &str, body: AuthResponse) -> Self {
        self.oauth_codes.lock().unwrap().insert(code.to_string(), body);
        self
    }

    /// Block the next login until the returned sender fires
    pub fn hold_next_login(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.hold_login.lock().unwrap() = Some(rx);
        tx
    }

    fn lookup(&self, token: Option<String>) -> Result<User, Error> {
        let token = token.ok_or_else(unauthorized)?;
        self.tokens
            .lock()
            .unwrap()
            .get(&token)
            .cloned()
            .ok_or_else(unauthorized)
    }
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, Error> {
        let hold = self.hold_login.lock().unwrap().take();
        if let Some(rx) = hold {
            let _ = rx.await;
        }

        if let Some(body) = self.login_body.lock().unwrap().clone() {
            return Ok(body);
        }

        let account = self.accounts.lock().unwrap().get(email).cloned();
        match account {
            Some((expected, user)) if expected == password => {
                let token = format!("token-{}", user.id);
                self.tokens.lock().unwrap().insert(token.clone(), user.clone());
                Ok(AuthResponse {
                    access_token: Some(token),
                    user: Some(user),
                })
            }
            _ => Err(unauthorized()),
        }
    }

    async fn register(&self, email: &str, password: &str) -> Result<RegisterResponse, Error> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(Error::Api {
                status: 409,
                message: "email already registered".to_string(),
            });
        }
        let created = user(&(accounts.len() + 100).to_string(), email);
        accounts.insert(email.to_string(), (password.to_string(), created.clone()));
        Ok(RegisterResponse {
            user: Some(created),
            message: None,
        })
    }

    async fn current_user(&self) -> Result<User, Error> {
        self.current_user_calls.fetch_add(1, Ordering::SeqCst);
        self.lookup(self.header.token())
    }

    async fn identify(&self, token: &str) -> Result<User, Error> {
        self.lookup(Some(token.to_string()))
    }

    async fn oauth_callback(&self, code: &str, _provider: OAuthProvider) -> Result<AuthResponse, Error> {
        let body = self.oauth_codes.lock().unwrap().get(code).cloned();
        body.ok_or_else(|| Error::Api {
            status: 400,
            message: "invalid code".to_string(),
        })
    }
}

/// Fixed set of packs keyed by id
#[derive(Default)]
pub struct FakePackApi {
    packs: Mutex<HashMap<String, SamplePack>>,
    pub uploads: Mutex<Vec<(String, String)>>,
    pub reject_with: Mutex<Option<u16>>,
}

impl FakePackApi {
    pub fn with_pack(self, pack: SamplePack) -> Self {
        self.packs.lock().unwrap().insert(pack.id.clone(), pack);
        self
    }
}

#[async_trait]
impl PackApi for FakePackApi {
    async fn list_packs(&self) -> Result<PackListing, Error> {
        let packs = self.packs.lock().unwrap();
        Ok(PackListing {
            current_pack: packs.values().find(|p| p.is_active).cloned(),
            past_packs: packs.values().filter(|p| !p.is_active).cloned().collect(),
        })
    }

    async fn get_pack(&self, pack_id: &str) -> Result<SamplePack, Error> {
        if let Some(status) = *self.reject_with.lock().unwrap() {
            return Err(Error::Api {
                status,
                message: "rejected".to_string(),
            });
        }
        self.packs
            .lock()
            .unwrap()
            .get(pack_id)
            .cloned()
            .ok_or_else(|| Error::Api {
                status: 404,
                message: "sample pack not found".to_string(),
            })
    }

    async fn upload_sample(&self, pack_id: &str, file: FileUpload) -> Result<Sample, Error> {
        if let Some(status) = *self.reject_with.lock().unwrap() {
            return Err(Error::Api {
                status,
                message: "rejected".to_string(),
            });
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((pack_id.to_string(), file.file_name.clone()));
        let sample = json!({
            "ID": uploads.len(),
            "filename": file.file_name,
            "fileSize": file.bytes.len(),
        });
        Ok(serde_json::from_value(sample)?)
    }

    async fn download_pack(&self, _pack_id: &str) -> Result<Vec<u8>, Error> {
        Ok(b"PK".to_vec())
    }

    async fn download_sample(&self, _sample_id: &str) -> Result<Vec<u8>, Error> {
        Ok(b"RIFF".to_vec())
    }
}

/// A pack with the given upload and submission windows
pub fn pack(id: &str, upload: (&str, &str), submission: (&str, &str)) -> SamplePack {
    serde_json::from_value(json!({
        "ID": id,
        "title": format!("Pack {}", id),
        "description": "",
        "uploadStart": upload.0,
        "uploadEnd": upload.1,
        "startDate": submission.0,
        "endDate": submission.1,
        "isActive": true,
        "samples": [],
    }))
    .unwrap()
}

/// Session manager wired to a fake API and an in-memory store
pub struct Harness {
    pub header: AuthHeader,
    pub api: Arc<FakeAuthApi>,
    pub store: Arc<MemoryTokenStore>,
    pub session: Arc<SessionManager>,
}

impl Harness {
    pub fn new<F>(configure: F) -> Self
    where
        F: FnOnce(FakeAuthApi) -> FakeAuthApi,
    {
        Self::with_store(Arc::new(MemoryTokenStore::new()), configure)
    }

    pub fn with_store<F>(store: Arc<MemoryTokenStore>, configure: F) -> Self
    where
        F: FnOnce(FakeAuthApi) -> FakeAuthApi,
    {
        let header = AuthHeader::new();
        let api = Arc::new(configure(FakeAuthApi::new(header.clone())));
        let session = Arc::new(SessionManager::new(
            api.clone(),
            store.clone(),
            header.clone(),
        ));
        Self {
            header,
            api,
            store,
            session,
        }
    }

    pub fn stored_token(&self) -> Option<String> {
        self.store.load().unwrap()
    }
}
