//! Sample Exchange Rust Client Library
//!
//! A client for the Sample Exchange service, where collaborators share a
//! time-boxed sample pack, upload samples while its upload window is open
//! and submit finished tracks while its submission window is open.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod persist;
pub mod router;
pub mod upload;
pub mod window;

use std::sync::Arc;

use log::{info, warn};

use crate::api::{ApiClient, PackApi, PackListing, SamplePack, Submission, SubmissionApi};
use crate::auth::SessionManager;
use crate::config::ClientOptions;
use crate::error::Error;
use crate::fetch::{AuthHeader, HttpClient};
use crate::persist::{FileTokenStore, MemoryTokenStore, TokenStore};
use crate::router::{Guard, Navigator};
use crate::upload::Uploader;
use crate::window::WindowEvaluator;

/// The main entry point for the Sample Exchange client
pub struct SampleExchange {
    /// Client options
    pub options: ClientOptions,
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    windows: WindowEvaluator,
}

impl SampleExchange {
    /// Create a client with options read from the environment
    pub fn from_env() -> Result<Self, Error> {
        Self::new(ClientOptions::from_env()?)
    }

    /// Create a client, storing the token where the options say
    ///
    /// # Example
    ///
    /// ```
    /// use sample_exchange::{SampleExchange, config::ClientOptions};
    ///
    /// let options = ClientOptions::default()
    ///     .with_api_url("https://samples.example.com")
    ///     .with_persist_session(false);
    /// let client = SampleExchange::new(options).unwrap();
    /// assert!(!client.session().is_authenticated());
    /// ```
    pub fn new(options: ClientOptions) -> Result<Self, Error> {
        let store: Arc<dyn TokenStore> = if options.persist_session {
            match options.resolved_token_file() {
                Some(path) => Arc::new(FileTokenStore::new(path)),
                None => {
                    warn!("No data directory available, session will not survive restarts");
                    Arc::new(MemoryTokenStore::new())
                }
            }
        } else {
            Arc::new(MemoryTokenStore::new())
        };
        Self::with_parts(options, store, None)
    }

    /// Create a client from explicit collaborators
    pub fn with_parts(
        options: ClientOptions,
        store: Arc<dyn TokenStore>,
        navigator: Option<Arc<dyn Navigator>>,
    ) -> Result<Self, Error> {
        let auth_header = AuthHeader::new();
        let http = HttpClient::new(&options, auth_header.clone())?;
        let api = Arc::new(ApiClient::new(http));

        let mut session = SessionManager::new(api.clone(), store, auth_header);
        if let Some(navigator) = navigator {
            session = session.with_navigator(navigator);
        }

        let windows = WindowEvaluator::new(options.window_override);
        if options.window_override.as_flag().is_some() {
            info!("Access window override active: {:?}", options.window_override);
        }

        Ok(Self {
            options,
            api,
            session: Arc::new(session),
            windows,
        })
    }

    /// The session manager
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// The raw API client
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// The process-wide window evaluator
    pub fn windows(&self) -> WindowEvaluator {
        self.windows
    }

    /// Navigation guard bound to this client
    pub fn guard(&self) -> Guard {
        Guard::new(self.session.clone(), self.api.clone(), self.windows)
    }

    /// Upload and submission front end bound to this client
    pub fn uploader(&self) -> Uploader {
        Uploader::new(
            self.session.clone(),
            self.api.clone(),
            self.api.clone(),
            self.windows,
        )
    }

    fn checked<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(err) = &result {
            if err.is_unauthorized() {
                self.session.handle_unauthorized();
            }
        }
        result
    }

    /// Current and past packs
    pub async fn list_packs(&self) -> Result<PackListing, Error> {
        let result = self.api.list_packs().await;
        self.checked(result)
    }

    /// One pack with its samples
    pub async fn get_pack(&self, pack_id: &str) -> Result<SamplePack, Error> {
        let result = self.api.get_pack(pack_id).await;
        self.checked(result)
    }

    /// Tracks submitted against a pack
    pub async fn list_submissions(&self, pack_id: &str) -> Result<Vec<Submission>, Error> {
        let result = self.api.list_submissions(pack_id).await;
        self.checked(result)
    }

    /// Zip archive of a pack's samples
    pub async fn download_pack(&self, pack_id: &str) -> Result<Vec<u8>, Error> {
        let result = self.api.download_pack(pack_id).await;
        self.checked(result)
    }

    /// One sample's audio
    pub async fn download_sample(&self, sample_id: &str) -> Result<Vec<u8>, Error> {
        let result = self.api.download_sample(sample_id).await;
        self.checked(result)
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::auth::{AuthError, SessionManager, SessionState};
    pub use crate::config::ClientOptions;
    pub use crate::error::Error;
    pub use crate::window::{AccessWindow, WindowEvaluator, WindowOverride, WindowStatus};
    pub use crate::SampleExchange;
}
