//! Client-side checks in front of sample uploads and track submissions

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use thiserror::Error;

use crate::api::{FileUpload, NewSubmission, PackApi, Sample, SamplePack, Submission, SubmissionApi, User};
use crate::auth::SessionManager;
use crate::error::Error;
use crate::window::{GatedAction, WindowEvaluator, WindowReport, WindowStatus};

/// Largest accepted audio file
pub const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Samples one user may contribute to a single pack
pub const MAX_UPLOADS_PER_USER: usize = 10;

/// Reasons an upload is refused before it is sent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("sign in to continue")]
    NotAuthenticated,

    #[error("{window} is {}", .status.message())]
    WindowClosed {
        window: &'static str,
        status: WindowStatus,
    },

    #[error("File size exceeds limit ({size} bytes, limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("upload limit of {limit} samples reached")]
    QuotaExhausted { limit: usize },
}

/// Size and quota limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub max_uploads_per_user: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            max_uploads_per_user: MAX_UPLOADS_PER_USER,
        }
    }
}

impl UploadPolicy {
    /// Uploads `user` still has on `pack`
    pub fn remaining_uploads(&self, pack: &SamplePack, user: &User) -> usize {
        let used = pack.samples.iter().filter(|s| s.is_owned_by(user)).count();
        self.max_uploads_per_user.saturating_sub(used)
    }

    pub fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if size > self.max_bytes {
            return Err(UploadError::FileTooLarge {
                size,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Sends uploads and submissions once every check passes
pub struct Uploader {
    session: Arc<SessionManager>,
    packs: Arc<dyn PackApi>,
    submissions: Arc<dyn SubmissionApi>,
    windows: WindowEvaluator,
    policy: UploadPolicy,
}

impl Uploader {
    pub fn new(
        session: Arc<SessionManager>,
        packs: Arc<dyn PackApi>,
        submissions: Arc<dyn SubmissionApi>,
        windows: WindowEvaluator,
    ) -> Self {
        Self {
            session,
            packs,
            submissions,
            windows,
            policy: UploadPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UploadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Window state for a pack action, as the controls should render it
    pub fn gate(&self, pack: &SamplePack, action: GatedAction, now: DateTime<Utc>) -> WindowReport {
        self.windows.evaluate(pack.window_for(action), now)
    }

    fn require_open(&self, pack: &SamplePack, action: GatedAction, now: DateTime<Utc>) -> Result<(), UploadError> {
        let report = self.gate(pack, action, now);
        if report.open {
            Ok(())
        } else {
            Err(UploadError::WindowClosed {
                window: action.window_name(),
                status: report.status,
            })
        }
    }

    fn require_user(&self) -> Result<User, UploadError> {
        self.session.user().ok_or(UploadError::NotAuthenticated)
    }

    fn on_api_error(&self, err: Error) -> Error {
        if err.is_unauthorized() {
            self.session.handle_unauthorized();
        }
        err
    }

    /// Contribute a sample to `pack`
    pub async fn upload_sample(
        &self,
        pack: &SamplePack,
        file: FileUpload,
        now: DateTime<Utc>,
    ) -> Result<Sample, Error> {
        let user = self.require_user()?;
        self.require_open(pack, GatedAction::UploadSample, now)?;
        self.policy.check_size(file.size())?;
        if self.policy.remaining_uploads(pack, &user) == 0 {
            return Err(UploadError::QuotaExhausted {
                limit: self.policy.max_uploads_per_user,
            }
            .into());
        }

        let sample = self
            .packs
            .upload_sample(&pack.id, file)
            .await
            .map_err(|e| self.on_api_error(e))?;
        info!("Uploaded sample {} to pack {}", sample.id, pack.id);
        Ok(sample)
    }

    /// Submit a finished track for `pack`
    pub async fn submit_track(
        &self,
        pack: &SamplePack,
        title: &str,
        description: &str,
        file: FileUpload,
        now: DateTime<Utc>,
    ) -> Result<Submission, Error> {
        self.require_user()?;
        self.require_open(pack, GatedAction::SubmitTrack, now)?;
        self.policy.check_size(file.size())?;

        let submission = NewSubmission {
            title: title.to_string(),
            description: description.to_string(),
            sample_pack_id: pack.id.clone(),
            file,
        };
        let created = self
            .submissions
            .create_submission(submission)
            .await
            .map_err(|e| self.on_api_error(e))?;
        info!("Submitted track {} to pack {}", created.id, pack.id);
        Ok(created)
    }
}
