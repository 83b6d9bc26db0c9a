//! Route table and the navigation guard
//!
//! [`Guard::before_each`] runs once per navigation attempt and must finish
//! before the target is shown. It consults the session manager for
//! authentication and the window evaluator for gated routes.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::api::PackApi;
use crate::auth::SessionManager;
use crate::window::{GatedAction, WindowEvaluator};

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const OAUTH_CALLBACK_PATH: &str = "/auth/callback";

/// The navigation collaborator
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

/// Navigator that records requested paths for a host to act on
#[derive(Debug, Default)]
pub struct NavigationLog {
    paths: Mutex<Vec<String>>,
}

impl NavigationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.paths.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last(&self) -> Option<String> {
        self.paths.lock().unwrap_or_else(|e| e.into_inner()).last().cloned()
    }
}

impl Navigator for NavigationLog {
    fn navigate(&self, path: &str) {
        debug!("Navigate to {}", path);
        self.paths
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteName {
    Home,
    Login,
    Register,
    OAuthCallback,
    PackDetails,
    UploadSample,
    SubmitTrack,
}

/// Per-route access rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub guest_only: bool,
    pub gate: Option<GatedAction>,
}

impl RouteName {
    pub fn meta(&self) -> RouteMeta {
        match self {
            Self::Home | Self::PackDetails => RouteMeta {
                requires_auth: true,
                ..RouteMeta::default()
            },
            Self::Login | Self::Register => RouteMeta {
                guest_only: true,
                ..RouteMeta::default()
            },
            Self::OAuthCallback => RouteMeta::default(),
            Self::UploadSample => RouteMeta {
                requires_auth: true,
                gate: Some(GatedAction::UploadSample),
                ..RouteMeta::default()
            },
            Self::SubmitTrack => RouteMeta {
                requires_auth: true,
                gate: Some(GatedAction::SubmitTrack),
                ..RouteMeta::default()
            },
        }
    }
}

/// A path matched against the route table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: RouteName,
    pub path: String,
    pub pack_id: Option<String>,
    pub query: Vec<(String, String)>,
}

impl Route {
    pub fn meta(&self) -> RouteMeta {
        self.name.meta()
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Path of a pack's detail page
pub fn pack_path(pack_id: &str) -> String {
    format!("/pack/{}", pack_id)
}

/// Match a path against the route table
pub fn resolve(target: &str) -> Option<Route> {
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };
    let query = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let (name, pack_id) = match segments.as_slice() {
        [] => (RouteName::Home, None),
        ["login"] => (RouteName::Login, None),
        ["register"] => (RouteName::Register, None),
        ["auth", "callback"] => (RouteName::OAuthCallback, None),
        ["pack", id] => (RouteName::PackDetails, Some(id.to_string())),
        ["pack", id, "upload"] => (RouteName::UploadSample, Some(id.to_string())),
        ["pack", id, "submit"] => (RouteName::SubmitTrack, Some(id.to_string())),
        _ => return None,
    };

    Some(Route {
        name,
        path: path.to_string(),
        pack_id,
        query,
    })
}

/// Outcome of a guard run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Proceed(Route),
    Redirect(String),
}

/// The `beforeEach` navigation guard
#[derive(Clone)]
pub struct Guard {
    session: Arc<SessionManager>,
    packs: Arc<dyn PackApi>,
    windows: WindowEvaluator,
}

impl Guard {
    pub fn new(session: Arc<SessionManager>, packs: Arc<dyn PackApi>, windows: WindowEvaluator) -> Self {
        Self {
            session,
            packs,
            windows,
        }
    }

    /// Decide whether navigation to `target` may proceed at `now`
    pub async fn before_each(&self, target: &str, now: DateTime<Utc>) -> Navigation {
        let route = match resolve(target) {
            Some(route) => route,
            None => {
                debug!("No route for {}, sending home", target);
                return Navigation::Redirect(HOME_PATH.to_string());
            }
        };

        if let Some(id) = &route.pack_id {
            if id.parse::<u64>().is_err() {
                warn!("Invalid pack ID: {}", id);
                return Navigation::Redirect(HOME_PATH.to_string());
            }
        }

        if !self.session.is_initialized() {
            if let Err(err) = self.session.restore().await {
                debug!("Restore during navigation failed, continuing signed out: {}", err);
            }
        }

        let meta = route.meta();
        let authenticated = self.session.is_authenticated();

        if meta.requires_auth && !authenticated {
            return Navigation::Redirect(LOGIN_PATH.to_string());
        }
        if meta.guest_only && authenticated {
            return Navigation::Redirect(HOME_PATH.to_string());
        }

        if let (Some(action), Some(pack_id)) = (meta.gate, route.pack_id.as_deref()) {
            let pack = match self.packs.get_pack(pack_id).await {
                Ok(pack) => pack,
                Err(err) if err.is_unauthorized() => {
                    self.session.handle_unauthorized();
                    return Navigation::Redirect(LOGIN_PATH.to_string());
                }
                Err(err) => {
                    warn!("Could not load pack {} for {}: {}", pack_id, route.path, err);
                    return Navigation::Redirect(pack_path(pack_id));
                }
            };

            let report = self.windows.evaluate(pack.window_for(action), now);
            if !report.open {
                debug!(
                    "{} for pack {} is {:?}, redirecting",
                    action.window_name(),
                    pack_id,
                    report.status
                );
                return Navigation::Redirect(pack_path(pack_id));
            }
        }

        Navigation::Proceed(route)
    }
}
