//! Access window evaluation for time-gated pack actions
//!
//! Every decision about whether an upload or a submission is currently
//! permitted goes through [`WindowEvaluator`]. Callers always pass the
//! evaluation instant explicitly; nothing in this module reads the clock.

mod timestamp;

use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use timestamp::parse_timestamp;

/// Developer bypass for access windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowOverride {
    /// Every window is treated as open
    ForceOpen,
    /// Every window is treated as closed
    ForceClosed,
    /// Windows follow the clock
    #[default]
    Defer,
}

impl WindowOverride {
    /// Parse a configuration value. Empty input defers; unknown input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => Some(Self::Defer),
            "true" | "1" | "yes" | "on" => Some(Self::ForceOpen),
            "false" | "0" | "no" | "off" => Some(Self::ForceClosed),
            _ => None,
        }
    }

    /// Build from a tri-state flag
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => Self::ForceOpen,
            Some(false) => Self::ForceClosed,
            None => Self::Defer,
        }
    }

    /// The tri-state flag this override represents
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::ForceOpen => Some(true),
            Self::ForceClosed => Some(false),
            Self::Defer => None,
        }
    }
}

/// Actions gated by a pack's windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatedAction {
    /// Contributing a sample to the pack
    UploadSample,
    /// Submitting a finished track built from the pack
    SubmitTrack,
}

impl GatedAction {
    /// Human readable name of the window guarding this action
    pub fn window_name(&self) -> &'static str {
        match self {
            Self::UploadSample => "Upload window",
            Self::SubmitTrack => "Submission window",
        }
    }
}

/// Problems with window input. Evaluation resolves these to closed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowDiagnostic {
    #[error("unparsable {field} timestamp: {value:?}")]
    UnparsableTimestamp { field: &'static str, value: String },

    #[error("window starts at {start} after it ends at {end}")]
    InvertedWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// The permitted range for one gated action, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl AccessWindow {
    /// Create a window; `start` must not be after `end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowDiagnostic> {
        if start > end {
            return Err(WindowDiagnostic::InvertedWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Create a window from wire timestamps
    pub fn parse(start: &str, end: &str) -> Result<Self, WindowDiagnostic> {
        let start_at = parse_timestamp(start).ok_or_else(|| WindowDiagnostic::UnparsableTimestamp {
            field: "start",
            value: start.to_string(),
        })?;
        let end_at = parse_timestamp(end).ok_or_else(|| WindowDiagnostic::UnparsableTimestamp {
            field: "end",
            value: end.to_string(),
        })?;
        Self::new(start_at, end_at)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `now` falls inside the window, ignoring any override
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }
}

/// Where a window stands relative to the evaluation instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowStatus {
    NotYetOpen,
    Open,
    Closed,
    OverriddenOpen,
    OverriddenClosed,
}

impl WindowStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::OverriddenOpen)
    }

    /// Status line shown next to a gated control
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotYetOpen => "not open yet",
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
            Self::OverriddenOpen => "OPEN (override)",
            Self::OverriddenClosed => "CLOSED (override)",
        }
    }
}

/// Everything a view needs to render one gated control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowReport {
    pub status: WindowStatus,
    pub open: bool,
    pub remaining: Option<Duration>,
    pub diagnostic: Option<WindowDiagnostic>,
}

/// Decides whether time-gated actions are permitted.
///
/// The override is fixed at construction so that decisions stay consistent
/// for the lifetime of a client.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowEvaluator {
    override_flag: WindowOverride,
}

impl WindowEvaluator {
    pub fn new(override_flag: WindowOverride) -> Self {
        Self { override_flag }
    }

    pub fn override_flag(&self) -> WindowOverride {
        self.override_flag
    }

    /// Whether the window is open at `now`; the override wins unconditionally
    pub fn is_open(&self, window: &AccessWindow, now: DateTime<Utc>) -> bool {
        match self.override_flag {
            WindowOverride::ForceOpen => true,
            WindowOverride::ForceClosed => false,
            WindowOverride::Defer => window.contains(now),
        }
    }

    /// Time left before the window closes, for display only
    pub fn remaining(&self, window: &AccessWindow, now: DateTime<Utc>) -> Option<Duration> {
        if self.is_open(window, now) && window.end > now {
            Some(window.end - now)
        } else {
            None
        }
    }

    pub fn describe(&self, window: &AccessWindow, now: DateTime<Utc>) -> WindowStatus {
        match self.override_flag {
            WindowOverride::ForceOpen => WindowStatus::OverriddenOpen,
            WindowOverride::ForceClosed => WindowStatus::OverriddenClosed,
            WindowOverride::Defer if now < window.start => WindowStatus::NotYetOpen,
            WindowOverride::Defer if now > window.end => WindowStatus::Closed,
            WindowOverride::Defer => WindowStatus::Open,
        }
    }

    /// Evaluate a parsed-or-failed window, resolving diagnostics to closed
    pub fn evaluate(
        &self,
        window: Result<AccessWindow, WindowDiagnostic>,
        now: DateTime<Utc>,
    ) -> WindowReport {
        match window {
            Ok(window) => {
                let status = self.describe(&window, now);
                WindowReport {
                    status,
                    open: self.is_open(&window, now),
                    remaining: self.remaining(&window, now),
                    diagnostic: None,
                }
            }
            Err(diagnostic) => {
                let (status, open) = match self.override_flag {
                    WindowOverride::ForceOpen => (WindowStatus::OverriddenOpen, true),
                    WindowOverride::ForceClosed => (WindowStatus::OverriddenClosed, false),
                    WindowOverride::Defer => (WindowStatus::Closed, false),
                };
                warn!("Malformed access window resolved to {:?}: {}", status, diagnostic);
                WindowReport {
                    status,
                    open,
                    remaining: None,
                    diagnostic: Some(diagnostic),
                }
            }
        }
    }

    /// Evaluate a window straight from wire timestamps
    pub fn report(&self, start: &str, end: &str, now: DateTime<Utc>) -> WindowReport {
        self.evaluate(AccessWindow::parse(start, end), now)
    }
}

/// Render a remaining duration as "2d 3h", "3h 12m", "12m" or "less than a minute"
pub fn describe_remaining(remaining: Duration) -> String {
    let minutes = remaining.num_minutes();
    if minutes < 1 {
        return "less than a minute".to_string();
    }
    let days = minutes / (24 * 60);
    let hours = (minutes / 60) % 24;
    let mins = minutes % 60;
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}
