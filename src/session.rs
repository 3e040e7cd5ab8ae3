//! Login state for protected operations.
//!
//! One object answers "who is logged in"; callers never read the session
//! file themselves.

use crate::error::{ExportError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sessions last one day, like the dashboard's login cookie.
pub const SESSION_LIFETIME_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    user: User,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Session {
    user: Option<User>,
    expires_at: Option<DateTime<Utc>>,
    path: Option<PathBuf>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Restore a persisted session. Missing, unreadable or expired files
    /// give an anonymous session.
    pub fn load(path: &Path) -> Self {
        let mut session = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        let Ok(raw) = std::fs::read_to_string(path) else {
            return session;
        };
        match serde_json::from_str::<StoredSession>(&raw) {
            Ok(stored) if stored.expires_at > Utc::now() => {
                debug!(user = %stored.user.username, "restored session");
                session.user = Some(stored.user);
                session.expires_at = Some(stored.expires_at);
            }
            Ok(_) => debug!("stored session expired"),
            Err(e) => warn!(error = %e, "ignoring unreadable session file"),
        }
        session
    }

    /// Begin a session for `user`, persisting it when a path is given.
    pub fn start(user: User, path: Option<&Path>) -> Result<Self> {
        let expires_at = Utc::now() + Duration::hours(SESSION_LIFETIME_HOURS);
        if let Some(p) = path {
            let stored = StoredSession {
                user: user.clone(),
                expires_at,
            };
            std::fs::write(p, serde_json::to_string_pretty(&stored)?)?;
        }
        info!(user = %user.username, "logged in");
        Ok(Self {
            user: Some(user),
            expires_at: Some(expires_at),
            path: path.map(Path::to_path_buf),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.user, self.expires_at) {
            (Some(_), Some(exp)) => exp > now,
            _ => false,
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        if self.is_authenticated() {
            self.user.as_ref()
        } else {
            None
        }
    }

    /// Gate for protected operations.
    pub fn require_user(&self) -> Result<&User> {
        self.current_user().ok_or(ExportError::Unauthenticated)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.user = None;
        self.expires_at = None;
        if let Some(p) = &self.path {
            if p.exists() {
                std::fs::remove_file(p)?;
            }
        }
        Ok(())
    }
}
