//! Shared-password session.
//!
//! There are no per-user accounts. A password unlocks one of two access
//! levels: the admin secret grants [`AccessLevel::Admin`], the member secret
//! grants [`AccessLevel::Member`]. The session lives for as long as the
//! [`Session`] value does.

use std::fmt;

use thiserror::Error;

/// The two shared passwords the client accepts.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecrets {
    admin: String,
    member: String,
}

impl SharedSecrets {
    /// Creates the secret pair.
    #[must_use]
    pub fn new(admin: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            admin: admin.into(),
            member: member.into(),
        }
    }

    /// Access level unlocked by `password`, admin checked first.
    fn level_for(&self, password: &str) -> Option<AccessLevel> {
        if !self.admin.is_empty() && password == self.admin {
            Some(AccessLevel::Admin)
        } else if !self.member.is_empty() && password == self.member {
            Some(AccessLevel::Member)
        } else {
            None
        }
    }
}

impl fmt::Debug for SharedSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecrets")
            .field("admin", &"<redacted>")
            .field("member", &"<redacted>")
            .finish()
    }
}

/// What an authenticated user may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    /// Full control: create, edit, delete, remind, complete.
    Admin,
    /// May view tasks and mark them complete or incomplete.
    Member,
}

impl AccessLevel {
    /// Create, edit, delete and send reminders.
    #[must_use]
    pub const fn can_manage(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Mark tasks complete or incomplete. Every level may.
    #[must_use]
    pub const fn can_complete(self) -> bool {
        true
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Member => write!(f, "member"),
        }
    }
}

/// Why a login attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoginError {
    /// Nothing but whitespace was entered.
    #[error("password cannot be empty")]
    EmptyPassword,
    /// The password matched neither secret.
    #[error("incorrect password")]
    IncorrectPassword,
}

/// Authentication state of the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Session {
    /// Not logged in.
    #[default]
    Unauthenticated,
    /// Logged in at the given level.
    Authenticated(AccessLevel),
}

impl Session {
    /// Attempts to log in with `password`, trimming surrounding whitespace.
    ///
    /// On failure the session is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::EmptyPassword`] for a blank password and
    /// [`LoginError::IncorrectPassword`] if it matches neither secret.
    pub fn login(
        &mut self,
        secrets: &SharedSecrets,
        password: &str,
    ) -> Result<AccessLevel, LoginError> {
        let password = password.trim();
        if password.is_empty() {
            return Err(LoginError::EmptyPassword);
        }
        let level = secrets
            .level_for(password)
            .ok_or(LoginError::IncorrectPassword)?;
        *self = Self::Authenticated(level);
        tracing::info!(level = %level, "logged in");
        Ok(level)
    }

    /// Returns to the unauthenticated state.
    pub fn logout(&mut self) {
        if self.is_authenticated() {
            tracing::info!("logged out");
        }
        *self = Self::Unauthenticated;
    }

    /// Current access level, if logged in.
    #[must_use]
    pub const fn access_level(&self) -> Option<AccessLevel> {
        match self {
            Self::Unauthenticated => None,
            Self::Authenticated(level) => Some(*level),
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Authenticated(AccessLevel::Admin))
    }
}
