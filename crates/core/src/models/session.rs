use serde::{Deserialize, Serialize};

/// Display name used when nothing better is known about the user.
pub const FALLBACK_DISPLAY_NAME: &str = "Investor";

/// Free-form profile fields attached to the auth user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
}

/// The signed-in user, as persisted by the auth flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            user_metadata: UserMetadata::default(),
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.user_metadata.full_name = Some(full_name.into());
        self
    }

    /// Full name if set, else the local part of the e-mail, else "Investor".
    pub fn display_name(&self) -> String {
        if let Some(name) = self
            .user_metadata
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            return name.to_string();
        }
        match self.email.split('@').next().map(str::trim) {
            Some(local) if !local.is_empty() => local.to_string(),
            _ => FALLBACK_DISPLAY_NAME.to_string(),
        }
    }
}

/// Authenticated session: bearer token plus the user it belongs to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: UserProfile,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}
