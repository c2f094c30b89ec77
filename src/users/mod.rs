mod store;

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use store::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(anyhow::anyhow!("unknown role {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Email,
    Google,
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Provider::Email),
            "google" => Ok(Provider::Google),
            other => Err(anyhow::anyhow!("unknown provider {other}")),
        }
    }
}

/// How an account proves its identity. An account always has at least one
/// way in; a Google-linked account may keep the password it had before.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password { hash: String },
    Google { google_id: String, password_hash: Option<String> },
}

impl Credential {
    pub fn provider(&self) -> Provider {
        match self {
            Credential::Password { .. } => Provider::Email,
            Credential::Google { .. } => Provider::Google,
        }
    }

    pub fn password_hash(&self) -> Option<&str> {
        match self {
            Credential::Password { hash } => Some(hash),
            Credential::Google { password_hash, .. } => password_hash.as_deref(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Credential::Password { .. } => f.write_str("Password"),
            Credential::Google { google_id, password_hash } => f
                .debug_struct("Google")
                .field("google_id", google_id)
                .field("has_password", &password_hash.is_some())
                .finish(),
        }
    }
}

/// The user as every handler sees it. Carries no credential material.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "isEmailVerified")]
    pub email_verified: bool,
    #[serde(rename = "profilePicture")]
    pub profile_image_url: Option<String>,
    #[serde(rename = "authProvider")]
    pub provider: Provider,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub user: User,
    pub credential: Credential,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
