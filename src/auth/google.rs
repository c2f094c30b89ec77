use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::{users::normalize_email, AppError, AppResult};

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleProfile {
    pub google_id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub email_verified: bool,
}

impl GoogleProfile {
    /// Normalizes the email and falls back to its local part when Google
    /// gives no display name.
    pub fn new(google_id: String, email: &str, name: Option<String>, picture: Option<String>, email_verified: bool) -> AppResult<Self> {
        let email = normalize_email(email);
        if google_id.is_empty() || email.is_empty() {
            return Err(AppError::Unauthenticated);
        }

        let name = name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_owned());

        Ok(Self {
            google_id,
            email,
            name,
            picture: picture.filter(|url| !url.is_empty()),
            email_verified,
        })
    }
}

/// Checks a Google ID token (signature, audience, issuer) and returns the
/// identity it asserts.
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> AppResult<GoogleProfile>;
}

#[derive(Deserialize)]
struct TokenInfo {
    iss: String,
    aud: String,
    sub: String,
    email: Option<String>,
    // tokeninfo encodes this as the string "true"/"false"
    email_verified: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

pub struct TokenInfoVerifier {
    http: reqwest::Client,
    client_id: Option<String>,
}

impl TokenInfoVerifier {
    pub fn new(http: reqwest::Client, client_id: Option<String>) -> Self {
        Self { http, client_id }
    }
}

#[async_trait]
impl IdTokenVerifier for TokenInfoVerifier {
    async fn verify(&self, id_token: &str) -> AppResult<GoogleProfile> {
        let Some(client_id) = &self.client_id else {
            return Err(AppError::Upstream("Google Sign-In is not configured".to_owned()));
        };

        let response = self.http.get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "google tokeninfo request failed");
                AppError::Upstream("Google authentication failed. Please try again.".to_owned())
            })?;

        if response.status().is_client_error() {
            return Err(AppError::Unauthenticated);
        }
        if !response.status().is_success() {
            warn!(status = %response.status(), "google tokeninfo returned an error");
            return Err(AppError::Upstream("Google authentication failed. Please try again.".to_owned()));
        }

        let info: TokenInfo = response.json().await?;
        if info.aud != *client_id || !ISSUERS.contains(&info.iss.as_str()) {
            warn!(aud = %info.aud, iss = %info.iss, "google id token for another audience");
            return Err(AppError::Unauthenticated);
        }

        let Some(email) = info.email else {
            return Err(AppError::Unauthenticated);
        };

        GoogleProfile::new(
            info.sub,
            &email,
            info.name,
            info.picture,
            info.email_verified.as_deref() == Some("true"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_normalizes_email_and_name() {
        let profile = GoogleProfile::new("123".into(), " Bob@Mail.com", Some("  ".into()), Some(String::new()), true).unwrap();
        assert_eq!(profile.email, "bob@mail.com");
        assert_eq!(profile.name, "bob");
        assert_eq!(profile.picture, None);
    }

    #[test]
    fn profile_requires_identity() {
        assert!(GoogleProfile::new(String::new(), "a@b.com", None, None, false).is_err());
        assert!(GoogleProfile::new("1".into(), " ", None, None, false).is_err());
    }

    #[tokio::test]
    async fn unconfigured_verifier_reports_upstream() {
        let verifier = TokenInfoVerifier::new(reqwest::Client::new(), None);
        assert!(matches!(verifier.verify("x").await, Err(AppError::Upstream(_))));
    }
}
