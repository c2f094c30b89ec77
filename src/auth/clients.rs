use oauth2::{basic::BasicClient, AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RedirectUrl, TokenUrl};

use crate::{config::Config, AppError, AppResult};

pub type GoogleClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub(crate) const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Clone)]
pub struct Clients {
    google_client: Option<GoogleClient>,
    http: reqwest::Client,
}

impl Clients {
    pub fn from_config(config: &Config) -> anyhow::Result<Clients> {
        // oauth2 requires the token exchange to not follow redirects
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let google_client = 'a: {
            let Some(google) = &config.google else {
                break 'a None;
            };
            let Some(client_secret) = &google.client_secret else {
                break 'a None;
            };

            Some(
                BasicClient::new(ClientId::new(google.client_id.clone()))
                    .set_client_secret(ClientSecret::new(client_secret.clone()))
                    .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_owned())?)
                    .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_owned())?)
                    .set_redirect_uri(RedirectUrl::new(google.redirect_url.clone())?)
            )
        };

        Ok(Clients { google_client, http })
    }

    pub fn google(&self) -> AppResult<&GoogleClient> {
        self.google_client
            .as_ref()
            .ok_or_else(|| AppError::Upstream("Google Sign-In is not configured".to_owned()))
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}
