use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::auth::token::TokenResponse;

pub const DEFAULT_AUTH_URL: &str = "https://api.sonos.com/login/v3/oauth";
pub const DEFAULT_TOKEN_URL: &str = "https://api.sonos.com/login/v3/oauth/access";
pub const SCOPE: &str = "playback-control-all";

#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("request to token endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("token endpoint returned an unreadable body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub timeout: Duration,
}

impl OAuthConfig {
    /// Link the user follows to grant access.
    pub fn authorize_url(&self, state: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("state", state),
                ("scope", SCOPE),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
        )
    }
}

/// The two grant exchanges the lifecycle manager depends on.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange_authorization_code(&self, code: &str)
        -> Result<TokenResponse, EndpointError>;

    async fn exchange_refresh_token(&self, refresh_token: &str)
        -> Result<TokenResponse, EndpointError>;
}

/// Stateless client for the authorization server's token endpoint.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    async fn request_tokens(&self, params: &[(&str, &str)]) -> Result<TokenResponse, EndpointError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(EndpointError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: TokenResponse = serde_json::from_str(&body)?;

        Ok(tokens.stamped())
    }
}

#[async_trait]
impl TokenExchange for OAuthClient {
    async fn exchange_authorization_code(
        &self,
        code: &str,
    ) -> Result<TokenResponse, EndpointError> {
        log::info!("exchanging authorization code for tokens");

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        self.request_tokens(&params).await
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, EndpointError> {
        log::info!("refreshing access token");

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        self.request_tokens(&params).await
    }
}
