use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use crate::auth::endpoint::TokenExchange;
use crate::auth::storage::TokenStorage;
use crate::auth::{Authenticator, TokenError};
use crate::utils::StringExt;

use household::{CreatedGroup, Favorites, Groups, Households};

pub mod household;

pub const DEFAULT_CONTROL_URL: &str = "https://api.ws.sonos.com/control/api/v1/";

#[derive(Debug, Clone)]
pub struct Config {
    pub control_url: String,
    pub household_id: String,
    pub player_name: String,
    pub timeout: Duration,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Error retrieving access token: {0}")]
    Token(#[from] TokenError),
    #[error("Sonos API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Sonos API answered {status}")]
    Status { status: u16, body: String },
    #[error("Unexpected Sonos API response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Invalid Sonos API url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Raw response body of a rejected request, if there was one.
    pub fn body(&self) -> Option<&str> {
        match self {
            ApiError::Status { body, .. } => Some(body.as_str()),
            _ => None,
        }
    }
}

/// Anything able to hand out a currently valid bearer token.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, TokenError>;
}

#[async_trait]
impl<Storage, Exchange> AccessTokenSource for Authenticator<Storage, Exchange>
where
    Storage: TokenStorage,
    Exchange: TokenExchange,
{
    async fn access_token(&self) -> Result<String, TokenError> {
        Authenticator::access_token(self).await
    }
}

pub enum Api<R> {
    Households,
    Groups(String),
    Favorites(String),
    _Unreachable(std::convert::Infallible, std::marker::PhantomData<R>),
}

impl<R> fmt::Display for Api<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Api::Households => write!(f, "households"),
            Api::Groups(household) => write!(f, "households/{}/groups", household),
            Api::Favorites(household) => write!(f, "households/{}/favorites", household),
            Api::_Unreachable(never, _) => match *never {},
        }
    }
}

pub enum Command {
    CreateGroup { household: String, player_id: String },
    LoadFavorite { group: String, favorite: String },
    Play { group: String },
    SetGroupVolume { group: String, volume: u8 },
}

impl Command {
    fn path(&self) -> String {
        match self {
            Command::CreateGroup { household, .. } => {
                format!("households/{}/groups/createGroup", household)
            }
            Command::LoadFavorite { group, .. } => format!("groups/{}/favorites", group),
            Command::Play { group } => format!("groups/{}/playback/play", group),
            Command::SetGroupVolume { group, .. } => format!("groups/{}/groupVolume", group),
        }
    }

    fn body(&self) -> Value {
        match self {
            Command::CreateGroup { player_id, .. } => json!({ "playerIds": [player_id] }),
            Command::LoadFavorite { favorite, .. } => json!({
                "favoriteId": favorite,
                "playOnCompletion": false,
                "action": "REPLACE",
            }),
            Command::Play { .. } => json!({}),
            Command::SetGroupVolume { volume, .. } => json!({ "volume": volume }),
        }
    }
}

/// Client for the Sonos control API.
///
/// Every request asks the token source for a valid token first.
pub struct ApiClient {
    config: Config,
    client: Client,
    tokens: Arc<dyn AccessTokenSource>,
}

impl ApiClient {
    pub fn new(config: Config, tokens: Arc<dyn AccessTokenSource>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(ApiClient {
            config,
            client,
            tokens,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn get<R: DeserializeOwned>(&self, api: Api<R>) -> Result<R, ApiError> {
        let body = self.request(reqwest::Method::GET, &api.to_string(), None).await?;

        Ok(serde_json::from_str(&body)?)
    }

    /// Sends a command, returning the raw response body.
    pub async fn send(&self, command: Command) -> Result<String, ApiError> {
        self.request(reqwest::Method::POST, &command.path(), Some(command.body()))
            .await
    }

    pub async fn households(&self) -> Result<Households, ApiError> {
        self.get(Api::Households).await
    }

    pub async fn groups(&self, household: &str) -> Result<Groups, ApiError> {
        self.get(Api::Groups(household.to_owned())).await
    }

    pub async fn favorites(&self, household: &str) -> Result<Favorites, ApiError> {
        self.get(Api::Favorites(household.to_owned())).await
    }

    /// Moves the player into a group of its own and returns that group's id.
    pub async fn create_group(
        &self,
        household: &str,
        player_id: &str,
    ) -> Result<Option<String>, ApiError> {
        let body = self
            .send(Command::CreateGroup {
                household: household.to_owned(),
                player_id: player_id.to_owned(),
            })
            .await?;

        let created: CreatedGroup = serde_json::from_str(&body)?;

        Ok(created.into_id())
    }

    pub async fn load_favorite(&self, group: &str, favorite: &str) -> Result<String, ApiError> {
        self.send(Command::LoadFavorite {
            group: group.to_owned(),
            favorite: favorite.to_owned(),
        })
        .await
    }

    pub async fn play(&self, group: &str) -> Result<String, ApiError> {
        self.send(Command::Play {
            group: group.to_owned(),
        })
        .await
    }

    pub async fn set_group_volume(&self, group: &str, volume: u8) -> Result<String, ApiError> {
        self.send(Command::SetGroupVolume {
            group: group.to_owned(),
            volume,
        })
        .await
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<String, ApiError> {
        let access_token = self.tokens.access_token().await?;
        let url = self.config.control_url.to_url()?.join(path)?;

        log::debug!("{} {}", method, url);

        let mut req_builder = self.client.request(method, url).bearer_auth(access_token);
        if let Some(body) = body {
            req_builder = req_builder.json(&body);
        }

        let response = req_builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            log::warn!("Sonos API answered {}: {}", status, text);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}
