use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Args, Parser, Subcommand};

use crate::api::household::{Group, Household};
use crate::api::{self, ApiClient, DEFAULT_CONTROL_URL};
use crate::auth::endpoint::{OAuthClient, OAuthConfig, DEFAULT_AUTH_URL, DEFAULT_TOKEN_URL};
use crate::auth::storage::JsonTokenStorage;
use crate::auth::token::now;
use crate::auth::Authenticator;
use crate::favorites::AliasStore;
use crate::ndef;
use crate::web::{AppState, PendingStates, SonosAuthenticator};

#[derive(Parser)]
#[clap(version, about = "Remote control for a Sonos speaker: play aliased albums, set volume")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    #[clap(short, long, parse(from_occurrences), global = true)]
    pub verbose: usize,

    #[clap(flatten)]
    pub settings: Settings,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web server
    Serve {
        #[clap(short, long, env = "PLAYBOX_LISTEN", default_value = "0.0.0.0:8080")]
        listen: SocketAddr,
    },
    /// List households and groups visible to the authorized account
    Discover,
    /// Make sure a valid access token is available, refreshing it if needed
    Token,
    /// Trigger the URL stored on an NFC tag, read from a raw memory dump
    Tag {
        #[clap(help = "File holding the tag's user memory (pages 4..36)")]
        dump: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct Settings {
    #[clap(long, env = "SONOS_CLIENT_ID", default_value = "", hide_default_value = true)]
    pub client_id: String,
    #[clap(long, env = "SONOS_CLIENT_SECRET", default_value = "", hide_env_values = true, hide_default_value = true)]
    pub client_secret: String,
    #[clap(long, env = "SONOS_REDIRECT_URI", default_value = "http://localhost:8080/callback")]
    pub redirect_uri: String,
    #[clap(long, env = "SONOS_TOKEN_PATH", help = "Default: <config dir>/playbox/tokens.json")]
    pub token_path: Option<PathBuf>,
    #[clap(long, env = "SONOS_HOUSEHOLD_ID", default_value = "")]
    pub household_id: String,
    #[clap(long, env = "SONOS_PLAYER_NAME", default_value = "")]
    pub player_name: String,
    #[clap(long, env = "PLAYBOX_FAVORITES_PATH", help = "Default: <config dir>/playbox/favorites_map.json")]
    pub favorites_path: Option<PathBuf>,
    #[clap(long, env = "PLAYBOX_PUBLIC_URL", default_value = "http://localhost:8080")]
    pub public_url: String,
    #[clap(long, env = "SONOS_AUTH_URL", default_value = DEFAULT_AUTH_URL)]
    pub auth_url: String,
    #[clap(long, env = "SONOS_TOKEN_URL", default_value = DEFAULT_TOKEN_URL)]
    pub token_url: String,
    #[clap(long, env = "SONOS_CONTROL_URL", default_value = DEFAULT_CONTROL_URL)]
    pub control_url: String,
    #[clap(long, env = "PLAYBOX_HTTP_TIMEOUT", default_value_t = 10, help = "Seconds")]
    pub http_timeout: u64,
}

impl Settings {
    pub fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            auth_url: self.auth_url.clone(),
            token_url: self.token_url.clone(),
            timeout: self.timeout(),
        }
    }

    pub fn api_config(&self) -> api::Config {
        api::Config {
            control_url: self.control_url.clone(),
            household_id: self.household_id.clone(),
            player_name: self.player_name.clone(),
            timeout: self.timeout(),
        }
    }

    pub fn token_path(&self) -> Result<PathBuf> {
        self.path_or_default(&self.token_path, "tokens.json")
    }

    pub fn favorites_path(&self) -> Result<PathBuf> {
        self.path_or_default(&self.favorites_path, "favorites_map.json")
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout)
    }

    fn path_or_default(&self, path: &Option<PathBuf>, filename: &str) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.clone()),
            None => Ok(dirs::config_dir()
                .ok_or_else(|| anyhow!("no config directory, set the path explicitly"))?
                .join("playbox")
                .join(filename)),
        }
    }

    fn require_credentials(&self) -> Result<()> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(anyhow!(
                "SONOS_CLIENT_ID and SONOS_CLIENT_SECRET must be configured"
            ));
        }
        Ok(())
    }
}

pub struct App {
    auth: Arc<SonosAuthenticator>,
    oauth: OAuthClient,
    api_client: ApiClient,
    aliases: AliasStore,
    public_url: String,
}

impl App {
    pub fn new(settings: &Settings) -> Result<App> {
        settings.require_credentials()?;

        let token_path = settings.token_path()?;
        log::debug!("token storage path: {:?}", token_path);

        let oauth = OAuthClient::new(settings.oauth_config())?;
        let auth = Arc::new(Authenticator::new(
            JsonTokenStorage::new(token_path),
            oauth.clone(),
        ));
        let api_client = ApiClient::new(settings.api_config(), auth.clone())?;

        Ok(Self {
            auth,
            oauth,
            api_client,
            aliases: AliasStore::new(settings.favorites_path()?),
            public_url: settings.public_url.clone(),
        })
    }

    pub fn into_web_state(self) -> AppState {
        AppState {
            auth: self.auth,
            oauth: self.oauth,
            api: self.api_client,
            aliases: self.aliases,
            public_url: self.public_url,
            pending_states: PendingStates::default(),
        }
    }

    pub async fn discover(&self) -> Result<(Vec<Household>, Vec<Group>)> {
        let households = self
            .api_client
            .households()
            .await
            .context("Failed to get households")?
            .households;

        let groups = match households.first() {
            Some(household) => {
                self.api_client
                    .groups(&household.id)
                    .await
                    .context("Failed to get groups")?
                    .groups
            }
            None => Vec::new(),
        };

        Ok((households, groups))
    }

    /// Seconds the current access token stays usable.
    pub async fn token_lifetime(&self) -> Result<i64> {
        let record = self.auth.current_record().await?;

        Ok(record.expires_at.saturating_sub(now()))
    }

    pub fn expiry_time(lifetime: i64) -> String {
        Utc.timestamp_opt(now().saturating_add(lifetime), 0)
            .single()
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Reads a tag dump and requests the URL found on it.
pub async fn trigger_tag(dump: &Path, timeout: Duration) -> Result<u16> {
    let data = std::fs::read(dump).with_context(|| format!("Failed to read {:?}", dump))?;

    let url = ndef::parse_ndef_uri(&data)
        .map(|uri| ndef::clean_uri(&uri))
        .ok_or_else(|| anyhow!("Could not find a valid NDEF URI record on the tag."))?;

    log::info!("triggering {}", url);

    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Error calling {}", url))?;

    Ok(response.status().as_u16())
}
