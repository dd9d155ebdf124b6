//! Browser-facing endpoints: authorization, album playback, volume and the alias editor.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;

use crate::api::ApiClient;
use crate::auth::endpoint::OAuthClient;
use crate::auth::storage::JsonTokenStorage;
use crate::auth::Authenticator;
use crate::favorites::AliasStore;

pub use error::WebError;

pub mod error;
pub mod pages;
pub mod routes;

pub type SonosAuthenticator = Authenticator<JsonTokenStorage, OAuthClient>;

/// How long an issued authorization `state` stays acceptable.
const STATE_TTL: Duration = Duration::from_secs(10 * 60);

pub struct AppState {
    pub auth: Arc<SonosAuthenticator>,
    pub oauth: OAuthClient,
    pub api: ApiClient,
    pub aliases: AliasStore,
    pub public_url: String,
    pub pending_states: PendingStates,
}

pub type SharedState = Arc<AppState>;

/// CSRF `state` values handed out by `/authorize`, each usable once.
#[derive(Debug, Default)]
pub struct PendingStates {
    issued: Mutex<HashMap<String, Instant>>,
}

impl PendingStates {
    pub fn issue(&self) -> String {
        let state = uuid::Uuid::new_v4().simple().to_string();
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);

        issued.retain(|_, at| at.elapsed() < STATE_TTL);
        issued.insert(state.clone(), Instant::now());

        state
    }

    /// Consumes `state`, returning whether it was issued and is still fresh.
    pub fn take(&self, state: &str) -> bool {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);

        matches!(issued.remove(state), Some(at) if at.elapsed() < STATE_TTL)
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/authorize", get(routes::authorize))
        .route("/callback", get(routes::callback))
        .route("/play", get(routes::play))
        .route("/volume", get(routes::volume))
        .route(
            "/favorites",
            get(routes::favorites).post(routes::save_favorites),
        )
        .route("/discover", get(routes::discover))
        .with_state(state)
}

pub async fn serve(state: SharedState, listen: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests;
