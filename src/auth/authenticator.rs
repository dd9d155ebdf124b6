use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::auth::endpoint::{EndpointError, TokenExchange};
use crate::auth::storage::{acquire_lock, StorageError, TokenStorage, LOCK_TIMEOUT};
use crate::auth::token::{now, TokenRecord, TokenResponse};

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Authorization code exchange failed: {0}")]
    AuthExchange(#[source] EndpointError),
    #[error("Failed to refresh access token: {0}")]
    Refresh(#[source] EndpointError),
    #[error("No refresh token available, authorize the application again")]
    NoRefreshToken,
}

/// Hands out access tokens that are valid right now, refreshing and
/// persisting them as needed.
///
/// The stale-check-and-refresh section is serialised twice: by an in-process
/// mutex and by the storage's advisory lock, so concurrent callers (or other
/// processes sharing the token file) trigger at most one refresh exchange.
#[derive(Debug)]
pub struct Authenticator<Storage, Exchange>
where
    Storage: TokenStorage,
    Exchange: TokenExchange,
{
    storage: Storage,
    exchange: Exchange,
    refresh_guard: Mutex<()>,
    lock_timeout: Duration,
}

impl<Storage, Exchange> Authenticator<Storage, Exchange>
where
    Storage: TokenStorage,
    Exchange: TokenExchange,
{
    pub fn new(storage: Storage, exchange: Exchange) -> Self {
        Self {
            storage,
            exchange,
            refresh_guard: Mutex::new(()),
            lock_timeout: LOCK_TIMEOUT,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn access_token(&self) -> Result<String, TokenError> {
        self.current_record().await.map(|record| record.access_token)
    }

    /// Like [`Self::access_token`] but returns the whole record.
    pub async fn current_record(&self) -> Result<TokenRecord, TokenError> {
        if let Some(record) = self.load_usable()? {
            if !record.is_stale() {
                return Ok(record);
            }
        }

        let _guard = self.refresh_guard.lock().await;
        let _lock = acquire_lock(&self.storage, self.lock_timeout).await?;

        // Someone may have refreshed while we were waiting.
        let current = self.load_usable()?;
        if let Some(record) = &current {
            if !record.is_stale() {
                log::debug!("token was refreshed by a concurrent caller");
                return Ok(record.clone());
            }
        }

        let previous = current
            .filter(TokenRecord::has_refresh_token)
            .ok_or(TokenError::NoRefreshToken)?;

        log::info!(
            "access token is stale (expires_at={}, now={}), refreshing",
            previous.expires_at,
            now()
        );

        let response = self
            .exchange
            .exchange_refresh_token(&previous.refresh_token)
            .await
            .map_err(TokenError::Refresh)?;

        let record = response.into_record(Some(previous.refresh_token.as_str()));
        self.storage.save(&record)?;

        log::info!("stored refreshed tokens, valid until {}", record.expires_at);

        Ok(record)
    }

    /// Persists the result of the initial authorization-code exchange.
    pub async fn store_initial_tokens(&self, response: TokenResponse) -> Result<(), TokenError> {
        if response.refresh_token.as_deref().unwrap_or_default().is_empty() {
            log::warn!("authorization server did not issue a refresh token");
        }

        let _guard = self.refresh_guard.lock().await;
        let _lock = acquire_lock(&self.storage, self.lock_timeout).await?;

        let record = response.into_record(None);
        self.storage.save(&record)?;

        log::info!(
            "stored initial tokens in {:?}, valid until {}",
            self.storage.location(),
            record.expires_at
        );

        Ok(())
    }

    /// Exchanges the code from the authorization callback and stores the result.
    pub async fn complete_authorization(&self, code: &str) -> Result<(), TokenError> {
        let response = self
            .exchange
            .exchange_authorization_code(code)
            .await
            .map_err(TokenError::AuthExchange)?;

        self.store_initial_tokens(response).await
    }

    /// Loads the record, treating an unreadable file as absent.
    fn load_usable(&self) -> Result<Option<TokenRecord>, TokenError> {
        match self.storage.load() {
            Ok(record) => Ok(record),
            Err(err @ (StorageError::Corrupt { .. } | StorageError::Read { .. })) => {
                log::warn!("ignoring stored tokens: {}", err);
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}
