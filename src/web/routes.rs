use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, Redirect};
use axum::Form;
use serde::Deserialize;

use crate::favorites::AliasMap;
use crate::utils::Utils;
use crate::web::{pages, SharedState, WebError};

type Page = Result<Html<String>, WebError>;

pub async fn index() -> Html<String> {
    Html(pages::index())
}

/// GET /authorize: Issue a CSRF state and link to the Sonos login page.
pub async fn authorize(State(state): State<SharedState>) -> Page {
    log::info!("GET /authorize");

    let csrf = state.pending_states.issue();
    let url = state
        .oauth
        .config()
        .authorize_url(&csrf)
        .map_err(|err| WebError::Internal(format!("Invalid authorization url: {}", err)))?;

    Ok(Html(pages::authorize(url.as_str())))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    state: Option<String>,
    code: Option<String>,
}

/// GET /callback: Finish the authorization-code flow.
pub async fn callback(
    State(state): State<SharedState>,
    Query(query): Query<CallbackQuery>,
) -> Page {
    log::info!("GET /callback");

    let csrf = query.state.as_deref().unwrap_or_default();
    if csrf.is_empty() || !state.pending_states.take(csrf) {
        return Err(WebError::InvalidState);
    }

    let code = query
        .code
        .ok_or_else(|| WebError::BadRequest("Authorization code not found.".to_string()))?;

    state.auth.complete_authorization(&code).await?;

    Ok(Html(pages::authorized()))
}

#[derive(Debug, Deserialize)]
pub struct PlayQuery {
    album: Option<String>,
}

/// GET /play?album=<alias>: Isolate the player and play the aliased favorite.
pub async fn play(State(state): State<SharedState>, Query(query): Query<PlayQuery>) -> Page {
    let alias = query
        .album
        .ok_or_else(|| WebError::BadRequest("Error: No album specified.".to_string()))?;

    log::info!("GET /play album={}", alias);

    let aliases = state.aliases.load();
    let favorite = aliases.favorite_for(&alias).ok_or_else(|| {
        WebError::NotFound(format!(
            "Error: Album alias '{}' not found in configuration.",
            alias
        ))
    })?;

    let config = state.api.config();
    let player = config.player_name.as_str();

    let groups = state
        .api
        .groups(&config.household_id)
        .await
        .map_err(WebError::api("Could not list the speakers in the household."))?;

    let player_id = groups.player_id(player).ok_or_else(|| {
        WebError::NotFound(format!(
            "Error: Could not find the player named '{}'. Is the speaker online?",
            player
        ))
    })?;

    let isolate_failed = format!(
        "Error: Could not isolate the speaker. Failed to create a new group for '{}'.",
        player
    );
    let group = state
        .api
        .create_group(&config.household_id, player_id)
        .await
        .map_err(WebError::api_with_status(
            isolate_failed.clone(),
            StatusCode::INTERNAL_SERVER_ERROR,
        ))?
        .ok_or(WebError::Internal(isolate_failed))?;

    let play_failed = "Could not play the album. There was an issue with the Sonos API.";
    state
        .api
        .load_favorite(&group, favorite)
        .await
        .map_err(WebError::api(play_failed))?;
    state
        .api
        .play(&group)
        .await
        .map_err(WebError::api(play_failed))?;

    Ok(Html(pages::playing(player, &Utils::album_title(&alias))))
}

#[derive(Debug, Deserialize)]
pub struct VolumeQuery {
    level: Option<String>,
}

/// GET /volume?level=<0..100>: Set the volume of the group holding the player.
pub async fn volume(State(state): State<SharedState>, Query(query): Query<VolumeQuery>) -> Page {
    let level = parse_level(query.level.as_deref())?;

    log::info!("GET /volume level={}", level);

    let config = state.api.config();
    let player = config.player_name.as_str();

    let groups = state
        .api
        .groups(&config.household_id)
        .await
        .map_err(WebError::api("Could not list the speakers in the household."))?;

    let group = groups.group_for_player(player).ok_or_else(|| {
        WebError::NotFound(format!(
            "Error: Could not find a group containing the player named '{}'. Is the speaker online?",
            player
        ))
    })?;

    state
        .api
        .set_group_volume(&group.id, level)
        .await
        .map_err(WebError::api(
            "Could not set the volume. There was an issue with the Sonos API.",
        ))?;

    Ok(Html(pages::volume_set(player, level)))
}

fn parse_level(level: Option<&str>) -> Result<u8, WebError> {
    let level = level.map(str::trim).filter(|level| !level.is_empty()).ok_or_else(|| {
        WebError::BadRequest(
            "Error: No volume level specified. Please add ?level=X to the URL, where X is 0-100."
                .to_string(),
        )
    })?;

    match level.parse::<i64>() {
        Ok(level @ 0..=100) => Ok(level as u8),
        _ => Err(WebError::BadRequest(
            "Error: Volume level must be between 0 and 100.".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct FavoritesQuery {
    saved: Option<String>,
}

/// GET /favorites: Alias editor, dropping aliases for removed favorites.
pub async fn favorites(
    State(state): State<SharedState>,
    Query(query): Query<FavoritesQuery>,
) -> Page {
    log::info!("GET /favorites");

    let favorites = state
        .api
        .favorites(&state.api.config().household_id)
        .await
        .map_err(WebError::api("Could not load favorites from Sonos."))?;

    let mut aliases = state.aliases.load();
    if aliases.prune(favorites.items.iter().map(|item| item.id.as_str())) {
        log::info!("removed aliases for favorites that no longer exist");
        state.aliases.save(&aliases)?;
    }

    Ok(Html(pages::favorites(
        &favorites.items,
        &aliases,
        &state.public_url,
        query.saved.is_some(),
    )))
}

/// POST /favorites: Replace the alias map with the submitted form.
pub async fn save_favorites(
    State(state): State<SharedState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Redirect, WebError> {
    let aliases = AliasMap::from_form(
        fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str())),
    );

    log::info!("POST /favorites ({} aliases)", aliases.len());

    state.aliases.save(&aliases)?;

    Ok(Redirect::to("/favorites?saved=true"))
}

/// GET /discover: Households and the groups of the first one.
pub async fn discover(State(state): State<SharedState>) -> Page {
    log::info!("GET /discover");

    let households = state
        .api
        .households()
        .await
        .map_err(WebError::api("Failed to get households."))?
        .households;

    let groups = match households.first() {
        Some(household) => {
            state
                .api
                .groups(&household.id)
                .await
                .map_err(WebError::api("Failed to get groups."))?
                .groups
        }
        None => Vec::new(),
    };

    Ok(Html(pages::discover(&households, &groups)))
}
