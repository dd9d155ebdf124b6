use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_json, body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::api::{self, ApiClient};
use crate::auth::endpoint::tests::config as oauth_config;
use crate::auth::storage::TokenStorage;
use crate::auth::token::{now, TokenRecord};
use crate::favorites::AliasMap;

struct Harness {
    server: MockServer,
    dir: TempDir,
    state: SharedState,
}

impl Harness {
    async fn new(record: Option<TokenRecord>) -> Self {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        let oauth = OAuthClient::new(oauth_config(&server)).unwrap();
        let storage = JsonTokenStorage::new(dir.path().join("tokens.json"));
        if let Some(record) = record {
            storage.save(&record).unwrap();
        }

        let auth = Arc::new(Authenticator::new(storage, oauth.clone()));
        let api_config = api::Config {
            control_url: format!("{}/control/api/v1/", server.uri()),
            household_id: "HH".to_string(),
            player_name: "Kitchen".to_string(),
            timeout: Duration::from_secs(5),
        };
        let api = ApiClient::new(api_config, auth.clone()).unwrap();

        let state = Arc::new(AppState {
            auth,
            oauth,
            api,
            aliases: AliasStore::new(dir.path().join("favorites_map.json")),
            public_url: "https://box.example".to_string(),
            pending_states: PendingStates::default(),
        });

        Self { server, dir, state }
    }

    async fn authorized() -> Self {
        Self::new(Some(TokenRecord {
            access_token: "A".to_string(),
            refresh_token: "R".to_string(),
            expires_at: now() + 3600,
        }))
        .await
    }

    fn router(&self) -> Router {
        router(self.state.clone())
    }

    fn with_aliases(self, aliases: &[(&str, &str)]) -> Self {
        let mut map = AliasMap::default();
        for (alias, favorite) in aliases {
            map.insert(alias, favorite);
        }
        self.state.aliases.save(&map).unwrap();
        self
    }

    async fn mount_groups(&self) {
        Mock::given(method("GET"))
            .and(path("/control/api/v1/households/HH/groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "groups": [
                    {"id": "G-LIVING", "name": "Living + Kitchen", "playerIds": ["P-LIVING", "P-KITCHEN"]}
                ],
                "players": [
                    {"id": "P-LIVING", "name": "Living Room"},
                    {"id": "P-KITCHEN", "name": "Kitchen"}
                ]
            })))
            .mount(&self.server)
            .await;
    }
}

async fn get(router: Router, uri: &str) -> (StatusCode, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[test]
fn states_are_single_use() {
    let states = PendingStates::default();
    let state = states.issue();

    assert_eq!(state.len(), 32);
    assert!(states.take(&state));
    assert!(!states.take(&state));
    assert!(!states.take("forged"));
}

#[tokio::test]
async fn play_isolates_the_player_and_starts_the_favorite() {
    let harness = Harness::authorized()
        .await
        .with_aliases(&[("doolittle", "7")]);
    harness.mount_groups().await;

    Mock::given(method("POST"))
        .and(path("/control/api/v1/households/HH/groups/createGroup"))
        .and(body_json(json!({"playerIds": ["P-KITCHEN"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "group": {"id": "G-KITCHEN", "name": "Kitchen"}
        })))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/control/api/v1/groups/G-KITCHEN/favorites"))
        .and(body_json(json!({
            "favoriteId": "7",
            "playOnCompletion": false,
            "action": "REPLACE"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/control/api/v1/groups/G-KITCHEN/playback/play"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let (status, body) = get(harness.router(), "/play?album=doolittle").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Playing on Kitchen"));
    assert!(body.contains("Doolittle"));
}

#[tokio::test]
async fn play_without_album_is_a_bad_request() {
    let harness = Harness::authorized().await;

    let (status, body) = get(harness.router(), "/play").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("No album specified"));
}

#[tokio::test]
async fn play_unknown_alias_is_not_found() {
    let harness = Harness::authorized()
        .await
        .with_aliases(&[("doolittle", "7")]);

    let (status, body) = get(harness.router(), "/play?album=surfer-rosa").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("surfer-rosa"));
}

#[tokio::test]
async fn play_reports_missing_player() {
    let harness = Harness::authorized()
        .await
        .with_aliases(&[("doolittle", "7")]);
    Mock::given(method("GET"))
        .and(path("/control/api/v1/households/HH/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "groups": [], "players": [{"id": "P-LIVING", "name": "Living Room"}]
        })))
        .mount(&harness.server)
        .await;

    let (status, body) = get(harness.router(), "/play?album=doolittle").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Could not find the player named &#039;Kitchen&#039;"));
}

#[tokio::test]
async fn play_fails_when_group_cannot_be_created() {
    let harness = Harness::authorized()
        .await
        .with_aliases(&[("doolittle", "7")]);
    harness.mount_groups().await;
    Mock::given(method("POST"))
        .and(path("/control/api/v1/households/HH/groups/createGroup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/control/api/v1/groups/G-KITCHEN/playback/play"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    let (status, body) = get(harness.router(), "/play?album=doolittle").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Could not isolate the speaker"));
}

#[tokio::test]
async fn play_fails_when_sonos_rejects_the_new_group() {
    let harness = Harness::authorized()
        .await
        .with_aliases(&[("doolittle", "7")]);
    harness.mount_groups().await;
    Mock::given(method("POST"))
        .and(path("/control/api/v1/households/HH/groups/createGroup"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"errorCode": "ERROR_CONFLICT"})),
        )
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/control/api/v1/groups/G-KITCHEN/favorites"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    let (status, body) = get(harness.router(), "/play?album=doolittle").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Could not isolate the speaker"));
    assert!(body.contains("ERROR_CONFLICT"));
}

#[tokio::test]
async fn play_fails_when_the_new_group_is_unreadable() {
    let harness = Harness::authorized()
        .await
        .with_aliases(&[("doolittle", "7")]);
    harness.mount_groups().await;
    Mock::given(method("POST"))
        .and(path("/control/api/v1/households/HH/groups/createGroup"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&harness.server)
        .await;

    let (status, body) = get(harness.router(), "/play?album=doolittle").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Could not isolate the speaker"));
}

#[tokio::test]
async fn play_shows_the_sonos_error_body() {
    let harness = Harness::authorized()
        .await
        .with_aliases(&[("doolittle", "7")]);
    harness.mount_groups().await;
    Mock::given(method("POST"))
        .and(path("/control/api/v1/households/HH/groups/createGroup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "G-KITCHEN"})))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/control/api/v1/groups/G-KITCHEN/favorites"))
        .respond_with(ResponseTemplate::new(400).set_body_string("ERROR_INVALID_FAVORITE"))
        .mount(&harness.server)
        .await;

    let (status, body) = get(harness.router(), "/play?album=doolittle").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("Could not play the album"));
    assert!(body.contains("ERROR_INVALID_FAVORITE"));
}

#[tokio::test]
async fn play_without_tokens_is_a_server_error() {
    let harness = Harness::new(None).await.with_aliases(&[("doolittle", "7")]);

    let (status, body) = get(harness.router(), "/play?album=doolittle").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Error retrieving access token"));
}

#[tokio::test]
async fn stale_token_is_refreshed_before_the_control_call() {
    let harness = Harness::new(Some(TokenRecord {
        access_token: "A".to_string(),
        refresh_token: "R".to_string(),
        expires_at: now() + 30,
    }))
    .await;

    Mock::given(method("POST"))
        .and(path("/login/v3/oauth/access"))
        .and(body_string("grant_type=refresh_token&refresh_token=R"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "B",
            "refresh_token": "R2",
            "expires_in": 86400
        })))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/control/api/v1/households/HH/groups"))
        .and(wiremock::matchers::header("authorization", "Bearer B"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "groups": [{"id": "G1", "name": "Kitchen", "playerIds": ["P1"]}],
            "players": [{"id": "P1", "name": "Kitchen"}]
        })))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/control/api/v1/groups/G1/groupVolume"))
        .and(body_json(json!({"volume": 35})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let (status, body) = get(harness.router(), "/volume?level=35").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("has been set to 35%"));

    let stored = harness.state.auth.storage().load().unwrap().unwrap();
    assert_eq!(stored.access_token, "B");
    assert_eq!(stored.refresh_token, "R2");
}

#[tokio::test]
async fn volume_rejects_bad_levels_without_calling_sonos() {
    let harness = Harness::authorized().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    for uri in ["/volume", "/volume?level=", "/volume?level=101", "/volume?level=-1", "/volume?level=loud"] {
        let (status, _) = get(harness.router(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn volume_reports_player_outside_any_group() {
    let harness = Harness::authorized().await;
    Mock::given(method("GET"))
        .and(path("/control/api/v1/households/HH/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "groups": [{"id": "G1", "name": "Living Room", "playerIds": ["P-LIVING"]}],
            "players": [{"id": "P-KITCHEN", "name": "Kitchen"}]
        })))
        .mount(&harness.server)
        .await;

    let (status, body) = get(harness.router(), "/volume?level=10").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Could not find a group containing the player"));
}

#[tokio::test]
async fn authorize_links_to_sonos_with_a_fresh_state() {
    let harness = Harness::authorized().await;

    let (status, body) = get(harness.router(), "/authorize").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("/login/v3/oauth?client_id=client"));
    assert!(body.contains("scope=playback-control-all"));
}

#[tokio::test]
async fn callback_rejects_unknown_state() {
    let harness = Harness::new(None).await;
    Mock::given(method("POST"))
        .and(path("/login/v3/oauth/access"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.server)
        .await;

    let (status, body) = get(harness.router(), "/callback?state=forged&code=C").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid state"));

    let (status, _) = get(harness.router(), "/callback?code=C").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_stores_exchanged_tokens() {
    let harness = Harness::new(None).await;
    Mock::given(method("POST"))
        .and(path("/login/v3/oauth/access"))
        .and(body_string(
            "grant_type=authorization_code&code=C&redirect_uri=https%3A%2F%2Fbox.example%2Fcallback",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "A",
            "refresh_token": "R",
            "expires_in": 86400
        })))
        .expect(1)
        .mount(&harness.server)
        .await;

    let csrf = harness.state.pending_states.issue();
    let (status, body) = get(harness.router(), &format!("/callback?state={}&code=C", csrf)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Success!"));

    let stored = harness.state.auth.storage().load().unwrap().unwrap();
    assert_eq!(stored.access_token, "A");
    assert_eq!(stored.refresh_token, "R");
    assert!(!stored.is_stale());

    let (status, _) = get(harness.router(), &format!("/callback?state={}&code=C", csrf)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_without_code_is_a_bad_request() {
    let harness = Harness::new(None).await;
    let csrf = harness.state.pending_states.issue();

    let (status, body) = get(harness.router(), &format!("/callback?state={}", csrf)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Authorization code not found"));
}

#[tokio::test]
async fn favorites_page_prunes_aliases_of_removed_favorites() {
    let harness = Harness::authorized()
        .await
        .with_aliases(&[("doolittle", "7"), ("gone", "99")]);
    Mock::given(method("GET"))
        .and(path("/control/api/v1/households/HH/favorites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "7", "name": "Doolittle", "description": "Pixies"}]
        })))
        .mount(&harness.server)
        .await;

    let (status, body) = get(harness.router(), "/favorites?saved=true").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Aliases have been saved successfully!"));
    assert!(body.contains("https://box.example/play?album=doolittle"));

    let aliases = harness.state.aliases.load();
    assert_eq!(aliases.len(), 1);
    assert_eq!(aliases.favorite_for("gone"), None);
}

#[tokio::test]
async fn saving_favorites_replaces_the_alias_map() {
    let harness = Harness::authorized()
        .await
        .with_aliases(&[("old", "1")]);

    let response = harness
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/favorites")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "aliases%5B7%5D=+doolittle+&aliases%5B8%5D=&aliases%5B9%5D=surfer-rosa",
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/favorites?saved=true"
    );

    let aliases = harness.state.aliases.load();
    assert_eq!(aliases.len(), 2);
    assert_eq!(aliases.favorite_for("doolittle"), Some("7"));
    assert_eq!(aliases.favorite_for("surfer-rosa"), Some("9"));
    assert_eq!(aliases.favorite_for("old"), None);
    assert!(harness.dir.path().join("favorites_map.json").exists());
}

#[tokio::test]
async fn discover_lists_households_and_groups() {
    let harness = Harness::authorized().await;
    Mock::given(method("GET"))
        .and(path("/control/api/v1/households"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "households": [{"id": "Sonos_HH.1"}]
        })))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/control/api/v1/households/Sonos_HH.1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "groups": [{"id": "G1", "name": "Kitchen", "playerIds": ["P1"]}],
            "players": [{"id": "P1", "name": "Kitchen"}]
        })))
        .mount(&harness.server)
        .await;

    let (status, body) = get(harness.router(), "/discover").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Household ID: <b>Sonos_HH.1</b>"));
    assert!(body.contains("Group ID: <b>G1</b>"));
}
