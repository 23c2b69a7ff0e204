use std::{sync::Arc, time::Duration, time::SystemTime};

use axum::{
    Router,
    body::{Body, BodyDataStream},
    http::{Method, Request, StatusCode, header},
};
use futures::StreamExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use tatami_back::{
    config::AppConfig,
    dao::{
        match_store::{MatchStore, memory::MemoryMatchStore},
        models::MatchEntity,
    },
    routes,
    state::{
        AppState, SharedState,
        matches::{MatchRow, TournamentScope},
    },
};

const OPERATOR_KEY: &str = "operator-secret";

fn row(id: &str, court: &str, sort_order: i64) -> MatchRow {
    MatchRow {
        court_id: Some(court.into()),
        round_id: Some("r1".into()),
        sort_order,
        ..MatchRow::new(id)
    }
}

async fn seeded_state(config: AppConfig) -> SharedState {
    let state = AppState::new(config.with_token_secret("integration-secret"));
    let store = MemoryMatchStore::new();
    let scope = TournamentScope::new("org", "t1");
    let now = SystemTime::now();
    store
        .replace_matches(
            scope.clone(),
            vec![
                MatchEntity::from_row(&scope, row("m1", "c1", 1), now),
                MatchEntity::from_row(&scope, row("m2", "c1", 2), now),
            ],
        )
        .await
        .unwrap();
    state.install_match_store(Arc::new(store)).await;
    state
}

async fn app() -> Router {
    routes::router(seeded_state(AppConfig::default()).await)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(routes::operator::OPERATOR_KEY_HEADER, OPERATOR_KEY);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn open_draft(app: &Router) -> String {
    let (status, body) = call(app, Method::POST, "/tournaments/org/t1/drafts", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn edit_court(app: &Router, draft: &str, id: &str, court: &str) {
    let (_, body) = call(app, Method::GET, &format!("/drafts/{draft}"), None).await;
    let mut matches = body["matches"].as_array().unwrap().clone();
    for entry in matches.iter_mut() {
        if entry["id"] == id {
            entry["courtId"] = json!(court);
        }
    }
    let (status, _) = call(
        app,
        Method::PUT,
        &format!("/drafts/{draft}"),
        Some(json!({ "matches": matches })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

/// Reads named events off an SSE response body.
struct EventReader {
    stream: BodyDataStream,
    buffer: String,
}

impl EventReader {
    async fn open(app: &Router, uri: &str) -> Self {
        let request = Request::builder()
            .uri(uri)
            .header(routes::operator::OPERATOR_KEY_HEADER, OPERATOR_KEY)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        Self {
            stream: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }

    /// Data of the next event called `name`; other events are skipped.
    async fn next_named(&mut self, name: &str) -> Value {
        loop {
            while let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                let mut event = None;
                let mut data = String::new();
                for line in block.lines() {
                    if let Some(value) = line.strip_prefix("event: ") {
                        event = Some(value.to_string());
                    } else if let Some(value) = line.strip_prefix("data: ") {
                        data.push_str(value);
                    }
                }
                if event.as_deref() == Some(name) {
                    return serde_json::from_str(&data).unwrap();
                }
            }

            let chunk = tokio::time::timeout(Duration::from_secs(2), self.stream.next())
                .await
                .expect("event in time")
                .expect("stream open")
                .unwrap();
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }
}

fn court_of(matches: &Value, id: &str) -> Value {
    matches
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["id"] == id)
        .map(|entry| entry["courtId"].clone())
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn match_list_starts_at_version_zero() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/tournaments/org/t1/matches", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 0);
    assert_eq!(body["matches"].as_array().unwrap().len(), 2);
    assert_eq!(body["matches"][0]["id"], "m1");
}

#[tokio::test]
async fn malformed_scope_is_rejected_with_field_messages() {
    let app = app().await;
    let (status, body) = call(&app, Method::GET, "/tournaments/org%20x/t1/matches", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = body["fields"].as_object().unwrap();
    assert!(fields.keys().any(|field| field.starts_with("org")));
}

#[tokio::test]
async fn concurrent_edit_requires_confirmation_then_force_saves() {
    let app = app().await;
    let first = open_draft(&app).await;
    let second = open_draft(&app).await;

    edit_court(&app, &first, "m1", "c2").await;
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/drafts/{first}/save"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "saved");
    assert_eq!(body["version"], 1);

    edit_court(&app, &second, "m1", "c3").await;
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/drafts/{second}/save"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "confirm_overwrite");
    let detail = &body["report"]["details"][0];
    assert_eq!(detail["matchId"], "m1");
    assert_eq!(detail["conflicts"]["courtId"]["draftValue"], "c3");
    assert_eq!(detail["conflicts"]["courtId"]["serverValue"], "c2");

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/drafts/{second}/save"),
        Some(json!({ "force": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);
    assert_eq!(court_of(&body["matches"], "m1"), json!("c3"));

    let (_, list) = call(&app, Method::GET, "/tournaments/org/t1/matches", None).await;
    assert_eq!(list["version"], 2);
    assert_eq!(court_of(&list["matches"], "m1"), json!("c3"));
}

#[tokio::test]
async fn cancel_keeps_the_draft_after_a_conflict() {
    let app = app().await;
    let first = open_draft(&app).await;
    let second = open_draft(&app).await;

    edit_court(&app, &first, "m1", "c2").await;
    call(&app, Method::POST, &format!("/drafts/{first}/save"), Some(json!({}))).await;

    edit_court(&app, &second, "m1", "c3").await;
    let (status, _) = call(&app, Method::POST, &format!("/drafts/{second}/save"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(&app, Method::POST, &format!("/drafts/{second}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["savePhase"], "idle");
    assert_eq!(court_of(&body["matches"], "m1"), json!("c3"));

    let (status, _) = call(&app, Method::POST, &format!("/drafts/{second}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn background_changes_wait_for_a_merge() {
    let app = app().await;
    let editor = open_draft(&app).await;
    let watcher = open_draft(&app).await;

    edit_court(&app, &editor, "m2", "c5").await;
    call(&app, Method::POST, &format!("/drafts/{editor}/save"), Some(json!({}))).await;

    let (_, body) = call(&app, Method::GET, &format!("/drafts/{watcher}"), None).await;
    assert_eq!(body["pendingMerge"]["version"], 1);
    let change = &body["pendingMerge"]["report"]["details"][0];
    assert_eq!(change["matchId"], "m2");
    assert_eq!(change["serverChanges"]["courtId"]["initialValue"], "c1");
    assert_eq!(change["serverChanges"]["courtId"]["serverValue"], "c5");

    let (status, body) = call(&app, Method::POST, &format!("/drafts/{watcher}/merge"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["baselineVersion"], 1);
    assert!(body.get("pendingMerge").is_none());
    assert_eq!(court_of(&body["matches"], "m2"), json!("c5"));
}

#[tokio::test]
async fn rejected_changes_are_not_reported_again() {
    let app = app().await;
    let editor = open_draft(&app).await;
    let watcher = open_draft(&app).await;

    edit_court(&app, &editor, "m2", "c5").await;
    call(&app, Method::POST, &format!("/drafts/{editor}/save"), Some(json!({}))).await;

    let (status, body) = call(&app, Method::POST, &format!("/drafts/{watcher}/reject"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("pendingMerge").is_none());
    assert_eq!(court_of(&body["matches"], "m2"), json!("c1"));

    let (status, _) = call(&app, Method::POST, &format!("/drafts/{watcher}/merge"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn draft_stream_announces_pending_merges() {
    let app = app().await;
    let editor = open_draft(&app).await;
    let watcher = open_draft(&app).await;

    let mut events = EventReader::open(&app, &format!("/sse/drafts/{watcher}")).await;
    let handshake = events.next_named("handshake").await;
    assert_eq!(handshake["stream"], "draft");

    edit_court(&app, &editor, "m2", "c5").await;
    call(&app, Method::POST, &format!("/drafts/{editor}/save"), Some(json!({}))).await;

    let pending = events.next_named("draft.pending_merge").await;
    assert_eq!(pending["draftId"], watcher.as_str());
    assert_eq!(pending["version"], 1);
    assert_eq!(pending["report"]["details"][0]["matchId"], "m2");

    // A commit never asks its own draft to merge it.
    let (_, body) = call(&app, Method::GET, &format!("/drafts/{editor}"), None).await;
    assert!(body.get("pendingMerge").is_none());
}

#[tokio::test]
async fn rejected_version_is_not_streamed_again() {
    let app = app().await;
    let editor = open_draft(&app).await;
    let watcher = open_draft(&app).await;

    edit_court(&app, &editor, "m2", "c5").await;
    call(&app, Method::POST, &format!("/drafts/{editor}/save"), Some(json!({}))).await;
    let (status, _) = call(&app, Method::POST, &format!("/drafts/{watcher}/reject"), None).await;
    assert_eq!(status, StatusCode::OK);

    let mut events = EventReader::open(&app, &format!("/sse/drafts/{watcher}")).await;
    events.next_named("handshake").await;

    edit_court(&app, &editor, "m1", "c7").await;
    let (status, body) =
        call(&app, Method::POST, &format!("/drafts/{editor}/save"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 2);

    let pending = events.next_named("draft.pending_merge").await;
    assert_eq!(pending["version"], 2);
}

#[tokio::test]
async fn closed_drafts_are_gone() {
    let app = app().await;
    let draft = open_draft(&app).await;

    let (status, _) = call(&app, Method::DELETE, &format!("/drafts/{draft}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::GET, &format!("/drafts/{draft}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_rows_report_field_paths() {
    let app = app().await;
    let draft = open_draft(&app).await;

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/drafts/{draft}"),
        Some(json!({ "matches": [{ "id": "ok" }, { "id": "bad id" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["matches[1].id"].is_array());
}

#[tokio::test]
async fn duplicate_ids_are_rejected() {
    let app = app().await;
    let draft = open_draft(&app).await;

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/drafts/{draft}"),
        Some(json!({ "matches": [{ "id": "m1" }, { "id": "m1" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn storage_outage_returns_unavailable() {
    let state = AppState::new(AppConfig::default());
    let app = routes::router(state);

    let (status, _) = call(&app, Method::GET, "/tournaments/org/t1/matches", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, health) = call(&app, Method::GET, "/healthcheck", None).await;
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn monitor_players_and_scores() {
    let app = app().await;

    let (status, body) = call(
        &app,
        Method::PUT,
        "/monitor/players",
        Some(json!({
            "matchId": "m1",
            "playerA": { "displayName": "Sato", "teamName": "Kyoto" },
            "playerB": { "displayName": "Ito" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchId"], "m1");
    assert_eq!(body["playerA"]["displayName"], "Sato");

    let (_, body) = call(
        &app,
        Method::POST,
        "/monitor/score",
        Some(json!({ "side": "a", "delta": 2 })),
    )
    .await;
    assert_eq!(body["playerA"]["score"], 2);

    let (_, body) = call(
        &app,
        Method::POST,
        "/monitor/score",
        Some(json!({ "side": "b", "delta": -1 })),
    )
    .await;
    assert_eq!(body["playerB"]["score"], 0);

    let (_, body) = call(
        &app,
        Method::POST,
        "/monitor/hansoku",
        Some(json!({ "side": "b", "delta": 9 })),
    )
    .await;
    assert_eq!(body["playerB"]["hansoku"], 4);

    let (status, _) = call(
        &app,
        Method::POST,
        "/monitor/score",
        Some(json!({ "side": "a", "delta": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn monitor_timer_and_view_controls() {
    let app = app().await;

    let (_, body) = call(
        &app,
        Method::POST,
        "/monitor/timer/reset",
        Some(json!({ "durationMs": 120000, "mode": "countdown" })),
    )
    .await;
    assert_eq!(body["timer"]["remainingMs"], 120000);

    let (_, body) = call(&app, Method::POST, "/monitor/timer/start", None).await;
    assert_eq!(body["timer"]["running"], true);
    let (_, body) = call(&app, Method::POST, "/monitor/timer/stop", None).await;
    assert_eq!(body["timer"]["running"], false);

    let (_, body) = call(
        &app,
        Method::PUT,
        "/monitor/view",
        Some(json!({ "viewMode": "team_result" })),
    )
    .await;
    assert_eq!(body["viewMode"], "team_result");

    let (_, body) = call(
        &app,
        Method::PUT,
        "/monitor/visibility",
        Some(json!({ "visible": false })),
    )
    .await;
    assert_eq!(body["visible"], false);

    let revision = body["revision"].as_u64().unwrap();
    let (_, body) = call(&app, Method::POST, "/monitor/reset", None).await;
    assert!(body["revision"].as_u64().unwrap() > revision);
    assert_eq!(body["viewMode"], "head_to_head");

    let (_, status) = call(&app, Method::GET, "/monitor/presentation", None).await;
    assert_eq!(status["connected"], false);
}

#[tokio::test]
async fn monitor_token_round_trip_and_rejections() {
    let app = app().await;
    let claims = json!({ "matchId": "m1", "orgId": "org", "tournamentId": "t1" });

    let (status, issued) = call(&app, Method::POST, "/monitor/tokens", Some(claims)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(issued["expiresIn"], 300);
    let token = issued["token"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        Method::POST,
        "/monitor/tokens/validate",
        Some(json!({ "token": token, "matchId": "m1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matchId"], "m1");
    assert_eq!(body["tournamentId"], "t1");

    let (status, body) = call(
        &app,
        Method::POST,
        "/monitor/tokens/validate",
        Some(json!({ "token": token, "matchId": "m2" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "SCOPE_MISMATCH");

    let (head, signature) = token.rsplit_once('.').unwrap();
    let mut signature: Vec<char> = signature.chars().collect();
    let middle = signature.len() / 2;
    signature[middle] = if signature[middle] == 'A' { 'B' } else { 'A' };
    let tampered = format!("{head}.{}", signature.into_iter().collect::<String>());
    let (status, body) = call(
        &app,
        Method::POST,
        "/monitor/tokens/validate",
        Some(json!({ "token": tampered })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID");
}

#[tokio::test]
async fn operator_routes_require_the_configured_key() {
    let state = seeded_state(AppConfig::default().with_operator_key(OPERATOR_KEY)).await;
    let app = routes::router(state);

    let request = Request::builder()
        .uri("/tournaments/org/t1/matches")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/tournaments/org/t1/matches?operator_key=wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/tournaments/org/t1/matches", None).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/healthcheck")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn monitor_stream_replays_the_current_state() {
    let app = app().await;
    call(
        &app,
        Method::PUT,
        "/monitor/visibility",
        Some(json!({ "visible": false })),
    )
    .await;

    let request = Request::builder()
        .uri("/sse/monitor")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut stream = response.into_body().into_data_stream();
    let mut received = String::new();
    while !received.contains("event: monitor") {
        let chunk = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("monitor frame in time")
            .expect("stream open")
            .unwrap();
        received.push_str(&String::from_utf8_lossy(&chunk));
    }

    assert!(received.contains("event: handshake"));
    assert!(received.contains(r#""type":"data""#));
    assert!(received.contains(r#""visible":false"#));
}
