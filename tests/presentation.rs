use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Error as WsError, Message},
};
use tower::ServiceExt;

use tatami_back::{
    config::AppConfig,
    dao::match_store::memory::MemoryMatchStore,
    dto::token::MonitorClaims,
    routes,
    state::{AppState, SharedState},
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn state() -> SharedState {
    let state = AppState::new(AppConfig::default().with_token_secret("presentation-secret"));
    state
        .install_match_store(Arc::new(MemoryMatchStore::new()))
        .await;
    state
}

async fn serve(state: SharedState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn token(state: &SharedState) -> String {
    let claims = MonitorClaims {
        match_id: "m1".into(),
        org_id: "org".into(),
        tournament_id: "t1".into(),
    };
    state.tokens().issue(claims).unwrap().token
}

async fn connect(addr: SocketAddr, token: &str) -> Result<Socket, WsError> {
    connect_async(format!("ws://{addr}/ws/presentation?token={token}"))
        .await
        .map(|(socket, _)| socket)
}

fn refusal_status(err: WsError) -> StatusCode {
    match err {
        WsError::Http(response) => response.status(),
        other => panic!("expected an HTTP refusal, got {other:?}"),
    }
}

/// Next JSON envelope sent by the server.
async fn next_envelope(socket: &mut Socket) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(30), socket.next())
            .await
            .expect("envelope in time")
            .expect("socket open")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn presentation_status(app: &Router) -> Value {
    let request = Request::builder()
        .uri("/monitor/presentation")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn upgrade_is_refused_without_a_valid_token() {
    let state = state().await;
    let addr = serve(state.clone()).await;

    let err = connect(addr, "not-a-token").await.unwrap_err();
    assert_eq!(refusal_status(err), StatusCode::UNAUTHORIZED);

    let other = AppState::new(AppConfig::default().with_token_secret("someone-else"));
    let err = connect(addr, &token(&other)).await.unwrap_err();
    assert_eq!(refusal_status(err), StatusCode::UNAUTHORIZED);

    let status = presentation_status(&routes::router(state)).await;
    assert_eq!(status["connected"], false);
}

#[tokio::test]
async fn live_display_keeps_the_screen() {
    let state = state().await;
    let addr = serve(state.clone()).await;
    let token = token(&state);

    let mut first = connect(addr, &token).await.unwrap();
    let envelope = next_envelope(&mut first).await;
    assert_eq!(envelope["type"], "data");
    assert_eq!(envelope["payload"]["revision"], 0);

    let err = connect(addr, &token).await.unwrap_err();
    assert_eq!(refusal_status(err), StatusCode::CONFLICT);

    let status = presentation_status(&routes::router(state)).await;
    assert_eq!(status["connected"], true);
    assert_eq!(status["matchId"], "m1");
}

#[tokio::test(start_paused = true)]
async fn stale_display_is_taken_over() {
    let state = state().await;
    let addr = serve(state.clone()).await;
    let app = routes::router(state.clone());
    let token = token(&state);

    let mut first = connect(addr, &token).await.unwrap();
    assert_eq!(next_envelope(&mut first).await["type"], "data");

    // Pings go unanswered past the timeout.
    tokio::time::sleep(Duration::from_secs(25)).await;
    let status = presentation_status(&app).await;
    assert_eq!(status["connected"], true);
    assert_eq!(status["stale"], true);
    let stale_session = status["sessionId"].clone();

    let mut second = connect(addr, &token).await.unwrap();
    assert_eq!(next_envelope(&mut second).await["type"], "data");
    let status = presentation_status(&app).await;
    assert_eq!(status["stale"], false);
    assert_ne!(status["sessionId"], stale_session);

    // The superseded socket is closed on its next heartbeat.
    let closed = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            match first.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test(start_paused = true)]
async fn answered_pings_keep_the_display_live() {
    let state = state().await;
    let addr = serve(state.clone()).await;
    let app = routes::router(state.clone());

    let mut socket = connect(addr, &token(&state)).await.unwrap();
    let responder = tokio::spawn(async move {
        let mut pongs = 0;
        while let Some(Ok(message)) = socket.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let envelope: Value = serde_json::from_str(&text).unwrap();
            if envelope["type"] == "ping" {
                let pong = json!({ "type": "pong", "payload": { "seq": envelope["payload"]["seq"] } });
                if socket.send(Message::text(pong.to_string())).await.is_err() {
                    break;
                }
                pongs += 1;
            }
        }
        pongs
    });

    tokio::time::sleep(Duration::from_secs(60)).await;
    let status = presentation_status(&app).await;
    assert_eq!(status["connected"], true);
    assert_eq!(status["stale"], false);
    assert!(status["lastAckMsAgo"].as_u64().unwrap() < 15_000);

    responder.abort();
}
