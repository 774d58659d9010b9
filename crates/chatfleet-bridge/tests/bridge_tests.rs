// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge client against an in-process fake sidecar.

use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

use chatfleet_bridge::BridgeClient;
use chatfleet_config::model::BridgeConfig;
use chatfleet_core::{
    ChallengeCallback, ChatClient, ChatSession, Credentials, FleetError, HealthStatus,
    LoginChallenge, PluginAdapter, RawEventKind, UploadMeta,
};

/// Starts a fake sidecar and returns its URL.
async fn spawn_sidecar() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream));
        }
    });
    format!("ws://{addr}")
}

async fn serve(stream: TcpStream) {
    let Ok(socket) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut sink, mut reader) = socket.split();
    while let Some(Ok(msg)) = reader.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let req: Value = serde_json::from_str(text.as_str()).unwrap();
        let id = req["id"].clone();
        let tenant = req["tenant"].as_str().unwrap_or_default().to_string();
        let params = &req["params"];
        let ok = |result: Value| json!({"type": "res", "id": id, "ok": true, "result": result});
        let fail = |code: &str| {
            json!({"type": "res", "id": id, "ok": false, "error": {"code": code, "message": "sidecar says no"}})
        };

        let frames = match req["method"].as_str().unwrap_or_default() {
            "login" if params["credentials"]["token"] == "bad" => vec![fail("auth")],
            "login" => vec![ok(json!({"accountId": format!("acc-{tenant}")}))],
            "qr_login" => vec![
                json!({"type": "event", "tenant": tenant, "event": "qr", "payload": {"code": "qr-123"}}),
                ok(json!({"accountId": format!("acc-{tenant}"), "credentials": {"token": "fresh", "n": 1}})),
            ],
            "own_profile" => vec![
                json!({"type": "event", "tenant": tenant, "event": "message", "payload": {"msgId": "m-1"}}),
                ok(json!({"userId": format!("acc-{tenant}"), "globalId": "G-self"})),
            ],
            "get_profile" if params["userId"] == "404" => vec![fail("not_found")],
            "get_profile" => vec![ok(json!({
                "userId": params["userId"],
                "globalId": format!("G-{}", params["userId"].as_str().unwrap_or_default()),
                "displayName": "Ana",
            }))],
            "list_groups" if tenant == "t-slow" => vec![],
            "list_groups" => vec![ok(json!(["g1", "g2"]))],
            "get_group_profiles" => {
                let groups: Vec<Value> = params["groupIds"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|id| json!({"groupId": id, "name": "Team"}))
                    .collect();
                vec![ok(Value::Array(groups))]
            }
            "list_contacts" if tenant == "t-drop" => return,
            "list_contacts" => vec![ok(json!([]))],
            "upload" => {
                let size = STANDARD
                    .decode(params["data"].as_str().unwrap_or_default())
                    .map(|bytes| bytes.len())
                    .unwrap_or(0);
                vec![ok(json!({
                    "url": format!("https://cdn.invalid/{}", params["filename"].as_str().unwrap_or_default()),
                    "fileId": size.to_string(),
                }))]
            }
            "logout" => vec![ok(Value::Null)],
            _ => vec![fail("unsupported")],
        };
        for frame in frames {
            if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                return;
            }
        }
    }
}

async fn client() -> BridgeClient {
    BridgeClient::new(&BridgeConfig {
        url: spawn_sidecar().await,
        request_timeout_secs: 1,
    })
}

fn creds(token: &str) -> Credentials {
    Credentials::from_json(&json!({ "token": token }))
}

#[tokio::test]
async fn credential_login_and_lookups() {
    let client = client().await;
    let session = client.login("t1", &creds("ok")).await.unwrap();
    assert_eq!(session.account_id(), "acc-t1");

    let profile = session.get_profile("42").await.unwrap().unwrap();
    assert_eq!(profile.global_id.as_deref(), Some("G-42"));
    assert_eq!(profile.display_name.as_deref(), Some("Ana"));
    assert!(session.get_profile("404").await.unwrap().is_none());

    let ids = session.list_groups().await.unwrap();
    assert_eq!(ids, vec!["g1".to_string(), "g2".to_string()]);
    let groups = session.get_group_profiles(&ids).await.unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[1].group_id, "g2");

    assert_eq!(client.health_check().await.unwrap(), HealthStatus::Healthy);
}

#[tokio::test]
async fn rejected_credentials_are_auth_errors() {
    let client = client().await;
    match client.login("t1", &creds("bad")).await {
        Err(e) => assert!(e.is_auth(), "unexpected error: {e}"),
        Ok(_) => panic!("login with bad credentials succeeded"),
    }
}

#[tokio::test]
async fn qr_login_forwards_challenge() {
    let client = client().await;
    let seen: Arc<Mutex<Vec<LoginChallenge>>> = Arc::default();
    let sink = seen.clone();
    let on_challenge: ChallengeCallback = Arc::new(move |c| sink.lock().unwrap().push(c));

    let Ok((session, credentials)) = client.start_interactive_login("t1", on_challenge).await
    else {
        panic!("QR login failed");
    };
    assert_eq!(session.account_id(), "acc-t1");
    assert_eq!(credentials.to_json(), json!({"token": "fresh", "n": 1}));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].tenant_id, "t1");
    assert_eq!(seen[0].code, "qr-123");
}

#[tokio::test]
async fn events_reach_the_tenant_stream() {
    let client = client().await;
    let session = client.login("t1", &creds("ok")).await.unwrap();
    let mut events = session.subscribe();

    session.own_profile().await.unwrap();
    let event = events.try_recv().unwrap();
    assert_eq!(event.kind, RawEventKind::Message);
    assert_eq!(event.payload["msgId"], "m-1");
}

#[tokio::test]
async fn upload_sends_base64_bytes() {
    let client = client().await;
    let session = client.login("t1", &creds("ok")).await.unwrap();
    let media = session
        .upload(
            vec![7u8; 300],
            UploadMeta {
                kind: "video".into(),
                filename: "clip.mp4".into(),
                thread_id: "th-1".into(),
                is_group: false,
                size: 300,
                local_path: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(media.url.as_deref(), Some("https://cdn.invalid/clip.mp4"));
    assert_eq!(media.file_id.as_deref(), Some("300"));
}

#[tokio::test]
async fn socket_loss_closes_streams_and_reconnects_lazily() {
    let client = client().await;
    let session = client.login("t-drop", &creds("ok")).await.unwrap();
    let mut events = session.subscribe();

    let err = session.list_contacts().await.unwrap_err();
    assert!(matches!(err, FleetError::Transport { .. }), "unexpected error: {err}");

    let closed = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(closed.kind, RawEventKind::Closed);

    // Next use opens a fresh socket.
    let again = client.login("t2", &creds("ok")).await.unwrap();
    assert_eq!(again.list_groups().await.unwrap().len(), 2);
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let client = client().await;
    let session = client.login("t-slow", &creds("ok")).await.unwrap();
    let err = session.list_groups().await.unwrap_err();
    assert!(matches!(err, FleetError::Timeout { .. }));
}

#[tokio::test]
async fn closed_session_refuses_calls() {
    let client = client().await;
    let session = client.login("t1", &creds("ok")).await.unwrap();
    session.close().await;
    session.close().await;
    assert!(matches!(
        session.list_groups().await,
        Err(FleetError::Transport { .. })
    ));
}

#[tokio::test]
async fn health_is_degraded_before_first_use() {
    let client = client().await;
    assert!(matches!(
        client.health_check().await.unwrap(),
        HealthStatus::Degraded(_)
    ));
}
