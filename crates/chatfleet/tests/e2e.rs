// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the assembled service.
//!
//! Each test builds an isolated [`App`] over a temp SQLite database and the
//! stub chat client. Tests are independent and order-insensitive.

use std::sync::Arc;
use std::time::Duration;

use chatfleet::App;
use chatfleet_config::FleetConfig;
use chatfleet_core::{
    ChallengeCallback, ChatClient, ConversationKind, FleetError, FleetStore, IdentityKind,
    RawEventKind, RemoteGroupProfile, RemoteProfile, TenantState,
};
use chatfleet_media::{MediaInput, MediaKind};
use chatfleet_test_utils::StubClient;
use serde_json::json;
use tempfile::TempDir;

struct Env {
    app: App,
    client: Arc<StubClient>,
    dir: TempDir,
}

impl Env {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(StubClient::new());
        let app = build_app(&dir, client.clone()).await;
        Self { app, client, dir }
    }

    async fn login(&self, tenant: &str) {
        self.app.add_tenant(tenant, None).await.unwrap();
        let on_challenge: ChallengeCallback = Arc::new(|_| {});
        self.app
            .manager
            .start_interactive_login(tenant, on_challenge)
            .await
            .unwrap();
    }
}

async fn build_app(dir: &TempDir, client: Arc<StubClient>) -> App {
    let mut config = FleetConfig::default();
    config.storage.database_path = dir.path().join("e2e.db").to_string_lossy().into_owned();
    config.media.temp_dir = Some(dir.path().join("media").to_string_lossy().into_owned());
    config.session.reconnect_backoff_ms = 10;
    config.session.reconnect_max_backoff_ms = 50;
    let client: Arc<dyn ChatClient> = client;
    App::build(config, client).await.unwrap()
}

fn customer(id: &str, global: &str) -> RemoteProfile {
    RemoteProfile {
        user_id: id.into(),
        global_id: Some(global.into()),
        display_name: Some("Ana".into()),
        avatar: None,
        is_friend: false,
    }
}

// ---- Test 1: QR login through first inbound message ----

#[tokio::test]
async fn test_qr_login_then_inbound_text() {
    let env = Env::new().await;
    let mut notifications = env.app.bus.subscribe_topic("t1");
    env.login("t1").await;
    assert_eq!(env.app.manager.state("t1"), Some(TenantState::LoggedIn));

    let session = env.client.session("t1");
    session.add_profile(customer("U1", "G-ana"));
    session.emit(
        RawEventKind::Message,
        json!({"uidFrom": "U1", "threadId": "U1", "msgType": "text", "content": "hello"}),
    );

    let notification = tokio::time::timeout(Duration::from_secs(5), notifications.recv())
        .await
        .expect("notification in time")
        .expect("bus open");

    let identity = env
        .app
        .store
        .find_identity_by_connection("t1", "U1")
        .await
        .unwrap()
        .expect("customer identity");
    assert_eq!(identity.kind, IdentityKind::Customer);
    assert_eq!(identity.canonical_id, "G-ana");

    let conversation = env
        .app
        .store
        .find_conversation_by_membership("t1", "U1")
        .await
        .unwrap()
        .expect("private conversation");
    assert_eq!(conversation.kind, ConversationKind::Private);
    assert_eq!(notification.topic, format!("t1:{}", conversation.id));

    let messages = env
        .app
        .store
        .list_messages(&conversation.id, 10)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, json!({"type": "text", "text": "hello"}));
    assert_eq!(messages[0].listening_tenants, vec!["t1".to_string()]);

    // The tenant's own bot identity plus the customer.
    let counts = env.app.store.row_counts().await.unwrap();
    assert_eq!(counts.identities, 2);
    assert_eq!(counts.conversations, 1);
    assert_eq!(counts.messages, 1);

    // Exactly one notification.
    let extra = tokio::time::timeout(Duration::from_millis(100), notifications.recv()).await;
    assert!(extra.is_err(), "unexpected second notification");
}

// ---- Test 2: Replayed events are idempotent ----

#[tokio::test]
async fn test_replayed_message_is_stored_once() {
    let env = Env::new().await;
    env.login("t1").await;
    let mut notifications = env.app.bus.subscribe_topic("t1");

    let session = env.client.session("t1");
    session.add_profile(customer("u-1", "G-ana"));
    let payload = json!({"msgId": "m-1", "uidFrom": "u-1", "content": "hello"});
    session.emit(RawEventKind::Message, payload.clone());
    session.emit(RawEventKind::Message, payload);

    tokio::time::timeout(Duration::from_secs(5), notifications.recv())
        .await
        .unwrap()
        .unwrap();
    // Give the listener time to process the replay.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let conversation = env
        .app
        .store
        .find_conversation_by_membership("t1", "u-1")
        .await
        .unwrap()
        .unwrap();
    let messages = env
        .app
        .store
        .list_messages(&conversation.id, 10)
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
    // Profile fetched once; the replay took the fast path.
    assert_eq!(session.calls("get_profile"), 1);
}

// ---- Test 3: Two tenants in one group share the message ----

#[tokio::test]
async fn test_group_message_seen_by_two_tenants() {
    let env = Env::new().await;
    env.login("t1").await;
    env.login("t2").await;

    let group = RemoteGroupProfile {
        group_id: "g-100".into(),
        global_id: Some("GG-team".into()),
        name: Some("Team".into()),
        avatar: None,
        member_ids: Vec::new(),
    };
    for tenant in ["t1", "t2"] {
        let session = env.client.session(tenant);
        session.add_profile(customer("u-9", "G-bob"));
        session.add_group(group.clone());
    }

    let payload = json!({
        "msgId": "gm-1", "uidFrom": "u-9", "threadId": "g-100", "isGroup": true,
        "content": "standup in 5"
    });
    env.client.session("t1").emit(RawEventKind::Message, payload.clone());
    env.client.session("t2").emit(RawEventKind::Message, payload);

    let store = env.app.store.clone();
    let message = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(Some(conversation)) = store.find_conversation_by_membership("t2", "g-100").await {
                if let Ok(Some(message)) = store.get_message(&conversation.id, "gm-1").await {
                    if message.listening_tenants.len() == 2 {
                        return message;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("both tenants merged into one message");

    let mut listeners = message.listening_tenants.clone();
    listeners.sort();
    assert_eq!(listeners, vec!["t1".to_string(), "t2".to_string()]);
}

// ---- Test 4: Restart restores saved tenants ----

#[tokio::test]
async fn test_restart_restores_logged_in_tenants() {
    let env = Env::new().await;
    env.login("t1").await;
    env.app.add_tenant("t2", Some("never logged in")).await.unwrap();
    env.app.shutdown().await;

    let client = Arc::new(StubClient::new());
    let restarted = build_app(&env.dir, client.clone()).await;
    let report = restarted.start().await.unwrap();

    assert_eq!(report.restored, vec!["t1".to_string()]);
    assert!(report.failed.is_empty());
    assert_eq!(restarted.manager.state("t1"), Some(TenantState::LoggedIn));
    assert_eq!(restarted.manager.state("t2"), Some(TenantState::Stopped));
    assert_eq!(client.login_calls(), 1);
    restarted.shutdown().await;
}

// ---- Test 5: Media ingestion needs a live session for eager kinds ----

#[tokio::test]
async fn test_media_ingestion_strategies() {
    let env = Env::new().await;
    env.app.add_tenant("t1", None).await.unwrap();

    let clip = MediaInput::new(vec![1u8; 64], "clip.mp4", "u-1");
    let err = env
        .app
        .ingest_media("t1", MediaKind::Video, clip.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::Media { .. }));

    let doc = env
        .app
        .ingest_media("t1", MediaKind::File, MediaInput::new(b"%PDF".to_vec(), "a.pdf", "u-1"))
        .await
        .unwrap();
    let path = doc.file_path.expect("deferred file path");
    assert!(path.exists());

    env.login("t1").await;
    let video = env
        .app
        .ingest_media("t1", MediaKind::Video, clip)
        .await
        .unwrap();
    assert_eq!(video.url.as_deref(), Some("https://stub.invalid/video/clip.mp4"));
    assert!(video.file_path.is_none());
    assert_eq!(env.client.session("t1").calls("upload"), 1);
}

// ---- Test 6: Sync through the assembled service ----

#[tokio::test]
async fn test_sync_after_login() {
    let env = Env::new().await;
    env.login("t1").await;
    let session = env.client.session("t1");
    session.add_profile(RemoteProfile {
        is_friend: true,
        ..customer("u-1", "G-ana")
    });
    session.add_group(RemoteGroupProfile {
        group_id: "g-1".into(),
        global_id: None,
        name: Some("Ops".into()),
        avatar: None,
        member_ids: Vec::new(),
    });

    let report = env.app.sync.sync_tenant("t1").await.unwrap();
    assert_eq!(report.contacts.created, 1);
    assert_eq!(report.groups.created, 1);
    assert!(report.is_clean());
}

// ---- Test 7: Stop detaches the listener ----

#[tokio::test]
async fn test_stopped_tenant_ignores_events() {
    let env = Env::new().await;
    env.login("t1").await;
    env.app.manager.stop("t1").await.unwrap();

    let session = env.client.session("t1");
    session.add_profile(customer("u-1", "G-ana"));
    assert_eq!(
        session.emit(RawEventKind::Message, json!({"msgId": "m-1", "uidFrom": "u-1", "content": "hi"})),
        0
    );
    assert!(matches!(
        env.app.manager.get_live_session("t1"),
        Err(FleetError::NotReady { .. })
    ));
}
