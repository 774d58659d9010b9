// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution against a real SQLite store and a stub session.

use std::sync::Arc;

use chatfleet_core::{
    ConversationKind, DeliveryStatus, FleetError, FleetStore, IdentityKind, NewMessage,
    RemoteGroupProfile, RemoteProfile, TenantProfile, UpsertChange,
};
use chatfleet_normalizer::{CanonicalMessage, normalize};
use chatfleet_resolver::{Resolution, Resolved, Resolver, TenantContext};
use chatfleet_test_utils::{StubSession, TestHarness};
use serde_json::json;

struct Fixture {
    harness: TestHarness,
    resolver: Resolver,
    session: Arc<StubSession>,
    ctx: TenantContext,
}

async fn fixture(tenant: &str) -> Fixture {
    let harness = TestHarness::new().await.unwrap();
    let resolver = Resolver::new(harness.store_dyn());
    let f = Fixture {
        session: harness.client.session(tenant),
        ctx: TenantContext::new(tenant, format!("acc-{tenant}")),
        resolver,
        harness,
    };
    add_tenant(&f, tenant).await;
    f
}

async fn add_tenant(f: &Fixture, tenant: &str) {
    f.harness.store.upsert_tenant(tenant, None).await.unwrap();
    f.resolver
        .register_tenant_profile(
            tenant,
            &TenantProfile {
                remote_id: format!("acc-{tenant}"),
                global_id: Some(format!("g-acc-{tenant}")),
                display_name: Some("Bot".into()),
                avatar: None,
            },
        )
        .await
        .unwrap();
}

fn person(id: &str, global: Option<&str>) -> RemoteProfile {
    RemoteProfile {
        user_id: id.into(),
        global_id: global.map(str::to_string),
        display_name: Some(format!("Person {id}")),
        avatar: None,
        is_friend: true,
    }
}

fn msg(payload: serde_json::Value) -> CanonicalMessage {
    normalize(&payload).unwrap()
}

fn stored_text(r: &Resolution, remote_id: &str) -> NewMessage {
    NewMessage {
        conversation_id: r.conversation.id().to_string(),
        remote_msg_id: remote_id.into(),
        client_msg_id: None,
        sender_identity_id: r.sender.id().to_string(),
        sender_kind: IdentityKind::Customer,
        content: json!({"type": "text", "text": "same words"}),
        content_type: "text".into(),
        raw: None,
        sent_at: 1_000,
        delivery: DeliveryStatus::Received,
        quote_remote_id: None,
    }
}

async fn tenant_identity_id(f: &Fixture, tenant: &str) -> String {
    f.harness
        .store
        .get_tenant(tenant)
        .await
        .unwrap()
        .unwrap()
        .identity_id
        .unwrap()
}

// ---- Fast path never re-fetches ----

#[tokio::test]
async fn slow_path_then_fast_path() {
    let f = fixture("t1").await;
    f.session.add_profile(person("U1", Some("gU1")));
    let m = msg(json!({"uidFrom": "U1", "content": "hi"}));

    let first = f.resolver.resolve(&f.ctx, f.session.as_ref(), &m).await.unwrap();
    assert!(first.sender.is_created());
    assert!(first.conversation.is_created());
    assert_eq!(first.sender_kind, IdentityKind::Customer);
    assert_eq!(f.session.calls("get_profile"), 1);

    let second = f.resolver.resolve(&f.ctx, f.session.as_ref(), &m).await.unwrap();
    assert_eq!(second.sender, Resolved::Found(first.sender.id().to_string()));
    assert_eq!(
        second.conversation,
        Resolved::Found(first.conversation.id().to_string())
    );
    assert_eq!(f.session.calls("get_profile"), 1, "fast path must not fetch");

    let conv = f
        .harness
        .store
        .get_conversation(first.conversation.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conv.kind, ConversationKind::Private);
    assert_eq!(conv.canonical_id, "gU1");
}

// ---- Self-sent messages use the tenant identity ----

#[tokio::test]
async fn self_sent_uses_tenant_identity() {
    let f = fixture("t1").await;
    f.session.add_profile(person("U2", None));
    let m = msg(json!({"uidFrom": "0", "idTo": "U2", "isSelf": true, "content": "yo"}));

    let r = f.resolver.resolve(&f.ctx, f.session.as_ref(), &m).await.unwrap();
    assert!(r.self_sent);
    assert_eq!(r.sender_kind, IdentityKind::Bot);

    let tenant = f.harness.store.get_tenant("t1").await.unwrap().unwrap();
    assert_eq!(tenant.identity_id.as_deref(), Some(r.sender.id()));
    assert_eq!(f.session.calls("own_profile"), 0);
    // The counterpart was fetched once to build the private thread.
    assert_eq!(f.session.calls("get_profile"), 1);
}

// ---- Groups record the tenant and the sender as members ----

#[tokio::test]
async fn group_thread_records_memberships() {
    let f = fixture("t1").await;
    f.session.add_profile(person("U1", None));
    f.session.add_group(RemoteGroupProfile {
        group_id: "G1".into(),
        global_id: Some("gG1".into()),
        name: Some("Team".into()),
        avatar: None,
        member_ids: vec!["U1".into()],
    });
    let m = msg(json!({"uidFrom": "U1", "idTo": "G1", "isGroup": true, "content": "hey"}));

    let r = f.resolver.resolve(&f.ctx, f.session.as_ref(), &m).await.unwrap();
    let members = f
        .harness
        .store
        .list_memberships(r.conversation.id())
        .await
        .unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().any(|m| m.is_self && m.routing_id == "G1"));
    assert!(
        members
            .iter()
            .any(|m| !m.is_self && m.identity_id == r.sender.id() && m.routing_id == "U1")
    );

    let conv = f
        .harness
        .store
        .get_conversation(r.conversation.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conv.canonical_id, "gG1");
    assert_eq!(conv.name.as_deref(), Some("Team"));
}

// ---- Unknown ids and fetch failures are resolution failures ----

#[tokio::test]
async fn unknown_sender_fails_resolution() {
    let f = fixture("t1").await;
    let m = msg(json!({"uidFrom": "ghost", "content": "boo"}));
    let err = f
        .resolver
        .resolve(&f.ctx, f.session.as_ref(), &m)
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::Resolution { .. }));
}

#[tokio::test]
async fn fetch_failure_fails_resolution() {
    let f = fixture("t1").await;
    f.session.add_profile(person("U1", None));
    f.session.fail_method("get_profile");
    let m = msg(json!({"uidFrom": "U1", "content": "hi"}));
    let err = f
        .resolver
        .resolve(&f.ctx, f.session.as_ref(), &m)
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::Resolution { .. }));
}

// ---- Numeric placeholder is upgraded in place ----

#[tokio::test]
async fn numeric_identity_upgrades_in_place() {
    let f = fixture("t1").await;
    f.session.add_profile(person("U3", None));
    let m = msg(json!({"uidFrom": "U3", "content": "first"}));
    let r = f.resolver.resolve(&f.ctx, f.session.as_ref(), &m).await.unwrap();

    let before = f
        .harness
        .store
        .get_identity(r.sender.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(before.canonical_id, "U3");
    assert!(!before.canonical_durable);

    let tenant = f.harness.store.get_tenant("t1").await.unwrap().unwrap();
    let change = f
        .resolver
        .apply_contact(
            &f.ctx,
            tenant.identity_id.as_deref().unwrap(),
            &person("U3", Some("gU3")),
        )
        .await
        .unwrap();
    assert_eq!(change.change, UpsertChange::Upgraded);
    assert_eq!(change.identity_id, r.sender.id());
    assert_eq!(change.conversation_id, r.conversation.id());

    let after = f
        .harness
        .store
        .get_identity(r.sender.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.canonical_id, "gU3");
    assert!(after.canonical_durable);
    let conv = f
        .harness
        .store
        .get_conversation(r.conversation.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conv.canonical_id, "gU3");
}

// ---- Identities are shared across tenants ----

#[tokio::test]
async fn two_tenants_share_one_identity() {
    let f = fixture("t1").await;
    add_tenant(&f, "t2").await;
    let other = f.harness.client.session("t2");
    f.session.add_profile(person("U1", Some("gU1")));
    // The second tenant addresses the same person by another numeric id.
    other.add_profile(person("U1-seen-by-t2", Some("gU1")));

    let a = f
        .resolver
        .resolve(
            &f.ctx,
            f.session.as_ref(),
            &msg(json!({"uidFrom": "U1", "content": "a"})),
        )
        .await
        .unwrap();
    let b = f
        .resolver
        .resolve(
            &TenantContext::new("t2", "acc-t2"),
            other.as_ref(),
            &msg(json!({"uidFrom": "U1-seen-by-t2", "content": "b"})),
        )
        .await
        .unwrap();

    assert_eq!(a.sender.id(), b.sender.id());
    assert_eq!(a.conversation.id(), b.conversation.id());
    assert!(!b.sender.is_created());
}

// ---- A late durable id folds the placeholder into the shared row ----

#[tokio::test]
async fn placeholder_folds_into_row_created_by_other_tenant() {
    let f = fixture("t1").await;
    add_tenant(&f, "t2").await;
    let other = f.harness.client.session("t2");
    let t2 = TenantContext::new("t2", "acc-t2");
    f.session.add_profile(person("U1", None));
    other.add_profile(person("V1", Some("gU1")));

    let stale = f
        .resolver
        .resolve(&f.ctx, f.session.as_ref(), &msg(json!({"uidFrom": "U1", "content": "a"})))
        .await
        .unwrap();
    let shared = f
        .resolver
        .resolve(&t2, other.as_ref(), &msg(json!({"uidFrom": "V1", "content": "b"})))
        .await
        .unwrap();
    assert_ne!(stale.conversation.id(), shared.conversation.id());

    // Both tenants stored the same remote message before the ids were linked.
    let store = &f.harness.store;
    store.persist_message("t1", stored_text(&stale, "m1")).await.unwrap();
    store.persist_message("t2", stored_text(&shared, "m1")).await.unwrap();

    let me = tenant_identity_id(&f, "t1").await;
    let change = f
        .resolver
        .apply_contact(&f.ctx, &me, &person("U1", Some("gU1")))
        .await
        .unwrap();
    assert_eq!(change.change, UpsertChange::Upgraded);
    assert_eq!(change.identity_id, shared.sender.id());
    assert_eq!(change.conversation_id, shared.conversation.id());

    assert!(store.get_conversation(stale.conversation.id()).await.unwrap().is_none());
    assert!(store.get_identity(stale.sender.id()).await.unwrap().is_none());
    assert!(store.find_identity_by_canonical("U1").await.unwrap().is_none());
    assert!(store.find_conversation_by_canonical("U1").await.unwrap().is_none());

    let next = f
        .resolver
        .resolve(&f.ctx, f.session.as_ref(), &msg(json!({"uidFrom": "U1", "content": "c"})))
        .await
        .unwrap();
    assert_eq!(next.sender, Resolved::Found(shared.sender.id().to_string()));
    assert_eq!(
        next.conversation,
        Resolved::Found(shared.conversation.id().to_string())
    );
    assert_eq!(f.session.calls("get_profile"), 1);

    let messages = store.list_messages(shared.conversation.id(), 10).await.unwrap();
    assert_eq!(messages.len(), 1);
    let mut listeners = messages[0].listening_tenants.clone();
    listeners.sort();
    assert_eq!(listeners, vec!["t1".to_string(), "t2".to_string()]);
}

#[tokio::test]
async fn group_placeholder_folds_into_row_created_by_other_tenant() {
    let f = fixture("t1").await;
    add_tenant(&f, "t2").await;
    let other = f.harness.client.session("t2");
    let t2 = TenantContext::new("t2", "acc-t2");
    f.session.add_profile(person("U1", None));
    other.add_profile(person("W1", None));
    let numeric = |id: &str, global: Option<&str>| RemoteGroupProfile {
        group_id: id.into(),
        global_id: global.map(str::to_string),
        name: Some("Team".into()),
        avatar: None,
        member_ids: Vec::new(),
    };
    f.session.add_group(numeric("G1", None));
    other.add_group(numeric("H1", Some("gG1")));

    let stale = f
        .resolver
        .resolve(
            &f.ctx,
            f.session.as_ref(),
            &msg(json!({"uidFrom": "U1", "idTo": "G1", "isGroup": true, "content": "a"})),
        )
        .await
        .unwrap();
    let shared = f
        .resolver
        .resolve(
            &t2,
            other.as_ref(),
            &msg(json!({"uidFrom": "W1", "idTo": "H1", "isGroup": true, "content": "b"})),
        )
        .await
        .unwrap();

    let me = tenant_identity_id(&f, "t1").await;
    let folded = f
        .resolver
        .apply_group(&f.ctx, &me, &numeric("G1", Some("gG1")))
        .await
        .unwrap();
    assert_eq!(folded.change, UpsertChange::Upgraded);
    assert_eq!(folded.id, shared.conversation.id());

    let store = &f.harness.store;
    let routed = store
        .find_conversation_by_membership("t1", "G1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(routed.id, shared.conversation.id());
    assert!(store.get_conversation(stale.conversation.id()).await.unwrap().is_none());

    // The sender membership recorded on the placeholder moved along.
    let members = store.list_memberships(shared.conversation.id()).await.unwrap();
    assert!(
        members
            .iter()
            .any(|m| m.tenant_id == "t1" && m.identity_id == stale.sender.id())
    );
}

// ---- A listing without the durable id never forks a durable identity ----

#[tokio::test]
async fn listing_without_global_id_keeps_durable_identity() {
    let f = fixture("t1").await;
    f.session.add_profile(person("U1", Some("gU1")));
    let r = f
        .resolver
        .resolve(&f.ctx, f.session.as_ref(), &msg(json!({"uidFrom": "U1", "content": "a"})))
        .await
        .unwrap();

    let me = tenant_identity_id(&f, "t1").await;
    let change = f
        .resolver
        .apply_contact(&f.ctx, &me, &person("U1", None))
        .await
        .unwrap();
    assert_eq!(change.change, UpsertChange::Refreshed);
    assert_eq!(change.identity_id, r.sender.id());
    assert_eq!(change.conversation_id, r.conversation.id());

    let store = &f.harness.store;
    let connected = store
        .find_identity_by_connection("t1", "U1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(connected.canonical_id, "gU1");
    assert!(connected.canonical_durable);
    assert!(store.find_identity_by_canonical("U1").await.unwrap().is_none());
    assert!(store.find_conversation_by_canonical("U1").await.unwrap().is_none());
}
