//! Synchronizer integration tests
//!
//! Every test drives a real `Synchronizer` over the in-memory transport
//! against a scripted REST collaborator.
//!
//! Run with: cargo test -p integration-tests --test sync_tests

use std::time::Duration;

use chat_common::{CredentialProvider, RealtimeConfig, SyncError};
use chat_core::{ChatId, MessageId, NewChat, PresenceEntry, UserId, UserStatus};
use chat_realtime::{ConnectionState, SyncNotice};
use chat_store::SessionSnapshot;
use chrono::{DateTime, Utc};
use integration_tests::*;
use serde_json::json;
use tokio::sync::broadcast;

fn chat_ids(snapshot: &SessionSnapshot) -> Vec<i64> {
    snapshot.chats.iter().map(|c| c.id.into_inner()).collect()
}

fn message_ids(snapshot: &SessionSnapshot) -> Vec<i64> {
    snapshot.messages.iter().map(|m| m.id.into_inner()).collect()
}

async fn next_notice(notices: &mut broadcast::Receiver<SyncNotice>) -> SyncNotice {
    tokio::time::timeout(WAIT, notices.recv())
        .await
        .expect("no notice in time")
        .expect("notice stream closed")
}

fn pair_api() -> ScriptedApi {
    ScriptedApi::new()
        .with_chats(vec![pair_chat()])
        .with_users(roster())
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_start_session_loads_chats_and_users() {
    let session = TestSession::new(pair_api());
    let status = session.start().await.unwrap();

    assert_eq!(status.url(), "mem://chat/ws/status?token=t1");

    let snapshot = session.sync.snapshot();
    assert_eq!(snapshot.chats, vec![pair_chat()]);
    assert_eq!(snapshot.users, roster());
    assert_eq!(snapshot.active_chat_id, None);
    assert_eq!(session.api.calls(), vec![Call::ListChats, Call::ListUsers]);
}

#[tokio::test]
async fn test_unauthorized_response_tears_session_down() {
    let session = TestSession::new(pair_api());
    let mut status = session.start().await.unwrap();
    let mut chat_peer = session.activate(ChatId::new(5)).await.unwrap();
    let mut notices = session.sync.subscribe_notices();

    session.api.reject_credentials();
    let err = session.sync.refresh_chats().await.unwrap_err();
    assert!(matches!(err, SyncError::SessionExpired));

    assert_eq!(next_notice(&mut notices).await, SyncNotice::SessionExpired);
    assert!(session.sync.snapshot().is_empty());
    assert_eq!(session.sync.current_user(), None);
    assert_eq!(session.sync.chat_state(), None);
    assert_eq!(session.sync.presence_state(), ConnectionState::Closed);
    assert!(session.credentials.current().is_none());

    // Both links were closed from the client side
    assert_eq!(chat_peer.recv_outbound().await, None);
    assert_eq!(status.recv_outbound().await, None);

    assert!(matches!(
        session.sync.activate_chat(ChatId::new(5)).await,
        Err(SyncError::NoSession)
    ));
}

#[tokio::test]
async fn test_unauthorized_history_fetch_expires_session() {
    let session = TestSession::new(pair_api());
    let _status = session.start().await.unwrap();

    session.api.reject_credentials();
    let err = session.sync.activate_chat(ChatId::new(5)).await.unwrap_err();

    assert!(matches!(err, SyncError::SessionExpired));
    assert!(session.sync.snapshot().is_empty());
    assert_eq!(session.sync.chat_state(), None);
}

// ============================================================================
// Chat-list events
// ============================================================================

#[tokio::test]
async fn test_duplicate_created_event_is_idempotent() {
    let session = TestSession::new(pair_api());
    let status = session.start().await.unwrap();
    let team = chat(6, "Team", &[1, 2, 7]);

    status.push_json(&chat_created(&team));
    status.push_json(&chat_created(&team));
    // Frames are applied in order, so this one lands last
    status.push_json(&status_frame(7, "online", None));

    let snapshot = session
        .wait_for(|s| s.status_of(UserId::new(7)) == UserStatus::Online)
        .await
        .unwrap();
    assert_eq!(chat_ids(&snapshot), vec![5, 6]);
    assert_eq!(snapshot.chat(ChatId::new(6)), Some(&team));
}

#[tokio::test]
async fn test_updated_event_replaces_whole_chat() {
    let session = TestSession::new(pair_api());
    let status = session.start().await.unwrap();

    status.push_json(&chat_updated(&chat(5, "Renamed", &[1, 7])));

    let snapshot = session
        .wait_for(|s| s.chat(ChatId::new(5)).is_some_and(|c| c.name == "Renamed"))
        .await
        .unwrap();
    let renamed = snapshot.chat(ChatId::new(5)).unwrap();
    assert!(renamed.has_member(UserId::new(7)));
    assert!(!renamed.has_member(PEER));
    assert_eq!(snapshot.chats.len(), 1);
}

#[tokio::test]
async fn test_delete_active_chat_then_deleted_event_is_noop() {
    let api = pair_api().with_chats(vec![pair_chat(), chat(6, "Team", &[1, 2, 7])]);
    let session = TestSession::new(api);
    let status = session.start().await.unwrap();
    let mut chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    session.sync.delete_chat(ChatId::new(5)).await.unwrap();

    let snapshot = session.sync.snapshot();
    assert_eq!(chat_ids(&snapshot), vec![6]);
    assert_eq!(snapshot.active_chat_id, None);
    assert!(snapshot.messages.is_empty());
    assert_eq!(session.sync.chat_state(), None);
    assert_eq!(chat_peer.recv_outbound().await, None);
    assert!(session.api.called(&Call::DeleteChat(ChatId::new(5))));

    // The broadcast reaching us afterwards changes nothing
    status.push_json(&chat_deleted(5));
    status.push_json(&status_frame(2, "away", None));
    let after = session
        .wait_for(|s| s.status_of(PEER) == UserStatus::Away)
        .await
        .unwrap();
    assert_eq!(after.chats, snapshot.chats);
    assert_eq!(after.active_chat_id, None);
}

#[tokio::test]
async fn test_deleted_event_for_active_chat_clears_it() {
    let session = TestSession::new(pair_api());
    let status = session.start().await.unwrap();
    let mut chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    status.push_json(&chat_deleted(5));

    let snapshot = session
        .wait_for(|s| s.chats.is_empty())
        .await
        .unwrap();
    assert_eq!(snapshot.active_chat_id, None);
    assert!(snapshot.messages.is_empty());
    assert_eq!(chat_peer.recv_outbound().await, None);
    assert_eq!(session.sync.chat_state(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deleted_event_racing_activation_leaves_no_channel() {
    for _ in 0..20 {
        let session = TestSession::new(pair_api());
        let status = session.start().await.unwrap();

        let sync = session.sync.clone();
        let activation = tokio::spawn(async move { sync.activate_chat(ChatId::new(5)).await });
        status.push_json(&chat_deleted(5));

        // Either order is fine; what matters is that nothing is left open
        match activation.await.unwrap() {
            Ok(()) | Err(SyncError::Domain(_)) => {}
            Err(other) => panic!("unexpected activation error: {other}"),
        }
        session.wait_for(|s| s.chats.is_empty()).await.unwrap();
        eventually(|| session.sync.chat_state().is_none()).await.unwrap();
        assert_eq!(session.sync.snapshot().active_chat_id, None);
    }
}

#[tokio::test]
async fn test_resync_without_active_chat_closes_its_channel() {
    let session = TestSession::new(pair_api());
    let _status = session.start().await.unwrap();
    let mut chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    // Chat 5 was deleted elsewhere and the broadcast never reached us
    session.api.set_chats(Vec::new());
    session.sync.refresh_chats().await.unwrap();

    let snapshot = session.sync.snapshot();
    assert!(snapshot.chats.is_empty());
    assert_eq!(snapshot.active_chat_id, None);
    assert!(snapshot.messages.is_empty());
    assert_eq!(session.sync.chat_state(), None);
    assert_eq!(chat_peer.recv_outbound().await, None);

    // No reconnect loop is left behind for the vanished chat
    tokio::time::sleep(Duration::from_millis(FAST_RECONNECT_MS * 3)).await;
    assert_eq!(session.connector.attempts_matching("/ws/chat/5"), 1);
}

#[tokio::test]
async fn test_resync_keeping_active_chat_keeps_its_channel() {
    let session = TestSession::new(pair_api());
    let _status = session.start().await.unwrap();
    let _chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    session
        .api
        .set_chats(vec![pair_chat(), chat(6, "Team", &[1, 2, 7])]);
    session.sync.refresh_chats().await.unwrap();

    assert_eq!(chat_ids(&session.sync.snapshot()), vec![5, 6]);
    assert_eq!(
        session.sync.chat_state(),
        Some((ChatId::new(5), ConnectionState::Open))
    );
}

#[tokio::test]
async fn test_delete_failure_resyncs_chat_list() {
    let api = pair_api().with_chats(vec![pair_chat(), chat(6, "Team", &[1, 2, 7])]);
    let session = TestSession::new(api);
    let _status = session.start().await.unwrap();
    let mut notices = session.sync.subscribe_notices();

    session.api.fail(CallKind::DeleteChat);
    let err = session.sync.delete_chat(ChatId::new(6)).await.unwrap_err();
    assert!(matches!(err, SyncError::RequestFailed(_)));

    let snapshot = session.sync.snapshot();
    assert_eq!(chat_ids(&snapshot), vec![5, 6]);
    assert!(snapshot.last_error.is_some());

    let calls = session.api.calls();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[Call::DeleteChat(ChatId::new(6)), Call::ListChats]
    );

    match next_notice(&mut notices).await {
        SyncNotice::Error(notice) => assert_eq!(notice.code, "REQUEST_FAILED"),
        other => panic!("unexpected notice: {other:?}"),
    }

    session.sync.dismiss_error();
    assert_eq!(session.sync.snapshot().last_error, None);
}

#[tokio::test]
async fn test_created_chat_broadcast_is_noop() {
    let session = TestSession::new(pair_api());
    let status = session.start().await.unwrap();

    let created = session
        .sync
        .create_chat(NewChat::group("Team", [PEER, UserId::new(7)]))
        .await
        .unwrap();
    assert!(created.has_member(ME));
    assert_eq!(session.sync.snapshot().chats.len(), 2);

    status.push_json(&chat_created(&created));
    status.push_json(&status_frame(7, "online", None));
    let snapshot = session
        .wait_for(|s| s.status_of(UserId::new(7)) == UserStatus::Online)
        .await
        .unwrap();
    assert_eq!(chat_ids(&snapshot), vec![5, created.id.into_inner()]);
}

// ============================================================================
// Presence
// ============================================================================

#[tokio::test]
async fn test_presence_frames_overwrite_entries() {
    let session = TestSession::new(pair_api());
    let status = session.start().await.unwrap();
    let eve = UserId::new(7);

    status.push_json(&status_frame(7, "online", None));
    let snapshot = session
        .wait_for(|s| s.presence.contains_key(&eve))
        .await
        .unwrap();
    assert_eq!(
        snapshot.presence[&eve],
        PresenceEntry::new(eve, UserStatus::Online, None)
    );

    status.push_json(&status_frame(7, "offline", Some("2024-05-01T10:00:00")));
    let snapshot = session
        .wait_for(|s| s.status_of(eve) == UserStatus::Offline && s.presence.contains_key(&eve))
        .await
        .unwrap();
    let last_seen: DateTime<Utc> = "2024-05-01T10:00:00Z".parse().unwrap();
    assert_eq!(
        snapshot.presence[&eve],
        PresenceEntry::new(eve, UserStatus::Offline, Some(last_seen))
    );

    // No stale last_seen survives an update that carries none
    status.push_json(&status_frame(7, "away", None));
    let snapshot = session
        .wait_for(|s| s.status_of(eve) == UserStatus::Away)
        .await
        .unwrap();
    assert_eq!(snapshot.presence[&eve].last_seen, None);
}

#[tokio::test]
async fn test_set_status_publishes_frame() {
    let session = TestSession::new(pair_api());
    let mut status = session.start().await.unwrap();

    session.sync.set_status(UserStatus::Away).unwrap();

    let frame = status.recv_outbound().await.unwrap();
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&frame).unwrap(),
        json!({"status": "away"})
    );
}

// ============================================================================
// Message timeline
// ============================================================================

#[tokio::test]
async fn test_activation_loads_history_and_marks_read() {
    let api = pair_api().with_history(
        ChatId::new(5),
        vec![
            message(101, 5, ME, "mine", 20),
            message(100, 5, PEER, "theirs", 10),
        ],
    );
    let session = TestSession::new(api);
    let _status = session.start().await.unwrap();
    let chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    assert_eq!(chat_peer.url(), "mem://chat/ws/chat/5?token=t1");

    let snapshot = session.sync.snapshot();
    assert_eq!(snapshot.active_chat_id, Some(ChatId::new(5)));
    assert_eq!(message_ids(&snapshot), vec![100, 101]);
    assert!(snapshot.message(MessageId::new(100)).unwrap().is_read);
    assert!(!snapshot.message(MessageId::new(101)).unwrap().is_read);
    assert!(session.api.called(&Call::MarkRead(ChatId::new(5))));
}

#[tokio::test]
async fn test_mark_read_failure_is_not_surfaced() {
    let api = pair_api().with_history(ChatId::new(5), vec![message(100, 5, PEER, "hey", 0)]);
    let session = TestSession::new(api);
    let _status = session.start().await.unwrap();

    session.api.fail(CallKind::MarkRead);
    session.activate(ChatId::new(5)).await.unwrap();

    let snapshot = session.sync.snapshot();
    assert_eq!(message_ids(&snapshot), vec![100]);
    assert!(!snapshot.messages[0].is_read);
    assert_eq!(snapshot.last_error, None);
}

#[tokio::test]
async fn test_pushed_messages_are_ordered() {
    let api = pair_api().with_history(ChatId::new(5), vec![message(100, 5, PEER, "a", 10)]);
    let session = TestSession::new(api);
    let _status = session.start().await.unwrap();
    let chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    for m in [
        message(103, 5, PEER, "e", 30),
        message(102, 5, PEER, "d", 20),
        message(101, 5, PEER, "c", 20),
        message(99, 5, PEER, "b", 5),
    ] {
        chat_peer.push_json(&message_frame(&m));
    }

    let snapshot = session
        .wait_for(|s| s.messages.len() == 5)
        .await
        .unwrap();
    assert_eq!(message_ids(&snapshot), vec![99, 100, 101, 102, 103]);
    assert!(snapshot
        .messages
        .windows(2)
        .all(|w| (w[0].created_at, w[0].id) < (w[1].created_at, w[1].id)));
}

#[tokio::test]
async fn test_duplicate_push_does_not_grow_timeline() {
    let api = pair_api().with_history(ChatId::new(5), vec![message(100, 5, PEER, "a", 10)]);
    let session = TestSession::new(api);
    let _status = session.start().await.unwrap();
    let chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    chat_peer.push_json(&message_frame(&message(100, 5, PEER, "a", 10)));
    chat_peer.push_json(&message_frame(&message(101, 5, PEER, "b", 11)));
    chat_peer.push_json(&message_frame(&message(101, 5, PEER, "b", 11)));
    chat_peer.push_json(&message_frame(&message(102, 5, PEER, "c", 12)));

    let snapshot = session
        .wait_for(|s| s.message(MessageId::new(102)).is_some())
        .await
        .unwrap();
    assert_eq!(message_ids(&snapshot), vec![100, 101, 102]);
}

#[tokio::test]
async fn test_frame_for_other_chat_is_ignored() {
    let session = TestSession::new(pair_api());
    let _status = session.start().await.unwrap();
    let chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    chat_peer.push_json(&message_frame(&message(300, 6, PEER, "elsewhere", 0)));
    chat_peer.push_json(&message_frame(&message(101, 5, PEER, "here", 1)));

    let snapshot = session
        .wait_for(|s| !s.messages.is_empty())
        .await
        .unwrap();
    assert_eq!(message_ids(&snapshot), vec![101]);
}

#[tokio::test]
async fn test_bad_chat_frames_keep_channel_open() {
    let session = TestSession::new(pair_api());
    let _status = session.start().await.unwrap();
    let chat_peer = session.activate(ChatId::new(5)).await.unwrap();
    let mut notices = session.sync.subscribe_notices();

    chat_peer.push_text("{not json");
    chat_peer.push_json(&json!({"error": "Chat not found"}));
    chat_peer.push_json(&message_frame(&message(101, 5, PEER, "still here", 1)));

    let snapshot = session
        .wait_for(|s| s.message(MessageId::new(101)).is_some())
        .await
        .unwrap();
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(
        next_notice(&mut notices).await,
        SyncNotice::UnknownFrame(json!({"error": "Chat not found"}))
    );
    assert_eq!(
        session.sync.chat_state(),
        Some((ChatId::new(5), ConnectionState::Open))
    );
}

#[tokio::test]
async fn test_stale_history_fetch_is_discarded() {
    let api = pair_api()
        .with_chats(vec![pair_chat(), chat(6, "Team", &[1, 2, 7])])
        .with_history(ChatId::new(5), vec![message(100, 5, PEER, "old chat", 0)])
        .with_history(ChatId::new(6), vec![message(200, 6, PEER, "new chat", 0)]);
    let session = TestSession::new(api);
    let _status = session.start().await.unwrap();

    let gate = session.api.hold_history(ChatId::new(5));
    let sync = session.sync.clone();
    let first = tokio::spawn(async move { sync.activate_chat(ChatId::new(5)).await });
    session
        .api
        .wait_for_call(&Call::ListMessages(ChatId::new(5)))
        .await
        .unwrap();

    session.sync.activate_chat(ChatId::new(6)).await.unwrap();
    let before = session.sync.snapshot();
    assert_eq!(message_ids(&before), vec![200]);

    gate.release();
    first.await.unwrap().unwrap();

    let after = session.sync.snapshot();
    assert_eq!(after.active_chat_id, Some(ChatId::new(6)));
    assert_eq!(after.messages, before.messages);
    assert!(!session.api.called(&Call::MarkRead(ChatId::new(5))));
    assert!(session.api.called(&Call::MarkRead(ChatId::new(6))));
    assert_eq!(session.sync.chat_state().map(|(id, _)| id), Some(ChatId::new(6)));
}

#[tokio::test]
async fn test_stale_history_failure_is_discarded() {
    let api = pair_api()
        .with_chats(vec![pair_chat(), chat(6, "Team", &[1, 2, 7])])
        .with_history(ChatId::new(6), vec![message(200, 6, PEER, "new chat", 0)]);
    let session = TestSession::new(api);
    let _status = session.start().await.unwrap();
    let mut notices = session.sync.subscribe_notices();

    let gate = session.api.hold_history(ChatId::new(5));
    let sync = session.sync.clone();
    let first = tokio::spawn(async move { sync.activate_chat(ChatId::new(5)).await });
    session
        .api
        .wait_for_call(&Call::ListMessages(ChatId::new(5)))
        .await
        .unwrap();

    session.sync.activate_chat(ChatId::new(6)).await.unwrap();
    let before = session.sync.snapshot();

    session.api.fail(CallKind::ListMessages);
    gate.release();
    first.await.unwrap().unwrap();

    assert_eq!(session.sync.snapshot(), before);
    assert_eq!(before.last_error, None);
    assert!(notices.try_recv().is_err());
    assert_eq!(session.sync.chat_state().map(|(id, _)| id), Some(ChatId::new(6)));
}

#[tokio::test]
async fn test_stale_history_rejection_still_expires_session() {
    let api = pair_api().with_chats(vec![pair_chat(), chat(6, "Team", &[1, 2, 7])]);
    let session = TestSession::new(api);
    let _status = session.start().await.unwrap();
    let mut notices = session.sync.subscribe_notices();

    let gate = session.api.hold_history(ChatId::new(5));
    let sync = session.sync.clone();
    let first = tokio::spawn(async move { sync.activate_chat(ChatId::new(5)).await });
    session
        .api
        .wait_for_call(&Call::ListMessages(ChatId::new(5)))
        .await
        .unwrap();
    session.sync.activate_chat(ChatId::new(6)).await.unwrap();

    session.api.reject_credentials();
    gate.release();
    let err = first.await.unwrap().unwrap_err();

    assert!(matches!(err, SyncError::SessionExpired));
    assert_eq!(next_notice(&mut notices).await, SyncNotice::SessionExpired);
    assert_eq!(session.sync.current_user(), None);
    assert_eq!(session.sync.chat_state(), None);
}

#[tokio::test]
async fn test_history_keeps_messages_pushed_during_fetch() {
    let api = pair_api().with_history(
        ChatId::new(5),
        vec![message(100, 5, PEER, "a", 0), message(101, 5, PEER, "b", 1)],
    );
    let session = TestSession::new(api);
    let _status = session.start().await.unwrap();

    let gate = session.api.hold_history(ChatId::new(5));
    let sync = session.sync.clone();
    let activation = tokio::spawn(async move { sync.activate_chat(ChatId::new(5)).await });

    let chat_peer = session.accept().await.unwrap();
    session.wait_chat_open(ChatId::new(5)).await.unwrap();
    chat_peer.push_json(&message_frame(&message(102, 5, PEER, "raced", 2)));
    session
        .wait_for(|s| s.message(MessageId::new(102)).is_some())
        .await
        .unwrap();

    gate.release();
    activation.await.unwrap().unwrap();

    assert_eq!(message_ids(&session.sync.snapshot()), vec![100, 101, 102]);
}

// ============================================================================
// Optimistic send
// ============================================================================

#[tokio::test]
async fn test_optimistic_send_is_replaced_by_echo() {
    let session = TestSession::new(pair_api());
    let _status = session.start().await.unwrap();
    let mut chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    let provisional = session.sync.send("hi").unwrap();
    assert!(provisional.is_provisional());

    let snapshot = session.sync.snapshot();
    assert_eq!(snapshot.messages.len(), 1);
    assert!(snapshot.messages[0].pending);
    assert_eq!(snapshot.messages[0].content, "hi");
    assert_eq!(chat_peer.recv_outbound().await.as_deref(), Some("hi"));

    chat_peer.push_json(&echo_frame(101, 5, ME, "hi"));
    let snapshot = session
        .wait_for(|s| s.message(MessageId::new(101)).is_some())
        .await
        .unwrap();
    assert_eq!(message_ids(&snapshot), vec![101]);
    assert!(!snapshot.messages[0].pending);
    assert_eq!(snapshot.message(provisional), None);

    // A repeated echo is a plain duplicate
    chat_peer.push_json(&echo_frame(101, 5, ME, "hi"));
    chat_peer.push_json(&message_frame(&message(102, 5, PEER, "ok", 0)));
    let snapshot = session
        .wait_for(|s| s.message(MessageId::new(102)).is_some())
        .await
        .unwrap();
    assert_eq!(snapshot.messages.len(), 2);
}

#[tokio::test]
async fn test_peer_message_with_same_text_does_not_reconcile() {
    let session = TestSession::new(pair_api());
    let _status = session.start().await.unwrap();
    let chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    let provisional = session.sync.send("hi").unwrap();
    chat_peer.push_json(&echo_frame(101, 5, PEER, "hi"));

    let snapshot = session
        .wait_for(|s| s.message(MessageId::new(101)).is_some())
        .await
        .unwrap();
    assert_eq!(snapshot.messages.len(), 2);
    assert!(snapshot.message(provisional).unwrap().pending);
}

#[tokio::test]
async fn test_send_while_disconnected_marks_failed_until_retry() {
    let session = TestSession::new(pair_api());
    let _status = session.start().await.unwrap();
    let chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    session.connector.set_refuse(true);
    chat_peer.drop_connection();
    eventually(|| session.sync.chat_state() != Some((ChatId::new(5), ConnectionState::Open)))
        .await
        .unwrap();

    let err = session.sync.send("hi").unwrap_err();
    assert!(matches!(err, SyncError::NotConnected));

    let snapshot = session.sync.snapshot();
    assert_eq!(snapshot.messages.len(), 1);
    let failed = snapshot.messages[0].clone();
    assert!(failed.failed);
    assert!(!failed.pending);
    assert_eq!(failed.content, "hi");

    // Still down: the retry fails and the entry stays failed
    assert!(matches!(
        session.sync.retry_message(failed.id),
        Err(SyncError::NotConnected)
    ));
    assert_eq!(session.sync.snapshot().failed_count(), 1);

    session.connector.set_refuse(false);
    let mut chat_peer = session.accept().await.unwrap();
    session.wait_chat_open(ChatId::new(5)).await.unwrap();

    session.sync.retry_message(failed.id).unwrap();
    assert_eq!(chat_peer.recv_outbound().await.as_deref(), Some("hi"));
    let snapshot = session.sync.snapshot();
    assert_eq!(snapshot.pending_count(), 1);
    assert_eq!(snapshot.failed_count(), 0);

    chat_peer.push_json(&echo_frame(101, 5, ME, "hi"));
    let snapshot = session
        .wait_for(|s| s.message(MessageId::new(101)).is_some())
        .await
        .unwrap();
    assert_eq!(message_ids(&snapshot), vec![101]);
}

#[tokio::test]
async fn test_retry_rejects_non_failed_message() {
    let session = TestSession::new(pair_api());
    let _status = session.start().await.unwrap();
    let _chat_peer = session.activate(ChatId::new(5)).await.unwrap();

    let id = session.sync.send("hi").unwrap();
    assert!(matches!(
        session.sync.retry_message(id),
        Err(SyncError::Domain(_))
    ));
    assert_eq!(session.sync.snapshot().pending_count(), 1);
}

// ============================================================================
// Reconnection
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_status_channel_reconnects_once_per_delay() {
    let session = TestSession::with_config(pair_api(), &RealtimeConfig::new("mem://chat"));
    let status = session.start().await.unwrap();
    let delay = Duration::from_millis(3000);
    let attempts = || session.connector.attempts_matching("/ws/status");

    status.drop_connection();
    settle().await;
    assert_eq!(session.sync.presence_state(), ConnectionState::Closed);
    assert_eq!(attempts(), 1);

    tokio::time::advance(delay - Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(attempts(), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(attempts(), 2);
    let status = session.connector.try_accept().expect("reconnected");
    settle().await;
    assert_eq!(session.sync.presence_state(), ConnectionState::Open);

    // A second close schedules exactly one more attempt
    status.drop_connection();
    settle().await;
    tokio::time::advance(delay / 2).await;
    settle().await;
    assert_eq!(attempts(), 2);
    tokio::time::advance(delay / 2).await;
    settle().await;
    assert_eq!(attempts(), 3);

    // Connected again: no further attempts
    tokio::time::advance(delay * 5).await;
    settle().await;
    assert_eq!(attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_end_session_cancels_pending_reconnect() {
    let session = TestSession::with_config(pair_api(), &RealtimeConfig::new("mem://chat"));
    let status = session.start().await.unwrap();

    status.drop_connection();
    settle().await;
    session.sync.end_session();

    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(session.connector.attempt_count(), 1);
    assert_eq!(session.sync.presence_state(), ConnectionState::Closed);
}
