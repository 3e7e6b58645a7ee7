mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::json;

use common::{group, member, message, mirror, ok, page, API};
use groupmirror_client::{
    Chat, ClientConfig, GroupMirror, GroupUpdate, Loadable, Queryable, Sendable, Updatable,
};
use groupmirror_net::testing::ScriptedTransport;
use groupmirror_net::{AccessToken, MemberContact, NewMember, PageRequest, RequestBody};
use groupmirror_shared::{ChatResult, MessageId, UserId};
use groupmirror_store::{Attachment, AttachmentKind, Message, User};

#[tokio::test]
async fn test_query_latest_fifty_grows_store() {
    let t = ScriptedTransport::new();
    t.push(
        200,
        page(vec![
            message("m3", 1_700_000_030, "u1"),
            message("m2", 1_700_000_020, "u1"),
            message("m1", 1_700_000_010, "u2"),
        ]),
    );
    let chat = mirror(&t).group("123");

    let outcome = chat.query_messages(PageRequest::latest(50)).await.unwrap();

    assert_eq!(outcome.result, ChatResult::Success);
    assert_eq!(
        t.requests()[0].target(),
        format!("{API}/groups/123/messages?limit=50&token=T")
    );
    let store = chat.core().messages().read().await;
    assert_eq!(store.len(), 3);
    let order: Vec<i64> = store.iter().map(|m| m.created_at.timestamp()).collect();
    assert_eq!(order, vec![1_700_000_010, 1_700_000_020, 1_700_000_030]);
}

#[tokio::test]
async fn test_paging_backwards_uses_before_id() {
    let t = ScriptedTransport::new();
    t.push(200, page(vec![message("m5", 1_700_000_050, "u1")]));
    t.push(200, page(vec![message("m4", 1_700_000_040, "u1")]));
    let chat = mirror(&t).group("g1");

    chat.query_latest().await.unwrap();
    let oldest = {
        let store = chat.core().messages().read().await;
        store.oldest().and_then(|m| m.id.clone()).unwrap()
    };
    let outcome = chat
        .query_messages(PageRequest::before(oldest, 20))
        .await
        .unwrap();

    assert_eq!(outcome.inserted, 1);
    let second = &t.requests()[1];
    assert_eq!(second.query_value("before_id"), Some("m5"));
    assert_eq!(second.query_value("after_id"), None);
    assert_eq!(second.query_value("since_id"), None);
    assert_eq!(chat.core().messages().read().await.len(), 2);
}

#[tokio::test]
async fn test_colliding_timestamps_keep_first_message() {
    let t = ScriptedTransport::new();
    t.push(
        200,
        page(vec![
            message("a", 1_700_000_000, "u1"),
            message("b", 1_700_000_000, "u2"),
        ]),
    );
    let chat = mirror(&t).group("g1");

    let outcome = chat.query_latest().await.unwrap();

    assert_eq!(outcome.received, 2);
    assert_eq!(outcome.inserted, 1);
    let store = chat.core().messages().read().await;
    assert_eq!(store.len(), 1);
    assert!(store.get(&MessageId::from("a")).is_some());
    assert!(store.get(&MessageId::from("b")).is_none());
}

#[tokio::test]
async fn test_add_members_polls_through_not_ready() {
    let t = ScriptedTransport::new();
    t.push(202, ok(json!({ "results_id": "r1" })));
    t.push(503, json!({ "meta": { "code": 503 } }));
    t.push(200, ok(json!({ "members": [member("mem-a", "uA", "Ann")] })));
    let chat = mirror(&t).group("g1");

    let result = chat
        .add_members(vec![NewMember::by_user_id("Ann", "uA")])
        .await
        .unwrap();

    assert_eq!(result, ChatResult::Success);
    let ann = chat.members().get(&UserId::from("uA")).unwrap();
    assert_eq!(ann.nickname, "Ann");
    assert_eq!(ann.membership_in(chat.id()), Some("mem-a"));

    let requests = t.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].url, format!("{API}/groups/g1/members/add"));
    assert_eq!(requests[1].url, format!("{API}/groups/g1/members/r1"));
    assert_eq!(requests[2].url, format!("{API}/groups/g1/members/r1"));
}

#[tokio::test]
async fn test_add_members_expired_results() {
    let t = ScriptedTransport::new();
    t.push(202, ok(json!({ "results_id": "r1" })));
    t.push(404, json!({ "meta": { "code": 404 } }));
    let chat = mirror(&t).group("g1");

    let result = chat
        .add_members(vec![NewMember::new(
            "Bo",
            MemberContact::Phone("+15550100".into()),
        )])
        .await
        .unwrap();

    assert_eq!(result, ChatResult::ResultsExpired);
    assert!(chat.members().is_empty());
}

#[tokio::test]
async fn test_add_members_gives_up_after_max_attempts() {
    let t = ScriptedTransport::new();
    t.push(202, ok(json!({ "results_id": "r1" })));
    for _ in 0..10 {
        t.push(503, json!({}));
    }
    let chat = mirror(&t).group("g1");

    let result = chat
        .add_members(vec![NewMember::by_user_id("Ann", "uA")])
        .await
        .unwrap();

    assert_eq!(result, ChatResult::Failure);
    // Submit plus the configured five status checks.
    assert_eq!(t.request_count(), 6);
}

#[tokio::test]
async fn test_remove_member_without_membership_sends_nothing() {
    let t = ScriptedTransport::new();
    let chat = mirror(&t).group("g1");
    chat.members().upsert(User::new("u9", "Nine"));

    let result = chat.remove_member(UserId::from("u9")).await.unwrap();

    assert_eq!(result, ChatResult::NotFound);
    assert_eq!(t.request_count(), 0);
    assert!(chat.members().contains(&UserId::from("u9")));
}

#[tokio::test]
async fn test_remove_member_with_membership() {
    let t = ScriptedTransport::new();
    t.push(200, json!({ "meta": { "code": 200 } }));
    let chat = mirror(&t).group("g1");
    chat.members()
        .upsert(User::new("u9", "Nine").with_membership("g1", "mem-9"));

    let result = chat.remove_member(UserId::from("u9")).await.unwrap();

    assert_eq!(result, ChatResult::Success);
    assert_eq!(
        t.requests()[0].url,
        format!("{API}/groups/g1/members/mem-9/remove")
    );
    assert!(!chat.members().contains(&UserId::from("u9")));
}

#[tokio::test]
async fn test_load_mirrors_group_members_and_subgroups() {
    let t = ScriptedTransport::new();
    t.push(
        200,
        ok(group(
            "g1",
            "Climbers",
            vec![member("mem-1", "u1", "Ada"), member("mem-2", "u2", "Bea")],
        )),
    );
    t.push(
        200,
        ok(json!([common::subgroup("s1", "Trips"), common::subgroup("s2", "Gear")])),
    );
    let chat = mirror(&t).group("g1");

    assert_eq!(chat.load().await.unwrap(), ChatResult::Success);

    assert_eq!(chat.profile().name, "Climbers");
    assert!(chat.group_settings().requires_approval);
    assert_eq!(chat.share_url().as_deref(), Some("https://groupme.test/join/abc"));
    assert_eq!(chat.members().len(), 2);
    assert_eq!(chat.creator().map(|u| u.nickname.clone()), Some("Ada".to_string()));

    let subs = chat.subgroups();
    assert_eq!(subs.len(), 2);
    assert_eq!(subs[0].profile().topic, "Trips");
    assert!(subs.iter().all(|s| s.members().ptr_eq(chat.members())));
    assert_eq!(t.requests()[1].url, format!("{API}/groups/g1/subgroups"));
}

#[tokio::test]
async fn test_load_not_found() {
    let t = ScriptedTransport::new();
    t.push(404, json!({ "meta": { "code": 404 } }));
    let chat = mirror(&t).group("missing");

    assert_eq!(chat.load().await.unwrap(), ChatResult::NotFound);
    assert_eq!(t.request_count(), 1);
}

#[tokio::test]
async fn test_update_applies_server_record() {
    let t = ScriptedTransport::new();
    t.push(200, ok(group("g1", "Renamed", vec![member("mem-1", "u1", "Ada")])));
    let chat = mirror(&t).group("g1");

    let result = chat
        .update(GroupUpdate {
            name: Some("Renamed".into()),
            ..GroupUpdate::default()
        })
        .await
        .unwrap();

    assert_eq!(result, ChatResult::Success);
    assert_eq!(chat.profile().name, "Renamed");
    let request = &t.requests()[0];
    assert_eq!(request.url, format!("{API}/groups/g1/update"));
    assert_eq!(request.body, RequestBody::Json(json!({ "name": "Renamed" })));
}

#[tokio::test]
async fn test_change_owner_status_mapping() {
    for (status, expected) in [
        ("200", ChatResult::Success),
        ("400", ChatResult::RequesterIsNewOwner),
        ("403", ChatResult::RequesterIsNotOwner),
        ("404", ChatResult::NotFound),
        ("405", ChatResult::MissingData),
    ] {
        let t = ScriptedTransport::new();
        t.push(
            200,
            ok(json!({ "results": [{ "group_id": "g1", "owner_id": "u2", "status": status }] })),
        );
        let chat = mirror(&t).group("g1");

        let result = chat.change_owner(UserId::from("u2")).await.unwrap();

        assert_eq!(result, expected, "status {status}");
        let owner_changed = chat.creator_id() == Some(UserId::from("u2"));
        assert_eq!(owner_changed, expected == ChatResult::Success);
    }
}

#[tokio::test]
async fn test_like_updates_favorites() {
    let t = ScriptedTransport::new();
    t.push(200, page(vec![message("m1", 1_700_000_000, "u1")]));
    t.push(200, json!({ "meta": { "code": 200 } }));
    t.push(200, json!({ "meta": { "code": 200 } }));
    let chat = mirror(&t).group("g1");
    chat.query_latest().await.unwrap();

    let me = UserId::from("u7");
    let liked = chat.like(MessageId::from("m1"), me.clone()).await.unwrap();
    assert_eq!(liked, ChatResult::Success);
    assert_eq!(t.requests()[1].url, format!("{API}/messages/g1/m1/like"));
    {
        let store = chat.core().messages().read().await;
        assert!(store.get(&MessageId::from("m1")).unwrap().favorited_by.contains(&me));
    }

    chat.unlike(MessageId::from("m1"), me.clone()).await.unwrap();
    let store = chat.core().messages().read().await;
    assert!(!store.get(&MessageId::from("m1")).unwrap().favorited_by.contains(&me));
}

#[tokio::test]
async fn test_send_uploads_attachment_once() {
    let t = ScriptedTransport::new();
    t.push(200, json!({ "payload": { "picture_url": "https://i.test/p1" } }));
    t.push(201, ok(json!({ "message": message("m1", 1_700_000_001, "u1") })));
    t.push(201, ok(json!({ "message": message("m2", 1_700_000_002, "u1") })));
    let chat = mirror(&t).group("g1");
    let me = chat.members().upsert(User::new("u1", "Ada"));
    let picture = Attachment::from_bytes(AttachmentKind::Picture, Bytes::from_static(b"\xff\xd8"));

    let first = Message::draft(me.clone(), "look").with_attachment(picture.clone());
    assert_eq!(chat.send_message(first).await.unwrap(), ChatResult::Success);
    let second = Message::draft(me, "again").with_attachment(picture.clone());
    assert_eq!(chat.send_message(second).await.unwrap(), ChatResult::Success);

    let requests = t.requests();
    let uploads = requests
        .iter()
        .filter(|r| r.url == "https://image.test/pictures")
        .count();
    assert_eq!(uploads, 1);
    assert_eq!(requests.len(), 3);
    assert!(picture.is_resolved());

    let RequestBody::Json(body) = &requests[2].body else {
        panic!("message body should be JSON");
    };
    assert_eq!(
        body["message"]["attachments"][0],
        json!({ "type": "image", "url": "https://i.test/p1" })
    );
    assert_eq!(chat.core().messages().read().await.len(), 2);
}

#[tokio::test]
async fn test_failed_upload_aborts_send() {
    let t = ScriptedTransport::new();
    t.push(500, json!({}));
    let chat = mirror(&t).group("g1");
    let me = chat.members().upsert(User::new("u1", "Ada"));
    let picture = Attachment::from_bytes(AttachmentKind::Picture, Bytes::from_static(b"\xff\xd8"));

    let result = chat
        .send_message(Message::draft(me, "look").with_attachment(picture))
        .await
        .unwrap();

    assert_eq!(result, ChatResult::Failure);
    assert_eq!(t.request_count(), 1);
    assert!(chat.core().messages().read().await.is_empty());
}

#[tokio::test]
async fn test_transport_fault_reaches_caller() {
    let t = ScriptedTransport::new();
    t.push_error("connection refused");
    let chat = mirror(&t).group("g1");

    let err = chat.query_latest().await.unwrap_err();
    assert!(matches!(err, groupmirror_net::SyncError::Transport(_)));
}

#[tokio::test]
async fn test_send_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.pdf");
    std::fs::write(&path, b"%PDF-1.7").unwrap();

    let t = ScriptedTransport::new();
    t.push(201, json!({ "status_url": "https://file.test/v1/g1/status/1" }));
    t.push(200, json!({ "status": "pending" }));
    t.push(200, json!({ "status": "completed", "file_id": "f-1" }));
    t.push(201, ok(json!({ "message": message("m1", 1_700_000_001, "u1") })));
    let chat = mirror(&t).group("g1");
    let me = chat.members().upsert(User::new("u1", "Ada"));
    let file = Attachment::from_path(AttachmentKind::File, &path);

    let result = chat
        .send_message(Message::draft(me, "minutes").with_attachment(file.clone()))
        .await
        .unwrap();

    assert_eq!(result, ChatResult::Success);
    let requests = t.requests();
    assert_eq!(requests[0].url, "https://file.test/v1/g1/files");
    assert_eq!(requests[0].query_value("name"), Some("notes.pdf"));
    let RequestBody::Json(body) = &requests[3].body else {
        panic!("message body should be JSON");
    };
    assert_eq!(
        body["message"]["attachments"][0],
        json!({ "type": "file", "file_id": "f-1" })
    );
    assert!(file.is_resolved());
}

#[tokio::test]
async fn test_cancel_pending_only_stops_polling_in_flight() {
    let t = ScriptedTransport::new();
    t.push(202, ok(json!({ "results_id": "r1" })));
    t.push(503, json!({}));
    let config = ClientConfig {
        member_poll_interval: Duration::from_secs(60),
        ..common::config()
    };
    let client = GroupMirror::new(&config, AccessToken::new("T"), Arc::new(t.clone()));
    let chat = client.group("g1");

    let stalled = chat.add_members(vec![NewMember::by_user_id("Ann", "uA")]);
    while t.request_count() < 2 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    chat.cancel_pending();
    assert_eq!(stalled.await.unwrap(), ChatResult::Failure);

    t.push(202, ok(json!({ "results_id": "r2" })));
    t.push(200, ok(json!({ "members": [member("mem-a", "uA", "Ann")] })));
    let result = chat
        .add_members(vec![NewMember::by_user_id("Ann", "uA")])
        .await
        .unwrap();

    assert_eq!(result, ChatResult::Success);
    assert!(chat.members().contains(&UserId::from("uA")));
    assert_eq!(t.request_count(), 4);
}
