mod common;

use std::time::Duration;

use bytes::Bytes;
use serde_json::json;

use common::{message, mirror, ok, page};
use groupmirror_client::{Chat, Queryable, Sendable};
use groupmirror_net::testing::ScriptedTransport;
use groupmirror_shared::ChatResult;
use groupmirror_store::{Attachment, AttachmentKind, Message, User};

const DELAY: Duration = Duration::from_millis(50);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_different_chats_run_in_parallel() {
    let t = ScriptedTransport::new().with_delay(DELAY);
    t.push(200, page(vec![message("a", 1_700_000_001, "u1")]));
    t.push(200, page(vec![message("b", 1_700_000_002, "u1")]));
    let client = mirror(&t);
    let first = client.group("g1");
    let second = client.group("g2");

    let (a, b) = tokio::join!(first.query_latest(), second.query_latest());

    assert_eq!(a.unwrap().result, ChatResult::Success);
    assert_eq!(b.unwrap().result, ChatResult::Success);
    assert_eq!(t.max_in_flight(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_same_chat_runs_one_at_a_time() {
    let t = ScriptedTransport::new().with_delay(DELAY);
    t.push(200, page(vec![message("a", 1_700_000_001, "u1")]));
    t.push(200, page(vec![message("b", 1_700_000_002, "u1")]));
    t.push(200, page(vec![message("c", 1_700_000_003, "u1")]));
    let chat = mirror(&t).group("g1");

    let first = chat.query_latest();
    let second = chat.query_latest();
    let third = chat.query_latest();
    assert!(chat.queued() >= 1);

    let (a, b, c) = tokio::join!(first, second, third);
    for outcome in [a, b, c] {
        assert_eq!(outcome.unwrap().result, ChatResult::Success);
    }
    assert_eq!(t.max_in_flight(), 1);
    assert_eq!(t.request_count(), 3);
    assert_eq!(chat.core().messages().read().await.len(), 3);
    assert_eq!(chat.queued(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_group_and_subgroup_queues_are_independent() {
    let t = ScriptedTransport::new();
    t.push(201, common::ok(common::subgroup("s1", "Sub1")));
    let chat = mirror(&t).group("g1");
    let sub = chat
        .create_subgroup("Sub1", None)
        .await
        .unwrap()
        .subgroup()
        .unwrap();

    t.push(200, page(vec![message("a", 1_700_000_001, "u1")]));
    t.push(200, page(vec![message("b", 1_700_000_002, "u1")]));

    let (a, b) = tokio::join!(chat.query_latest(), sub.query_latest());
    assert_eq!(a.unwrap().result, ChatResult::Success);
    assert_eq!(b.unwrap().result, ChatResult::Success);
    assert_eq!(chat.core().messages().read().await.len(), 1);
    assert_eq!(sub.core().messages().read().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shared_attachment_uploads_once_across_chats() {
    let t = ScriptedTransport::new().with_delay(DELAY);
    t.push(200, json!({ "payload": { "picture_url": "https://i.test/p1" } }));
    t.push(201, ok(json!({ "message": message("m1", 1_700_000_001, "u1") })));
    t.push(201, ok(json!({ "message": message("m2", 1_700_000_002, "u1") })));
    let client = mirror(&t);
    let first = client.group("g1");
    let second = client.group("g2");
    let me = first.members().upsert(User::new("u1", "Ada"));
    let picture = Attachment::from_bytes(AttachmentKind::Picture, Bytes::from_static(b"\xff\xd8"));

    let (a, b) = tokio::join!(
        first.send_message(Message::draft(me.clone(), "one").with_attachment(picture.clone())),
        second.send_message(Message::draft(me, "two").with_attachment(picture.clone())),
    );

    assert_eq!(a.unwrap(), ChatResult::Success);
    assert_eq!(b.unwrap(), ChatResult::Success);
    let uploads = t
        .requests()
        .iter()
        .filter(|r| r.url == "https://image.test/pictures")
        .count();
    assert_eq!(uploads, 1);
    assert_eq!(t.request_count(), 3);
    assert!(picture.is_resolved());
}
