#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use groupmirror_client::{ClientConfig, GroupMirror};
use groupmirror_net::testing::ScriptedTransport;
use groupmirror_net::AccessToken;

pub const API: &str = "https://api.test/v3";

pub fn config() -> ClientConfig {
    ClientConfig {
        api_base: API.to_string(),
        image_base: "https://image.test".to_string(),
        file_base: "https://file.test/v1".to_string(),
        video_base: "https://video.test".to_string(),
        member_poll_interval: Duration::from_millis(1),
        upload_poll_interval: Duration::from_millis(1),
        member_poll_max_attempts: 5,
        upload_poll_max_attempts: 5,
        ..ClientConfig::default()
    }
}

pub fn mirror(transport: &ScriptedTransport) -> GroupMirror {
    GroupMirror::new(&config(), AccessToken::new("T"), Arc::new(transport.clone()))
}

pub fn ok(response: Value) -> Value {
    json!({ "response": response, "meta": { "code": 200 } })
}

pub fn message(id: &str, created_at: i64, user_id: &str) -> Value {
    json!({
        "id": id,
        "source_guid": format!("guid-{id}"),
        "created_at": created_at,
        "user_id": user_id,
        "name": "Someone",
        "text": format!("text of {id}"),
        "favorited_by": [],
        "attachments": []
    })
}

pub fn page(messages: Vec<Value>) -> Value {
    ok(json!({ "count": messages.len(), "messages": messages }))
}

pub fn subgroup(id: &str, topic: &str) -> Value {
    json!({
        "id": id,
        "parent_id": "g1",
        "topic": topic,
        "created_at": 1_700_000_000
    })
}

pub fn group(id: &str, name: &str, members: Vec<Value>) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": "a group",
        "creator_user_id": "u1",
        "created_at": 1_600_000_000,
        "updated_at": 1_700_000_000,
        "members": members,
        "share_url": "https://groupme.test/join/abc",
        "type": "private",
        "office_mode": false,
        "requires_approval": true,
        "show_join_question": false
    })
}

pub fn member(membership: &str, user_id: &str, nickname: &str) -> Value {
    json!({ "id": membership, "user_id": user_id, "nickname": nickname })
}
