//! Message paging.
//!
//! A page request names at most one reference message (`before_id`,
//! `after_id` or `since_id`) plus a `limit`.  Received messages are folded
//! into the chat's [`MessageStore`] one at a time; a failure part-way leaves
//! earlier merges in place.

use tokio::sync::RwLock;
use tracing::{debug, warn};

use groupmirror_shared::constants::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use groupmirror_shared::protocol::MessagesPage;
use groupmirror_shared::{ChatResult, GroupId, MessageId};
use groupmirror_store::mirror::message_from_wire;
use groupmirror_store::{InsertOutcome, MemberSet, MessageStore};

use crate::context::ApiContext;
use crate::error::SyncError;
use crate::transport::ApiRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageQuery {
    /// Most recent page, no reference message.
    Latest,
    /// Strictly older than the reference, newest first.
    Before(MessageId),
    /// Immediately following the reference.
    After(MessageId),
    /// Most recent messages newer than the reference.
    Since(MessageId),
}

impl MessageQuery {
    /// Query parameter naming the reference message, if any.
    pub fn param(&self) -> Option<(&'static str, &MessageId)> {
        match self {
            MessageQuery::Latest => None,
            MessageQuery::Before(id) => Some(("before_id", id)),
            MessageQuery::After(id) => Some(("after_id", id)),
            MessageQuery::Since(id) => Some(("since_id", id)),
        }
    }

    fn is_valid(&self) -> bool {
        self.param().map_or(true, |(_, id)| !id.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: MessageQuery,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::latest(DEFAULT_PAGE_LIMIT)
    }
}

impl PageRequest {
    pub fn latest(limit: u32) -> Self {
        Self {
            query: MessageQuery::Latest,
            limit,
        }
    }

    pub fn before(id: impl Into<MessageId>, limit: u32) -> Self {
        Self {
            query: MessageQuery::Before(id.into()),
            limit,
        }
    }

    pub fn after(id: impl Into<MessageId>, limit: u32) -> Self {
        Self {
            query: MessageQuery::After(id.into()),
            limit,
        }
    }

    pub fn since(id: impl Into<MessageId>, limit: u32) -> Self {
        Self {
            query: MessageQuery::Since(id.into()),
            limit,
        }
    }

    /// Limit actually sent, kept within what the service accepts.
    pub fn effective_limit(&self) -> u32 {
        let clamped = self.limit.clamp(1, MAX_PAGE_LIMIT);
        if clamped != self.limit {
            warn!(requested = self.limit, sent = clamped, "Clamped page limit");
        }
        clamped
    }

    /// `None` when the reference id is empty.
    pub fn build_request(&self, ctx: &ApiContext, group: &GroupId) -> Option<ApiRequest> {
        if !self.query.is_valid() {
            return None;
        }
        let mut request = ApiRequest::get(ctx.endpoints().messages(group));
        if let Some((param, id)) = self.query.param() {
            request = request.query(param, id.as_str());
        }
        request = request.query("limit", self.effective_limit().to_string());
        Some(ctx.with_token_param(request))
    }
}

/// Result of one page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    pub result: ChatResult,
    pub received: usize,
    pub inserted: usize,
}

impl PageOutcome {
    fn rejected(result: ChatResult) -> Self {
        Self {
            result,
            received: 0,
            inserted: 0,
        }
    }
}

/// Fetch one page for `group` and merge it into `store`.
pub async fn query_into(
    ctx: &ApiContext,
    group: &GroupId,
    page: &PageRequest,
    members: &MemberSet,
    store: &RwLock<MessageStore>,
) -> Result<PageOutcome, SyncError> {
    let Some(request) = page.build_request(ctx, group) else {
        warn!(group_id = %group, query = ?page.query, "Empty reference id in page query");
        return Ok(PageOutcome::rejected(ChatResult::InvalidQueryType));
    };

    let response = ctx.send(request).await?;
    if !response.is(200) {
        debug!(group_id = %group, status = response.status, "Page request not OK");
        return Ok(PageOutcome::rejected(ChatResult::Failure));
    }

    let body: MessagesPage = response.payload("messages page")?;
    let received = body.messages.len();
    let mut inserted = 0;
    {
        let mut store = store.write().await;
        for wire in body.messages {
            let message = message_from_wire(wire, members)?;
            if store.insert(message) == InsertOutcome::Inserted {
                inserted += 1;
            }
        }
    }

    debug!(group_id = %group, received, inserted, "Merged message page");
    Ok(PageOutcome {
        result: ChatResult::Success,
        received,
        inserted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::context::{AccessToken, Endpoints};
    use crate::testing::ScriptedTransport;

    fn ctx(t: &ScriptedTransport) -> ApiContext {
        ApiContext::new(
            Arc::new(t.clone()),
            AccessToken::new("T"),
            Endpoints::new("https://api.test/v3", "https://i", "https://f", "https://v"),
        )
    }

    fn message(id: &str, ts: i64) -> serde_json::Value {
        json!({
            "id": id,
            "source_guid": format!("g-{id}"),
            "created_at": ts,
            "user_id": "u1",
            "name": "Ada",
            "text": "hi",
            "favorited_by": [],
            "attachments": []
        })
    }

    #[test]
    fn test_each_mode_names_one_reference() {
        let t = ScriptedTransport::new();
        let ctx = ctx(&t);
        let group = GroupId::from("g");
        let params = ["before_id", "after_id", "since_id"];

        for (page, expected) in [
            (PageRequest::before("m1", 20), "before_id"),
            (PageRequest::after("m1", 20), "after_id"),
            (PageRequest::since("m1", 20), "since_id"),
        ] {
            let req = page.build_request(&ctx, &group).unwrap();
            let present: Vec<_> = params
                .iter()
                .filter(|p| req.query_value(p).is_some())
                .collect();
            assert_eq!(present, vec![&expected]);
            assert_eq!(req.query_value("limit"), Some("20"));
        }
    }

    #[test]
    fn test_latest_scenario_url() {
        let t = ScriptedTransport::new();
        let req = PageRequest::latest(50)
            .build_request(&ctx(&t), &GroupId::from("123"))
            .unwrap();
        assert_eq!(
            req.target(),
            "https://api.test/v3/groups/123/messages?limit=50&token=T"
        );
    }

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(PageRequest::latest(500).effective_limit(), 100);
        assert_eq!(PageRequest::latest(0).effective_limit(), 1);
        assert_eq!(PageRequest::default().effective_limit(), 20);
    }

    #[tokio::test]
    async fn test_empty_reference_sends_nothing() {
        let t = ScriptedTransport::new();
        let store = RwLock::new(MessageStore::new());
        let outcome = query_into(
            &ctx(&t),
            &GroupId::from("g"),
            &PageRequest::before("", 20),
            &MemberSet::new(),
            &store,
        )
        .await
        .unwrap();
        assert_eq!(outcome.result, ChatResult::InvalidQueryType);
        assert_eq!(t.request_count(), 0);
    }

    #[tokio::test]
    async fn test_page_merges_into_store() {
        let t = ScriptedTransport::new();
        t.push(
            200,
            json!({
                "response": {"count": 3, "messages": [
                    message("m3", 1_700_000_030),
                    message("m2", 1_700_000_020),
                    message("m1", 1_700_000_010)
                ]},
                "meta": {"code": 200}
            }),
        );
        let store = RwLock::new(MessageStore::new());

        let outcome = query_into(
            &ctx(&t),
            &GroupId::from("123"),
            &PageRequest::latest(50),
            &MemberSet::new(),
            &store,
        )
        .await
        .unwrap();

        assert_eq!(outcome.result, ChatResult::Success);
        assert_eq!(outcome.inserted, 3);
        let store = store.read().await;
        let ids: Vec<_> = store
            .iter()
            .filter_map(|m| m.id.as_ref().map(|id| id.as_str().to_string()))
            .collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[tokio::test]
    async fn test_non_ok_status_is_failure() {
        let t = ScriptedTransport::new();
        t.push(500, json!({"meta": {"code": 500}}));
        let store = RwLock::new(MessageStore::new());

        let outcome = query_into(
            &ctx(&t),
            &GroupId::from("g"),
            &PageRequest::latest(20),
            &MemberSet::new(),
            &store,
        )
        .await
        .unwrap();
        assert_eq!(outcome.result, ChatResult::Failure);
        assert!(store.read().await.is_empty());
    }
}
