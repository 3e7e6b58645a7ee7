//! Scripted [`Transport`] for tests.
//!
//! Responses are replayed in the order they were pushed; every request is
//! recorded so tests can assert on what was (or was not) sent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::transport::{ApiRequest, ApiResponse, Transport};

enum Scripted {
    Reply(ApiResponse),
    Fail(String),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Scripted>,
    requests: Vec<ApiRequest>,
    in_flight: usize,
    max_in_flight: usize,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<Mutex<Script>>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every response for `delay` before returning it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, status: u16, body: serde_json::Value) {
        self.push_raw(status, body.to_string());
    }

    pub fn push_raw(&self, status: u16, body: impl Into<Bytes>) {
        self.script()
            .replies
            .push_back(Scripted::Reply(ApiResponse::new(status, body)));
    }

    pub fn push_error(&self, reason: impl Into<String>) {
        self.script().replies.push_back(Scripted::Fail(reason.into()));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.script().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.script().requests.len()
    }

    /// Highest number of requests ever outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.script().max_in_flight
    }

    pub fn remaining(&self) -> usize {
        self.script().replies.len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let reply = {
            let mut script = self.script();
            script.requests.push(request);
            script.in_flight += 1;
            script.max_in_flight = script.max_in_flight.max(script.in_flight);
            script.replies.pop_front()
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.script().in_flight -= 1;
        match reply {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail(reason)) => Err(TransportError::Unavailable(reason)),
            None => Err(TransportError::Unavailable("script exhausted".into())),
        }
    }
}
