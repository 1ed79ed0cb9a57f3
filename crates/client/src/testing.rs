//! In-process origin and context helpers for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use stacks_core::{AppConfig, CacheDb, Error};

use crate::context::LayerContext;
use crate::fetch::{FetchResponse, Origin};

#[derive(Clone)]
enum Reply {
    Body { status: u16, content_type: &'static str, body: Bytes },
    /// Body is the number of calls made to this path so far.
    Counter,
    Fail,
    /// Never answers; the caller must drop the future.
    Pending,
}

/// Origin answering from a path → reply script.
///
/// Unscripted paths answer 404. `set_offline(true)` makes every fetch a
/// transport failure.
#[derive(Default)]
pub struct ScriptedOrigin {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
    offline: AtomicBool,
}

impl ScriptedOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self, path: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(path.to_string(), reply);
    }

    pub fn respond(&self, path: &str, status: u16, content_type: &'static str, body: &str) {
        self.script(path, Reply::Body { status, content_type, body: Bytes::from(body.to_string()) });
    }

    pub fn respond_counting(&self, path: &str) {
        self.script(path, Reply::Counter);
    }

    pub fn fail(&self, path: &str) {
        self.script(path, Reply::Fail);
    }

    pub fn hang(&self, path: &str) {
        self.script(path, Reply::Pending);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Origin for ScriptedOrigin {
    async fn fetch(&self, _method: &str, url: &Url, _headers: &HeaderMap) -> Result<FetchResponse, Error> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let key = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };
        let count = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        tokio::task::yield_now().await;

        let reply = self.replies.lock().unwrap().get(&key).cloned();
        if matches!(reply, Some(Reply::Pending)) {
            std::future::pending::<()>().await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Transport(format!("offline: {url}")));
        }

        let (status, content_type, body) = match reply {
            Some(Reply::Body { status, content_type, body }) => (status, content_type, body),
            Some(Reply::Counter) => (200, "text/plain", Bytes::from(count.to_string())),
            Some(Reply::Fail) => return Err(Error::Transport(format!("connection reset: {url}"))),
            Some(Reply::Pending) => unreachable!(),
            None => (404, "text/plain", Bytes::from_static(b"not found")),
        };

        Ok(FetchResponse {
            url: url.clone(),
            final_url: url.clone(),
            status,
            headers: HeaderMap::from_iter([(CONTENT_TYPE, HeaderValue::from_static(content_type))]),
            bytes: body,
            fetch_ms: 0,
        })
    }
}

pub fn test_config() -> AppConfig {
    AppConfig { origin_url: "https://library.test".into(), ..Default::default() }
}

/// Context over a fresh in-memory store.
pub async fn test_context(config: &AppConfig, origin: Arc<ScriptedOrigin>) -> Arc<LayerContext> {
    let db = CacheDb::open_in_memory().await.unwrap();
    Arc::new(LayerContext::new(config, db, origin).unwrap())
}
