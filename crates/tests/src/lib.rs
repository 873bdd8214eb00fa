//! Integration test harness for syphon.
//!
//! Provides instrumented http-style data sources that record every fetch
//! into shared [`FetchStats`], so end-to-end tests can assert how many
//! plain and batched fetches a plan actually issued and in what order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::{Value, json};
use syphon::{BatchFuture, DataSource, Env, FetchFuture, Identity, Plan, SourceRequest};

/// Fetch activity shared across the sources of one test.
#[derive(Debug, Default)]
pub struct FetchStats {
    singles: AtomicUsize,
    batches: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl FetchStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of plain `fetch` calls issued.
    pub fn singles(&self) -> usize {
        self.singles.load(Ordering::SeqCst)
    }

    /// Number of `fetch_multi` calls issued.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Every fetch in issue order; batched fetches record one entry.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().expect("stats log poisoned").clone()
    }

    fn record_single(&self, url: &str) {
        self.singles.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .expect("stats log poisoned")
            .push(url.to_string());
    }

    fn record_batch(&self, urls: &[String]) {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .expect("stats log poisoned")
            .push(format!("batch:{}", urls.join("+")));
    }
}

/// An unbatched http-style source: one fetch per request.
#[derive(Clone)]
pub struct HttpSource {
    pub url: String,
    pub params: Value,
    pub response: Value,
    pub delay: Option<Duration>,
    stats: Arc<FetchStats>,
}

impl HttpSource {
    pub fn new(url: &str, response: Value, stats: &Arc<FetchStats>) -> Self {
        Self {
            url: url.to_string(),
            params: json!({}),
            response,
            delay: None,
            stats: stats.clone(),
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Delay the response, to shuffle completion order in concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn plan(self) -> Plan {
        Plan::source(self)
    }
}

impl DataSource for HttpSource {
    fn identity(&self) -> Identity {
        Identity::new(json!({"url": self.url, "params": self.params}))
    }

    fn fetch(&self, _env: &Env) -> FetchFuture {
        self.stats.record_single(&self.url);
        let response = self.response.clone();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(json!({"body": response}))
        })
    }

    fn kind_name(&self) -> &'static str {
        "http"
    }
}

/// A batched http-style source: many requests per round trip.
#[derive(Clone)]
pub struct BatchedHttpSource {
    pub url: String,
    pub response: Value,
    /// When set, `fetch_multi` omits its peers' responses, violating the
    /// batch contract on purpose.
    pub omit_peers: bool,
    stats: Arc<FetchStats>,
}

impl BatchedHttpSource {
    pub fn new(url: &str, response: Value, stats: &Arc<FetchStats>) -> Self {
        Self {
            url: url.to_string(),
            response,
            omit_peers: false,
            stats: stats.clone(),
        }
    }

    pub fn omitting_peers(mut self) -> Self {
        self.omit_peers = true;
        self
    }

    pub fn plan(self) -> Plan {
        Plan::source(self)
    }

    fn batched_body(response: &Value) -> Value {
        let mut body = response.clone();
        if let Value::Object(map) = &mut body {
            map.insert("batched".to_string(), json!(true));
        }
        json!({"body": body})
    }
}

impl DataSource for BatchedHttpSource {
    fn identity(&self) -> Identity {
        Identity::new(json!({"url": self.url}))
    }

    fn fetch(&self, _env: &Env) -> FetchFuture {
        self.stats.record_single(&self.url);
        let response = self.response.clone();
        Box::pin(async move { Ok(json!({"body": response})) })
    }

    fn fetch_multi(&self, others: &[SourceRequest], _env: &Env) -> Option<BatchFuture> {
        let mut urls = vec![self.url.clone()];
        let mut responses = IndexMap::new();
        responses.insert(self.identity(), Self::batched_body(&self.response));

        if !self.omit_peers {
            for other in others {
                if let Some(peer) = other.downcast_ref::<BatchedHttpSource>() {
                    urls.push(peer.url.clone());
                    responses.insert(other.identity(), Self::batched_body(&peer.response));
                }
            }
        }

        self.stats.record_batch(&urls);
        Some(Box::pin(async move { Ok(responses) }))
    }

    fn kind_name(&self) -> &'static str {
        "batched-http"
    }
}

/// A source whose fetch always fails.
pub struct FailingHttpSource {
    pub url: String,
}

impl DataSource for FailingHttpSource {
    fn identity(&self) -> Identity {
        Identity::new(json!({"url": self.url}))
    }

    fn fetch(&self, _env: &Env) -> FetchFuture {
        Box::pin(async { Err("503 service unavailable".into()) })
    }

    fn kind_name(&self) -> &'static str {
        "failing-http"
    }
}
