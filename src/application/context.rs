//! Request context
//!
//! Per-request scratchpad: identity, diagnostics, the bounded breadcrumb
//! trail, cancelable stream registry, and the handle used to schedule
//! background work. Interior mutability is plain mutexes; nothing awaits
//! while holding one.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::value_objects::{Breadcrumb, BreadcrumbRing};
use crate::infrastructure::tasks::BackgroundScheduler;

/// Soft deadline for inline best-effort work when no scheduler exists
pub const INLINE_FALLBACK_DEADLINE: Duration = Duration::from_secs(2);

/// Debug behavior derived from config and query parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugFlags {
    pub enabled: bool,
    pub verbose: bool,
    /// `debug=view` replaces the body with the diagnostics dump
    pub view: bool,
}

/// Handle to a registered cancelable stream
#[derive(Debug, Clone)]
pub struct StreamHandle {
    id: u64,
    token: CancellationToken,
}

impl StreamHandle {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Per-request mutable state
pub struct RequestContext {
    pub id: Uuid,
    pub started_at: Instant,
    pub created_at: DateTime<Utc>,
    pub path: String,
    pub debug: DebugFlags,
    diagnostics: Mutex<serde_json::Map<String, Value>>,
    breadcrumbs: Mutex<BreadcrumbRing>,
    streams: Mutex<Vec<StreamHandle>>,
    next_stream_id: std::sync::atomic::AtomicU64,
    scheduler: Option<Arc<BackgroundScheduler>>,
}

impl RequestContext {
    pub fn new(
        method: &str,
        path: &str,
        query: &HashMap<String, String>,
        debug_enabled: bool,
        verbose: bool,
        scheduler: Option<Arc<BackgroundScheduler>>,
    ) -> Self {
        let debug_param = query.get("debug").map(String::as_str);
        let debug = DebugFlags {
            enabled: debug_enabled || debug_param.is_some(),
            verbose,
            view: debug_param == Some("view"),
        };

        let id = Uuid::new_v4();
        let mut diagnostics = serde_json::Map::new();
        diagnostics.insert("requestId".to_string(), json!(id.to_string()));
        diagnostics.insert("method".to_string(), json!(method));
        diagnostics.insert("path".to_string(), json!(path));

        Self {
            id,
            started_at: Instant::now(),
            created_at: Utc::now(),
            path: path.to_string(),
            debug,
            diagnostics: Mutex::new(diagnostics),
            breadcrumbs: Mutex::new(BreadcrumbRing::default()),
            streams: Mutex::new(Vec::new()),
            next_stream_id: std::sync::atomic::AtomicU64::new(0),
            scheduler,
        }
    }

    /// Appends a breadcrumb; O(1), drops the oldest at capacity
    pub fn add_breadcrumb(&self, category: &str, message: &str, data: Value) {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        tracing::debug!(request = %self.id, category, message, "breadcrumb");
        let mut ring = self
            .breadcrumbs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ring.push(Breadcrumb::new(category, message, data));
    }

    pub fn set_diagnostic(&self, key: &str, value: Value) {
        let mut diagnostics = self
            .diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        diagnostics.insert(key.to_string(), value);
    }

    /// Snapshot of the diagnostics bag plus the breadcrumb trail
    pub fn diagnostics_report(&self) -> Value {
        let diagnostics = self
            .diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        let breadcrumbs: Vec<Value> = self
            .breadcrumbs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|crumb| serde_json::to_value(crumb).unwrap_or(Value::Null))
            .collect();

        json!({
            "requestId": self.id.to_string(),
            "startedAt": self.created_at.to_rfc3339(),
            "elapsedMs": self.elapsed_ms(),
            "diagnostics": Value::Object(diagnostics),
            "breadcrumbs": breadcrumbs,
        })
    }

    /// Breadcrumb counts per category, for debug headers
    pub fn breadcrumb_counts(&self) -> Vec<(String, usize)> {
        self.breadcrumbs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .category_counts()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }

    /// Registers a cancelable stream and returns its handle
    pub fn register_stream(&self) -> StreamHandle {
        let handle = StreamHandle {
            id: self
                .next_stream_id
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        self.streams
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle.clone());
        handle
    }

    /// Removes a stream from the registry once it has completed
    pub fn unregister_stream(&self, handle: &StreamHandle) {
        self.streams
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|registered| registered.id != handle.id);
    }

    /// Cancels every registered stream; called at teardown
    pub fn cancel_streams(&self) {
        let streams = self
            .streams
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for handle in streams.iter() {
            handle.token.cancel();
        }
    }

    /// Hands work to the background scheduler. Without one, the work
    /// runs inline under a soft deadline; on elapse it is abandoned and
    /// a breadcrumb records the downgrade.
    pub async fn schedule_background<F>(&self, name: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match &self.scheduler {
            Some(scheduler) => scheduler.spawn(name, task),
            None => {
                if tokio::time::timeout(INLINE_FALLBACK_DEADLINE, task)
                    .await
                    .is_err()
                {
                    self.add_breadcrumb(
                        "background",
                        "inline fallback abandoned at soft deadline",
                        json!({ "task": name }),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn context(scheduler: Option<Arc<BackgroundScheduler>>) -> RequestContext {
        RequestContext::new("GET", "/videos/a.mp4", &HashMap::new(), false, false, scheduler)
    }

    #[test]
    fn test_debug_flags_from_query() {
        let mut query = HashMap::new();
        query.insert("debug".to_string(), "view".to_string());
        let ctx = RequestContext::new("GET", "/a", &query, false, false, None);
        assert!(ctx.debug.enabled);
        assert!(ctx.debug.view);
    }

    #[test]
    fn test_breadcrumbs_counted_by_category() {
        let ctx = context(None);
        ctx.add_breadcrumb("cache", "lookup", Value::Null);
        ctx.add_breadcrumb("cache", "miss", Value::Null);
        ctx.add_breadcrumb("origin", "matched", json!({"origin": "videos"}));

        assert_eq!(
            ctx.breadcrumb_counts(),
            vec![("cache".to_string(), 2), ("origin".to_string(), 1)]
        );
    }

    #[test]
    fn test_diagnostics_report_shape() {
        let ctx = context(None);
        ctx.set_diagnostic("cacheStatus", json!("MISS"));
        let report = ctx.diagnostics_report();
        assert_eq!(report["diagnostics"]["cacheStatus"], "MISS");
        assert_eq!(report["diagnostics"]["method"], "GET");
    }

    #[tokio::test]
    async fn test_schedule_with_scheduler_does_not_block() {
        let scheduler = Arc::new(BackgroundScheduler::default());
        let ctx = context(Some(scheduler.clone()));
        let done = Arc::new(AtomicBool::new(false));

        let flag = done.clone();
        ctx.schedule_background("write", async move {
            flag.store(true, Ordering::SeqCst);
        })
        .await;

        scheduler.drain().await;
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_inline_fallback_abandons_at_deadline() {
        let ctx = context(None);
        ctx.schedule_background("slow", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        })
        .await;

        let counts = ctx.breadcrumb_counts();
        assert_eq!(counts, vec![("background".to_string(), 1)]);
    }

    #[test]
    fn test_stream_registry_cancels_all() {
        let ctx = context(None);
        let first = ctx.register_stream();
        let second = ctx.register_stream();
        assert!(!first.token().is_cancelled());

        ctx.cancel_streams();
        assert!(first.token().is_cancelled());
        assert!(second.token().is_cancelled());
    }

    #[test]
    fn test_unregistered_stream_is_not_cancelled() {
        let ctx = context(None);
        let kept = ctx.register_stream();
        let removed = ctx.register_stream();
        ctx.unregister_stream(&removed);

        ctx.cancel_streams();
        assert!(kept.token().is_cancelled());
        assert!(!removed.token().is_cancelled());
    }
}
