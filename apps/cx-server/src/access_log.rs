use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::{ConnectInfo, MatchedPath};
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

#[derive(Clone, Debug)]
struct Cfg {
    enabled: bool,
    sample_n: u64,
    ua: bool,
    trust_forward: bool,
}

impl Cfg {
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).as_deref() == Some("1");
        Self {
            enabled: flag("CX_ACCESS_LOG"),
            sample_n: lookup("CX_ACCESS_SAMPLE_N")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1)
                .max(1),
            ua: flag("CX_ACCESS_UA"),
            trust_forward: flag("CX_TRUST_FORWARD_HEADERS"),
        }
    }
}

static CFG: Lazy<Cfg> = Lazy::new(|| Cfg::from_lookup(|key| std::env::var(key).ok()));

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn first_forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    let ip = value.split(',').next().unwrap_or("").trim();
    (!ip.is_empty()).then(|| ip.to_string())
}

fn access_line(
    method: &str,
    path: &str,
    status: u16,
    dur_ms: u64,
    remote: Option<String>,
    ua: Option<&str>,
) -> Value {
    let mut obj = json!({
        "ts": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "method": method,
        "path": path,
        "status": status,
        "dur_ms": dur_ms,
    });
    if let Some(ip) = remote {
        obj["remote"] = Value::String(ip);
    }
    if let Some(ua) = ua {
        obj["ua"] = Value::String(ua.to_string());
    }
    obj
}

/// Emits one JSON line per request on the `http.access` target when
/// `CX_ACCESS_LOG=1`.
pub async fn access_log_mw(req: Request<axum::body::Body>, next: Next) -> Response {
    if !CFG.enabled {
        return next.run(req).await;
    }
    let started = Instant::now();
    let method = req.method().clone();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let connected = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0.ip().to_string());
    let remote = if CFG.trust_forward {
        first_forwarded_ip(req.headers()).or(connected)
    } else {
        connected
    };
    let ua = CFG
        .ua
        .then(|| {
            req.headers()
                .get(axum::http::header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        })
        .flatten();
    let res = next.run(req).await;
    let n = COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    if CFG.sample_n > 1 && n % CFG.sample_n != 0 {
        return res;
    }
    let line = access_line(
        method.as_str(),
        &path,
        res.status().as_u16(),
        started.elapsed().as_millis() as u64,
        remote,
        ua.as_deref(),
    );
    tracing::info!(target: "http.access", "{}", line);
    res
}
