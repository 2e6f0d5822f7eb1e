//! Structured per-request events.
//!
//! One event per request regardless of outcome, serialized as a single JSON
//! line. The sink is a trait so deployments can ship events elsewhere; the
//! default implementation writes through `tracing`.

use async_trait::async_trait;
use serde::Serialize;

/// Severity of a request event. Proxy-generated 4xx outcomes log as
/// warnings, 5xx as errors, everything else as info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestEvent {
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
    pub level: EventLevel,
    pub logger: &'static str,
    pub message: String,
    pub client_ip: String,
    pub mirror_host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_url: Option<String>,
    pub status_code: u16,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestEvent {
    pub fn now(message: String, level: EventLevel) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level,
            logger: "mirrorgate",
            message,
            client_ip: String::new(),
            mirror_host: String::new(),
            origin_url: None,
            status_code: 0,
            latency_ms: 0,
            user_agent: None,
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: &RequestEvent);
}

/// Default sink: one JSON line per event through `tracing`, at the event's
/// level. With the standard fmt subscriber this yields line-delimited JSON
/// payloads on stdout.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: &RequestEvent) {
        let line = match serde_json::to_string(event) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("request event serialization failed: {e}");
                return;
            }
        };
        match event.level {
            EventLevel::Info => tracing::info!(target: "mirrorgate::request", "{line}"),
            EventLevel::Warning => tracing::warn!(target: "mirrorgate::request", "{line}"),
            EventLevel::Error => tracing::error!(target: "mirrorgate::request", "{line}"),
        }
    }
}

/// Map a response status to the event level, honoring whether the proxy
/// itself produced the status or merely relayed it from the origin.
pub fn level_for(status: u16, proxy_generated: bool) -> EventLevel {
    if status >= 500 && proxy_generated {
        EventLevel::Error
    } else if status >= 400 && proxy_generated {
        EventLevel::Warning
    } else {
        EventLevel::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(level_for(502, true), EventLevel::Error);
        assert_eq!(level_for(429, true), EventLevel::Warning);
        assert_eq!(level_for(403, true), EventLevel::Warning);
        assert_eq!(level_for(200, false), EventLevel::Info);
        // Origin statuses are relayed, not proxy errors.
        assert_eq!(level_for(404, false), EventLevel::Info);
        assert_eq!(level_for(500, false), EventLevel::Info);
    }

    #[test]
    fn test_event_serializes_expected_keys() {
        let mut event = RequestEvent::now("proxy html".to_string(), EventLevel::Info);
        event.client_ip = "198.51.100.7".into();
        event.mirror_host = "mirror.com".into();
        event.origin_url = Some("https://source.com/".into());
        event.status_code = 200;
        event.latency_ms = 42;
        event.user_agent = Some("test-agent".into());

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        for key in [
            "timestamp",
            "level",
            "logger",
            "message",
            "client_ip",
            "mirror_host",
            "origin_url",
            "status_code",
            "latency_ms",
            "user_agent",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["level"], "info");
        assert_eq!(json["logger"], "mirrorgate");
    }
}
