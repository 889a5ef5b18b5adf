use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

const COLLECTOR_BASE: &str = "https://insights-collector.newrelic.com";

/// Fixed per-run metadata attached to every remote event.
///
/// Captured once during config resolution and injected here — the client
/// never reads the process environment itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvMetadata {
    pub job_id: String,
    pub monitor_id: String,
    pub account_id: String,
    pub location: String,
    pub proxy_host: String,
    pub proxy_port: String,
}

impl EnvMetadata {
    /// Read the conventional environment variables, missing ones empty.
    pub fn capture() -> Self {
        let var = |k: &str| std::env::var(k).unwrap_or_default();
        Self {
            job_id: var("JOB_ID"),
            monitor_id: var("MONITOR_ID"),
            account_id: var("ACCOUNT_ID"),
            location: var("LOCATION"),
            proxy_host: var("PROXY_HOST"),
            proxy_port: var("PROXY_PORT"),
        }
    }
}

/// A structured event bound for the collector.
///
/// `custom` holds extension fields; during payload assembly the fixed
/// metadata is written first and custom fields override on key collision.
#[derive(Debug, Clone)]
pub struct InsightsEvent {
    pub event_type: String,
    pub step: u64,
    pub message: String,
    pub duration_ms: u64,
    pub custom: BTreeMap<String, Value>,
}

impl Default for InsightsEvent {
    fn default() -> Self {
        Self {
            event_type: "SyntheticsCustom".to_string(),
            step: 0,
            message: String::new(),
            duration_ms: 0,
            custom: BTreeMap::new(),
        }
    }
}

impl InsightsEvent {
    /// A per-step timing event.
    pub fn step(step: u64, message: &str, duration: Duration) -> Self {
        Self {
            step,
            message: message.to_string(),
            duration_ms: duration.as_millis() as u64,
            ..Self::default()
        }
    }

    /// A `SyntheticsTests` pass/fail event for a whole test case.
    pub fn test_result(test_case: &str, passed: bool) -> Self {
        let mut event = Self {
            event_type: "SyntheticsTests".to_string(),
            ..Self::default()
        };
        event.custom.insert("testCase".into(), json!(test_case));
        event.custom.insert(
            "testCaseStatus".into(),
            json!(if passed { "Pass" } else { "Fail" }),
        );
        event
    }

    pub fn with_custom(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.custom.insert(key.to_string(), value.into());
        self
    }
}

/// Fire-and-forget client for the Insights collector.
///
/// Disabled (every post is a no-op) when the insert key is empty.
#[derive(Debug, Clone)]
pub struct InsightsClient {
    http: reqwest::Client,
    key: String,
    endpoint: String,
    meta: EnvMetadata,
}

impl InsightsClient {
    pub fn new(key: &str, collector_base: Option<&str>, meta: EnvMetadata) -> Self {
        let base = collector_base
            .unwrap_or(COLLECTOR_BASE)
            .trim_end_matches('/');
        let endpoint = format!("{base}/v1/accounts/{}/events", meta.account_id);
        Self {
            http: reqwest::Client::new(),
            key: key.to_string(),
            endpoint,
            meta,
        }
    }

    /// A client with no key — every post is dropped.
    pub fn disabled() -> Self {
        Self::new("", None, EnvMetadata::default())
    }

    pub fn enabled(&self) -> bool {
        !self.key.is_empty()
    }

    /// Assemble the wire payload: fixed metadata first, custom fields last
    /// so they override on collision.
    fn payload(&self, event: &InsightsEvent) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert("eventType".into(), json!(event.event_type));
        body.insert("step".into(), json!(event.step));
        body.insert("message".into(), json!(event.message));
        body.insert("duration".into(), json!(event.duration_ms));
        body.insert("JOB_ID".into(), json!(self.meta.job_id));
        body.insert("MONITOR_ID".into(), json!(self.meta.monitor_id));
        body.insert("ACCOUNT_ID".into(), json!(self.meta.account_id));
        body.insert("LOCATION".into(), json!(self.meta.location));
        body.insert("PROXY_HOST".into(), json!(self.meta.proxy_host));
        body.insert("PROXY_PORT".into(), json!(self.meta.proxy_port));
        for (k, v) in &event.custom {
            body.insert(k.clone(), v.clone());
        }
        body
    }

    /// Submit an event on a detached task. Deliberately not awaited: the
    /// caller never blocks on telemetry, the outcome is never retried, and a
    /// submission may still be in flight when the process exits.
    pub fn post_detached(&self, event: InsightsEvent) {
        if !self.enabled() {
            return;
        }
        let request = self
            .http
            .post(&self.endpoint)
            .header("X-Insert-Key", &self.key)
            .json(&self.payload(&event));
        let endpoint = self.endpoint.clone();
        tokio::spawn(async move {
            match request.send().await {
                Ok(resp) => debug!(status = %resp.status(), %endpoint, "insights event posted"),
                Err(e) => debug!(error = %e, %endpoint, "insights post failed (best effort)"),
            }
        });
    }
}

/// Local key-value observability sink, used when remote reporting is off and
/// for auxiliary fields (error step, message, test case status).
#[derive(Debug, Clone, Default)]
pub struct InsightsStore {
    entries: BTreeMap<String, Value>,
}

impl InsightsStore {
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> EnvMetadata {
        EnvMetadata {
            job_id: "job-1".into(),
            monitor_id: "mon-1".into(),
            account_id: "12345".into(),
            location: "AWS_US_EAST_1".into(),
            proxy_host: String::new(),
            proxy_port: String::new(),
        }
    }

    #[test]
    fn endpoint_is_built_from_account_id() {
        let client = InsightsClient::new("k", None, meta());
        assert_eq!(
            client.endpoint,
            "https://insights-collector.newrelic.com/v1/accounts/12345/events"
        );
    }

    #[test]
    fn collector_base_override() {
        let client = InsightsClient::new("k", Some("http://localhost:8080/"), meta());
        assert_eq!(client.endpoint, "http://localhost:8080/v1/accounts/12345/events");
    }

    #[test]
    fn empty_key_disables_client() {
        assert!(!InsightsClient::disabled().enabled());
        assert!(InsightsClient::new("k", None, meta()).enabled());
    }

    #[test]
    fn payload_carries_fixed_metadata() {
        let client = InsightsClient::new("k", None, meta());
        let event = InsightsEvent::step(3, "Click css(.st-bw)", Duration::from_millis(250));
        let body = client.payload(&event);
        assert_eq!(body["eventType"], json!("SyntheticsCustom"));
        assert_eq!(body["step"], json!(3));
        assert_eq!(body["message"], json!("Click css(.st-bw)"));
        assert_eq!(body["duration"], json!(250));
        assert_eq!(body["JOB_ID"], json!("job-1"));
        assert_eq!(body["MONITOR_ID"], json!("mon-1"));
        assert_eq!(body["ACCOUNT_ID"], json!("12345"));
        assert_eq!(body["LOCATION"], json!("AWS_US_EAST_1"));
    }

    #[test]
    fn custom_fields_override_fixed_metadata() {
        let client = InsightsClient::new("k", None, meta());
        let event = InsightsEvent::step(1, "m", Duration::ZERO).with_custom("LOCATION", "override");
        let body = client.payload(&event);
        assert_eq!(body["LOCATION"], json!("override"));
    }

    #[test]
    fn test_result_event_shape() {
        let event = InsightsEvent::test_result("Sample Size for Proportions", true);
        assert_eq!(event.event_type, "SyntheticsTests");
        assert_eq!(event.custom["testCaseStatus"], json!("Pass"));
        let event = InsightsEvent::test_result("Sample Size for Proportions", false);
        assert_eq!(event.custom["testCaseStatus"], json!("Fail"));
    }

    #[test]
    fn store_last_write_wins() {
        let mut store = InsightsStore::default();
        store.set("testCaseStatus", "Fail");
        store.set("testCaseStatus", "Pass");
        assert_eq!(store.get("testCaseStatus"), Some(&json!("Pass")));
    }
}
