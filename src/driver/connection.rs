use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

/// A CDP event received from the browser.
struct CdpEvent {
    method: String,
    params: Value,
}

/// Per-target WebSocket CDP connection.
///
/// The monitor drives one tab at a time, so reads are inline (no background
/// task) and the connection is single-owner.
pub struct CdpConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_id: u64,
    event_buffer: Vec<CdpEvent>,
}

impl CdpConnection {
    /// Connect to a per-target CDP WebSocket URL.
    pub async fn connect(url: &str) -> Result<Self> {
        debug!(url, "connecting CDP WebSocket");
        let (ws, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;
        debug!(url, "CDP WebSocket connected");

        Ok(Self {
            ws,
            next_id: 1,
            event_buffer: Vec::new(),
        })
    }

    /// Send a CDP command and wait for the matching response (by id).
    /// Events received while waiting are buffered for later retrieval.
    pub async fn call(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let msg = json!({
            "id": id,
            "method": method,
            "params": params,
        });

        self.ws
            .send(Message::Text(msg.to_string().into()))
            .await
            .with_context(|| format!("Failed to send CDP command {method}"))?;

        // Read messages until we get the matching response.
        loop {
            let raw = self
                .ws
                .next()
                .await
                .context("WebSocket closed while waiting for response")?
                .context("WebSocket error")?;

            let Message::Text(text) = raw else {
                continue; // Skip binary/ping/pong frames
            };

            let parsed: Value =
                serde_json::from_str(&text).context("Failed to parse CDP message")?;

            // Our response has the matching id.
            if parsed.get("id").and_then(|v| v.as_u64()) == Some(id) {
                if let Some(error) = parsed.get("error") {
                    bail!(
                        "CDP error for {method}: {}",
                        serde_json::to_string(error).unwrap_or_default()
                    );
                }
                return Ok(parsed.get("result").cloned().unwrap_or(Value::Null));
            }

            // Otherwise it's an event — buffer it.
            if let Some(event_method) = parsed.get("method").and_then(|v| v.as_str()) {
                self.event_buffer.push(CdpEvent {
                    method: event_method.to_string(),
                    params: parsed.get("params").cloned().unwrap_or(Value::Null),
                });
            }
        }
    }

    /// Wait for a specific CDP event (by method name).
    /// Checks the buffer first, then reads from the WebSocket.
    pub async fn wait_event(&mut self, method: &str) -> Result<Value> {
        if let Some(idx) = self.event_buffer.iter().position(|e| e.method == method) {
            return Ok(self.event_buffer.remove(idx).params);
        }

        loop {
            let raw = self
                .ws
                .next()
                .await
                .context("WebSocket closed while waiting for event")?
                .context("WebSocket error")?;

            let Message::Text(text) = raw else {
                continue;
            };

            let parsed: Value =
                serde_json::from_str(&text).context("Failed to parse CDP message")?;

            if let Some(event_method) = parsed.get("method").and_then(|v| v.as_str()) {
                let params = parsed.get("params").cloned().unwrap_or(Value::Null);
                if event_method == method {
                    return Ok(params);
                }
                // Buffer other events.
                self.event_buffer.push(CdpEvent {
                    method: event_method.to_string(),
                    params,
                });
            }
            // Ignore non-event messages (stale responses, etc.)
        }
    }

    /// Evaluate a synchronous JS expression and return the raw CDP result.
    pub async fn eval(&mut self, expression: &str) -> Result<Value> {
        let result = self
            .call(
                "Runtime.evaluate",
                json!({"expression": expression, "returnByValue": true}),
            )
            .await
            .context("JS evaluation failed")?;
        Self::check_js_exception(&result)?;
        Ok(result)
    }

    /// Evaluate a JS expression and await its promise.
    pub async fn eval_async(&mut self, expression: &str) -> Result<Value> {
        let snippet: String = expression.chars().take(80).collect();
        debug!(snippet, "eval_async");
        let result = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                }),
            )
            .await
            .context("JS evaluation failed")?;
        debug!("eval_async done");
        Self::check_js_exception(&result)?;
        Ok(result)
    }

    /// Capture the current viewport and return decoded PNG bytes.
    pub async fn capture_screenshot(&mut self) -> Result<Vec<u8>> {
        let result = self
            .call("Page.captureScreenshot", json!({"format": "png"}))
            .await
            .context("Failed to capture screenshot")?;

        let b64_data = result["data"]
            .as_str()
            .context("No screenshot data in response")?;

        use base64::Engine;
        base64::engine::general_purpose::STANDARD
            .decode(b64_data)
            .context("Failed to decode base64 screenshot")
    }

    /// Bail if a `Runtime.evaluate` result contains an exception.
    fn check_js_exception(result: &Value) -> Result<()> {
        if let Some(desc) = result
            .get("exceptionDetails")
            .and_then(|e| e.get("exception"))
            .and_then(|e| e.get("description"))
            .and_then(|d| d.as_str())
        {
            bail!("JS error: {desc}");
        }
        Ok(())
    }

    /// Wait for the page load event to fire.
    pub async fn wait_page_load(&mut self) -> Result<()> {
        debug!(
            buffered_events = self.event_buffer.len(),
            "waiting for Page.loadEventFired"
        );
        match tokio::time::timeout(
            Duration::from_secs(30),
            self.wait_event("Page.loadEventFired"),
        )
        .await
        {
            Ok(Ok(_)) => {
                debug!("page load event received");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(error = %format!("{e:#}"), "error waiting for page load");
                Err(e).context("Error waiting for page load")
            }
            Err(_) => {
                warn!("page load timed out after 30s, proceeding anyway");
                Ok(())
            }
        }
    }

    /// Navigate to a URL. Clears the event buffer first — events from prior
    /// navigations on this tab are stale and would pollute wait_page_load.
    pub async fn navigate(&mut self, url: &str) -> Result<()> {
        let stale = self.event_buffer.len();
        self.event_buffer.clear();
        debug!(url, stale_events_cleared = stale, "navigating");
        let result = self
            .call("Page.navigate", json!({"url": url}))
            .await
            .context("Failed to navigate")?;
        debug!(url, frame_id = ?result.get("frameId"), "navigation started");
        Ok(())
    }

    /// Set the emulated window size.
    pub async fn set_window_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await
        .context("Failed to set device metrics")?;
        Ok(())
    }

    /// Override the browser user agent for this tab.
    pub async fn set_user_agent(&mut self, user_agent: &str) -> Result<()> {
        self.call(
            "Network.setUserAgentOverride",
            json!({"userAgent": user_agent}),
        )
        .await
        .context("Failed to set user agent")?;
        Ok(())
    }

    /// Dispatch a trusted left-button click at page coordinates.
    pub async fn click_at(&mut self, x: f64, y: f64) -> Result<()> {
        for event_type in ["mousePressed", "mouseReleased"] {
            self.call(
                "Input.dispatchMouseEvent",
                json!({
                    "type": event_type,
                    "x": x,
                    "y": y,
                    "button": "left",
                    "clickCount": 1,
                }),
            )
            .await
            .with_context(|| format!("Failed to dispatch {event_type}"))?;
        }
        Ok(())
    }

    /// Enable the Page CDP domain (needed for load events and navigation).
    pub async fn enable_page_domain(&mut self) -> Result<()> {
        self.call("Page.enable", json!({}))
            .await
            .context("Failed to enable Page domain")?;
        Ok(())
    }
}
