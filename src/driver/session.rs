use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::debug;

use super::chrome::Chrome;
use super::connection::CdpConnection;
use super::scripts;

/// Browser handle: owns a Chrome instance and produces `MonitorSession`s.
pub struct Browser {
    chrome: Chrome,
}

impl Browser {
    /// Launch a local Chrome, or connect to a remote one when `chrome_url`
    /// is set.
    pub async fn launch(chrome_url: Option<&str>) -> Result<Self> {
        let chrome = match chrome_url {
            Some(url) => Chrome::connect(url)
                .await
                .with_context(|| format!("Failed to connect to remote Chrome at {url}"))?,
            None => Chrome::launch().await.context("Failed to launch Chrome")?,
        };
        Ok(Self { chrome })
    }

    /// Open a fresh tab and prepare it for scripted driving.
    pub async fn new_session(
        &self,
        element_timeout: Duration,
        user_agent: Option<&str>,
    ) -> Result<MonitorSession> {
        let (target_id, ws_url) = self.chrome.create_tab().await?;
        debug!(target_id = %target_id, ws_url = %ws_url, "connecting to tab");
        let mut conn = CdpConnection::connect(&ws_url).await?;
        conn.enable_page_domain().await?;
        // "default" (or absent) leaves the browser's own user agent.
        if let Some(ua) = user_agent
            && !ua.is_empty()
            && ua != "default"
        {
            conn.set_user_agent(ua).await?;
        }
        debug!(target_id = %target_id, "session ready");
        Ok(MonitorSession {
            conn,
            target_id,
            frame_path: Vec::new(),
            element_timeout,
        })
    }

    /// Close a session: drop the WebSocket connection, then close the tab.
    pub async fn close_session(&self, session: MonitorSession) -> Result<()> {
        let target_id = session.target_id;
        drop(session.conn);
        self.chrome.close_tab(&target_id).await
    }
}

/// One tab plus its frame context and element-wait budget. This is the
/// driver surface the runner times steps around.
pub struct MonitorSession {
    conn: CdpConnection,
    target_id: String,
    /// Stack of iframe indices scoping element lookups. Reset on navigation.
    frame_path: Vec<usize>,
    element_timeout: Duration,
}

impl MonitorSession {
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Open a URL and wait for the load event. Resets the frame context.
    pub async fn navigate(&mut self, url: &str) -> Result<()> {
        self.frame_path.clear();
        self.conn.navigate(url).await?;
        self.conn.wait_page_load().await
    }

    pub async fn set_window_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.conn.set_window_size(width, height).await
    }

    /// Scope subsequent lookups to the Nth iframe of the current document.
    /// Fails when the frame is missing or its document is not scriptable
    /// (cross-origin).
    pub async fn switch_frame(&mut self, index: usize) -> Result<()> {
        let mut path = self.frame_path.clone();
        path.push(index);
        let result = self.conn.eval(&scripts::frame_probe_js(&path)).await?;
        if result["result"]["value"].as_bool() != Some(true) {
            bail!("Frame {index} not found or not scriptable (cross-origin?)");
        }
        debug!(index, depth = path.len(), "switched frame context");
        self.frame_path = path;
        Ok(())
    }

    /// Poll until `selector` matches inside the current frame document,
    /// bounded by the element timeout.
    pub async fn wait_for_element(&mut self, selector: &str) -> Result<()> {
        let js = scripts::wait_for_element_js(
            &self.frame_path,
            selector,
            self.element_timeout.as_millis() as u64,
        );
        self.conn
            .eval_async(&js)
            .await
            .with_context(|| format!("Timed out waiting for element {selector}"))?;
        Ok(())
    }

    /// Wait for `selector`, then click the element's center with a trusted
    /// mouse event (frame offsets accounted for).
    pub async fn click(&mut self, selector: &str) -> Result<()> {
        self.wait_for_element(selector).await?;

        let js = scripts::element_center_js(&self.frame_path, selector);
        let result = self.conn.eval(&js).await?;
        let value = &result["result"]["value"];
        if value.is_null() {
            bail!("No element matching {selector}");
        }
        let x = value["x"].as_f64().context("No x in element center")?;
        let y = value["y"].as_f64().context("No y in element center")?;

        debug!(selector, x, y, "clicking");
        self.conn.click_at(x, y).await
    }

    /// Viewport screenshot as PNG bytes (failure artifacts).
    pub async fn screenshot(&mut self) -> Result<Vec<u8>> {
        self.conn.capture_screenshot().await
    }
}
