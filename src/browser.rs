//! Single-slot headless browser lane.
//!
//! Browser-automation adapters share one [`BrowserLane`]. A lane owns a
//! one-permit semaphore, so at most one browser process exists at a time no
//! matter how adapters are scheduled. [`BrowserLane::lease`] acquires the
//! permit and launches a session; the returned [`BrowserLease`] gives the
//! permit back when it is released or dropped, which also covers timeouts
//! and aborted tasks.
//!
//! The production launcher drives headless Chromium through `chromiumoxide`.

use crate::error::AdapterError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// One running browser with a single page.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait `settle` for client-side rendering.
    async fn goto(&mut self, url: &str, settle: Duration) -> Result<(), AdapterError>;

    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate(&mut self, script: &str) -> Result<Value, AdapterError>;

    /// Serialised DOM of the current page.
    async fn content(&mut self) -> Result<String, AdapterError>;

    /// Shut the browser down.
    async fn close(self: Box<Self>) -> Result<(), AdapterError>;
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AdapterError>;
}

/// The exclusive lane browser adapters run on.
pub struct BrowserLane {
    slot: Arc<Semaphore>,
    launcher: Arc<dyn BrowserLauncher>,
}

impl fmt::Debug for BrowserLane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserLane")
            .field("available", &self.slot.available_permits())
            .finish()
    }
}

impl BrowserLane {
    pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
            launcher,
        }
    }

    /// Wait for the lane, then launch a browser on it.
    ///
    /// If the launch fails the slot is released before returning.
    pub async fn lease(&self) -> Result<BrowserLease, AdapterError> {
        let permit = Arc::clone(&self.slot)
            .acquire_owned()
            .await
            .map_err(AdapterError::browser)?;
        debug!("Browser lane acquired");
        let session = self.launcher.launch().await?;
        Ok(BrowserLease {
            session: Some(session),
            _permit: permit,
        })
    }
}

/// Exclusive use of a browser session.
pub struct BrowserLease {
    session: Option<Box<dyn BrowserSession>>,
    _permit: OwnedSemaphorePermit,
}

impl BrowserLease {
    fn session(&mut self) -> Result<&mut Box<dyn BrowserSession>, AdapterError> {
        self.session
            .as_mut()
            .ok_or_else(|| AdapterError::browser("browser session already released"))
    }

    pub async fn goto(&mut self, url: &str, settle: Duration) -> Result<(), AdapterError> {
        self.session()?.goto(url, settle).await
    }

    pub async fn evaluate(&mut self, script: &str) -> Result<Value, AdapterError> {
        self.session()?.evaluate(script).await
    }

    pub async fn content(&mut self) -> Result<String, AdapterError> {
        self.session()?.content().await
    }

    /// Navigate, settle and return the rendered page.
    pub async fn render(&mut self, url: &str, settle: Duration) -> Result<String, AdapterError> {
        self.goto(url, settle).await?;
        self.content().await
    }

    /// Close the browser and give the lane back.
    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!(error = %e, "Browser did not close cleanly");
            }
        }
        debug!("Browser lane released");
    }
}

impl Drop for BrowserLease {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            debug!("Browser lease dropped without release; session torn down");
        }
    }
}

/// Launches headless Chromium.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    user_agent: String,
}

impl ChromiumLauncher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    #[instrument(level = "info", skip_all)]
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AdapterError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", self.user_agent))
            .window_size(1920, 1080)
            .build()
            .map_err(AdapterError::browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(AdapterError::browser)?;

        // Spawn browser handler
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(AdapterError::browser(e));
            }
        };

        info!("Chromium launched");
        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
        }))
    }
}

/// A Chromium process with one page.
///
/// Dropping the session kills the process (`chromiumoxide` kills its child on
/// drop) and stops the event handler.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str, settle: Duration) -> Result<(), AdapterError> {
        self.page.goto(url).await.map_err(AdapterError::browser)?;
        if let Err(e) = self.page.wait_for_navigation().await {
            debug!(%url, error = %e, "Navigation wait failed");
        }
        tokio::time::sleep(settle).await;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, AdapterError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(AdapterError::browser)?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn content(&mut self) -> Result<String, AdapterError> {
        self.page.content().await.map_err(AdapterError::browser)
    }

    async fn close(self: Box<Self>) -> Result<(), AdapterError> {
        let mut this = *self;
        this.browser.close().await.map_err(AdapterError::browser)?;
        if let Err(e) = this.browser.wait().await {
            debug!(error = %e, "Waiting for Chromium exit failed");
        }
        Ok(())
    }
}
