//! Headless Chromium driver built on chromiumoxide
//!
//! One browser and one page are launched lazily on first use and reused by
//! every UI probe of the run, so a sign-in performed by one probe carries over
//! to the probes after it.

use super::{BrowserDriver, ElementInfo, IdleTracker, Locator, NetworkSample, Target};
use crate::error::{Result, VigilError};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Collects `console.error` calls and uncaught errors of each document, and
/// counts fetch/XHR requests still in flight
const PAGE_HOOK_JS: &str = r#"
(() => {
    if (window.__vigilConsoleErrors) return;
    window.__vigilConsoleErrors = [];
    const original = console.error.bind(console);
    console.error = (...args) => {
        window.__vigilConsoleErrors.push(args.map((a) => String(a)).join(' '));
        original(...args);
    };
    window.addEventListener('error', (e) => {
        window.__vigilConsoleErrors.push(String(e.message));
    });

    // The default buffer stops recording after 250 resources
    performance.setResourceTimingBufferSize(100000);
    performance.addEventListener('resourcetimingbufferfull', () => performance.clearResourceTimings());

    window.__vigilInflight = 0;
    const settled = () => {
        window.__vigilInflight = Math.max(0, window.__vigilInflight - 1);
    };
    const originalFetch = window.fetch;
    if (originalFetch) {
        window.fetch = (...args) => {
            window.__vigilInflight += 1;
            return originalFetch.apply(window, args).finally(settled);
        };
    }
    const originalSend = XMLHttpRequest.prototype.send;
    XMLHttpRequest.prototype.send = function (...args) {
        window.__vigilInflight += 1;
        this.addEventListener('loadend', settled, { once: true });
        return originalSend.apply(this, args);
    };
})();
"#;

/// Resolves a locator target to candidate elements and lists or acts on them
const LOCATOR_JS: &str = r#"
((target, op, index, value) => {
    const ROLE_SELECTORS = {
        heading: 'h1,h2,h3,h4,h5,h6,[role="heading"]',
        button: 'button,[role="button"],input[type="submit"],input[type="button"]',
        textbox: 'input:not([type]),input[type="text"],input[type="email"],input[type="password"],textarea,[role="textbox"]',
    };
    const ownText = (el) => Array.from(el.childNodes)
        .filter((n) => n.nodeType === Node.TEXT_NODE)
        .map((n) => n.textContent)
        .join('')
        .trim();
    const accessibleName = (el) => (
        el.getAttribute('aria-label') || el.innerText || el.value || el.getAttribute('title') || ''
    ).trim();
    const isVisible = (el) => {
        const style = window.getComputedStyle(el);
        const rect = el.getBoundingClientRect();
        return style.visibility !== 'hidden' && style.display !== 'none'
            && rect.width > 0 && rect.height > 0;
    };

    let nodes;
    if (target === 'text') {
        nodes = Array.from(document.querySelectorAll('body *')).filter((el) => ownText(el).length > 0);
    } else if (target.role) {
        nodes = Array.from(document.querySelectorAll(ROLE_SELECTORS[target.role]));
    } else {
        nodes = Array.from(document.querySelectorAll(target.css));
    }

    if (op === 'list') {
        return nodes.map((el, i) => ({
            index: i,
            name: target === 'text' ? ownText(el) : accessibleName(el),
            visible: isVisible(el),
            disabled: !!el.disabled,
        }));
    }

    const el = nodes[index];
    if (!el) return false;
    el.scrollIntoView({ block: 'center' });
    if (op === 'click') {
        el.click();
        return true;
    }
    if (op === 'fill') {
        el.focus();
        const proto = el instanceof HTMLTextAreaElement
            ? HTMLTextAreaElement.prototype
            : HTMLInputElement.prototype;
        Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, value);
        el.dispatchEvent(new Event('input', { bubbles: true }));
        el.dispatchEvent(new Event('change', { bubbles: true }));
        return true;
    }
    return false;
})
"#;

const NETWORK_STATE_JS: &str = "[document.readyState, \
     performance.getEntriesByType('resource').length, \
     window.__vigilInflight || 0]";

fn cdp(e: CdpError) -> VigilError {
    VigilError::BrowserError(e.to_string())
}

struct Session {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

/// Lazily launched headless Chromium session
pub struct ChromiumDriver {
    headless: bool,
    session: Mutex<Option<Session>>,
}

impl ChromiumDriver {
    pub fn new(headless: bool) -> Self {
        Self {
            headless,
            session: Mutex::new(None),
        }
    }

    async fn launch(&self) -> Result<Session> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1280, 800)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage");
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| VigilError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(cdp)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(cdp)?;
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
            PAGE_HOOK_JS,
        ))
        .await
        .map_err(cdp)?;

        info!("Browser session started (headless: {})", self.headless);
        Ok(Session {
            browser,
            page,
            handler,
        })
    }

    /// Returns the shared page, launching the browser on first use
    async fn page(&self) -> Result<Page> {
        let mut session = self.session.lock().await;
        if session.is_none() {
            *session = Some(self.launch().await?);
        }
        session
            .as_ref()
            .map(|s| s.page.clone())
            .ok_or_else(|| VigilError::BrowserError("browser session unavailable".to_string()))
    }

    async fn run_locator(
        &self,
        target: &Target,
        op: &str,
        index: usize,
        value: &str,
    ) -> Result<serde_json::Value> {
        let page = self.page().await?;
        let script = format!(
            "({LOCATOR_JS})({}, {}, {index}, {})",
            serde_json::to_string(target)?,
            serde_json::to_string(op)?,
            serde_json::to_string(value)?,
        );
        let result = page.evaluate(script.as_str()).await.map_err(cdp)?;
        Ok(result.into_value::<serde_json::Value>()?)
    }

    /// Acts on the first element matching the locator's name filter
    async fn act(&self, locator: &Locator, op: &str, value: &str) -> Result<()> {
        let first = self
            .elements(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| VigilError::ElementNotFound(locator.to_string()))?;
        let done = self
            .run_locator(&locator.target, op, first.index, value)
            .await?;
        if done.as_bool() == Some(true) {
            debug!("{op} on {locator}");
            Ok(())
        } else {
            Err(VigilError::ElementNotFound(locator.to_string()))
        }
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let page = self.page().await?;
        page.goto(url)
            .await
            .map_err(|e| VigilError::NavigationError(url.to_string(), e.to_string()))?;
        Ok(())
    }

    async fn wait_for_network_idle(&self, quiet: Duration) -> Result<()> {
        let page = self.page().await?;
        let mut tracker = IdleTracker::new(quiet);
        loop {
            let (ready_state, resources, in_flight) = page
                .evaluate(NETWORK_STATE_JS)
                .await
                .map_err(cdp)?
                .into_value::<(String, usize, usize)>()?;

            let sample = NetworkSample {
                loaded: ready_state == "complete",
                resources,
                in_flight,
            };
            if tracker.observe(sample, Instant::now()) {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page().await?;
        Ok(page.url().await.map_err(cdp)?.unwrap_or_default())
    }

    async fn elements(&self, locator: &Locator) -> Result<Vec<ElementInfo>> {
        let listed = self.run_locator(&locator.target, "list", 0, "").await?;
        let all: Vec<ElementInfo> = serde_json::from_value(listed)?;
        Ok(all
            .into_iter()
            .filter(|el| locator.matches_name(&el.name))
            .collect())
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        self.act(locator, "click", "").await
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        self.act(locator, "fill", value).await
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()> {
        let page = self.page().await?;
        page.save_screenshot(ScreenshotParams::builder().full_page(full_page).build(), path)
            .await
            .map_err(cdp)?;
        info!("Screenshot saved to {}", path.display());
        Ok(())
    }

    async fn console_errors(&self) -> Result<Vec<String>> {
        let page = self.page().await?;
        let errors = page
            .evaluate("window.__vigilConsoleErrors || []")
            .await
            .map_err(cdp)?
            .into_value::<Vec<String>>()?;
        Ok(errors)
    }

    async fn close(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if let Some(mut s) = session.take() {
            if let Err(e) = s.browser.close().await {
                warn!("Browser did not close cleanly: {e}");
            }
            let _ = s.browser.wait().await;
            s.handler.abort();
        }
        Ok(())
    }
}
