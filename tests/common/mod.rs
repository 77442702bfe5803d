//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use vigil::browser::{BrowserDriver, ElementInfo, Locator, Target, UnavailableDriver};
use vigil::capture::Capturer;
use vigil::error::{Result, VigilError};
use vigil::http::HttpClient;
use vigil::models::HarnessConfig;
use vigil::runner::SuiteRunner;

/// Creates a test HarnessConfig pointing to a wiremock server
pub fn test_config(api: &str, dashboard: &str) -> HarnessConfig {
    HarnessConfig {
        api_url: api.to_string(),
        dashboard_url: dashboard.to_string(),
        http_timeout_secs: 2,
        page_timeout_secs: 2,
        element_timeout_ms: 200,
        network_idle_ms: 10,
        settle_ms: 0,
        user_agent: "Vigil-Test/0.1.0".to_string(),
        allowed_origin: Some("http://allowed.example".to_string()),
        disallowed_origin: "http://evil.example".to_string(),
        screenshot_dir: std::env::temp_dir(),
        ..HarnessConfig::default()
    }
}

/// A base URL nothing listens on
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

pub fn capturer(config: &HarnessConfig, driver: Arc<dyn BrowserDriver>) -> Capturer {
    let transport = HttpClient::from_config(config).expect("Failed to create client");
    Capturer::new(config, Arc::new(transport), driver)
}

/// Runner with the real HTTP client and no browser
pub fn http_runner(config: &HarnessConfig) -> SuiteRunner {
    SuiteRunner::new(capturer(config, Arc::new(UnavailableDriver)))
}

pub fn browser_runner(config: &HarnessConfig, driver: Arc<FakeBrowser>) -> SuiteRunner {
    SuiteRunner::new(capturer(config, driver))
}

fn target_key(target: &Target) -> String {
    match target {
        Target::Css(css) => format!("css={css}"),
        Target::Role(role) => format!("role={role}"),
        Target::Text => "text".to_string(),
    }
}

#[derive(Default)]
struct FakeState {
    url: String,
    redirects: HashMap<String, String>,
    elements: HashMap<String, Vec<ElementInfo>>,
    console_errors: Vec<String>,
    clicks: Vec<String>,
    fills: Vec<(String, String)>,
    screenshots: Vec<PathBuf>,
    navigations: Vec<String>,
    fail_navigation: bool,
}

/// Scripted browser: a fixed DOM, path redirects and recorded interactions
#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<FakeState>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigating to `from` lands on `to` (both paths)
    pub fn redirect(self, from: &str, to: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .redirects
            .insert(from.to_string(), to.to_string());
        self
    }

    /// Adds a visible element under a target such as `css=form` or `role=heading`
    pub fn element(self, target: &str, name: &str) -> Self {
        self.push_element(target, name, true, false);
        self
    }

    pub fn hidden_element(self, target: &str, name: &str) -> Self {
        self.push_element(target, name, false, false);
        self
    }

    pub fn disabled_element(self, target: &str, name: &str) -> Self {
        self.push_element(target, name, true, true);
        self
    }

    pub fn console_error(self, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .console_errors
            .push(message.to_string());
        self
    }

    pub fn failing_navigation(self) -> Self {
        self.state.lock().unwrap().fail_navigation = true;
        self
    }

    fn push_element(&self, target: &str, name: &str, visible: bool, disabled: bool) {
        let mut state = self.state.lock().unwrap();
        let list = state.elements.entry(target.to_string()).or_default();
        list.push(ElementInfo {
            index: list.len(),
            name: name.to_string(),
            visible,
            disabled,
        });
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().fills.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().screenshots.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_navigation {
            return Err(VigilError::NavigationError(
                url.to_string(),
                "net::ERR_CONNECTION_REFUSED".to_string(),
            ));
        }
        state.navigations.push(url.to_string());
        let mut parsed = Url::parse(url)?;
        if let Some(to) = state.redirects.get(parsed.path()).cloned() {
            parsed.set_path(&to);
        }
        state.url = parsed.to_string();
        Ok(())
    }

    async fn wait_for_network_idle(&self, _quiet: Duration) -> Result<()> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn elements(&self, locator: &Locator) -> Result<Vec<ElementInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .elements
            .get(&target_key(&locator.target))
            .map(|all| {
                all.iter()
                    .filter(|el| locator.matches_name(&el.name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        self.state.lock().unwrap().clicks.push(locator.to_string());
        Ok(())
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .fills
            .push((locator.to_string(), value.to_string()));
        Ok(())
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .screenshots
            .push(path.to_path_buf());
        Ok(())
    }

    async fn console_errors(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().console_errors.clone())
    }
}
