use crate::scrapers::traits::PageSource;
use crate::scrapers::types::RenderTiming;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::fmt;
use std::thread;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Page source backed by headless Chrome, for result pages that only fill in
/// their postings after client-side rendering and scrolling
pub struct ChromePageSource {
    browser: Browser,
    timing: RenderTiming,
}

impl ChromePageSource {
    /// Launch a headless browser
    pub fn new(timing: RenderTiming) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((1920, 1080)))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options)
            .context("Failed to launch Chrome browser")?;

        Ok(Self { browser, timing })
    }
}

#[async_trait]
impl PageSource for ChromePageSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        let browser = self.browser.clone();
        let timing = self.timing.clone();
        let url = url.to_string();

        tokio::task::spawn_blocking(move || render_page(&browser, &url, &timing))
            .await
            .context("Browser task panicked")?
    }

    fn source_name(&self) -> &'static str {
        "chrome"
    }
}

/// Open the page in a fresh tab, let it render, scroll to load lazy postings,
/// and return the document HTML
fn render_page(browser: &Browser, url: &str, timing: &RenderTiming) -> Result<String> {
    let tab = browser.new_tab().context("Failed to open browser tab")?;
    closing(|| render_in_tab(&tab, url, timing), || tab.close(true))
}

fn render_in_tab(tab: &Tab, url: &str, timing: &RenderTiming) -> Result<String> {
    tab.set_user_agent(USER_AGENT, None, None)?;

    info!(%url, "Opening search page...");
    tab.navigate_to(url)?;
    tab.wait_until_navigated()?;

    debug!(wait_ms = timing.initial_wait.as_millis() as u64, "Waiting for page to render");
    thread::sleep(timing.initial_wait);

    let scroll = format!("window.scrollBy(0, {})", timing.scroll_px);
    for _ in 0..timing.scroll_steps {
        tab.evaluate(&scroll, false)?;
        thread::sleep(timing.step_wait);
    }

    let html_result = tab.evaluate("document.documentElement.outerHTML", false)?;
    let html = match html_result.value {
        Some(value) => value.as_str().unwrap_or("").to_string(),
        None => {
            warn!("Could not get HTML from page");
            String::new()
        }
    };

    debug!("Rendered {} bytes of HTML", html.len());
    Ok(html)
}

/// Run `work`, then `close` whatever the outcome. A failed close is only logged.
fn closing<T, R, E: fmt::Display>(
    work: impl FnOnce() -> Result<T>,
    close: impl FnOnce() -> std::result::Result<R, E>,
) -> Result<T> {
    let result = work();
    if let Err(e) = close() {
        warn!("Failed to close tab: {}", e);
    }
    result
}
