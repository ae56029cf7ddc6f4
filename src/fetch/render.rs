// src/fetch/render.rs
//! Strategy B: full browser render for pages that defeat the plain HTTP path.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::FetchError;

const SETTLE_POLL: Duration = Duration::from_millis(500);
const SETTLE_MAX: Duration = Duration::from_secs(10);

/// Produces the fully rendered DOM of a page as HTML.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String, FetchError>;
    fn name(&self) -> &'static str;
}

/// Used when rendering is turned off or the binary was built without a browser backend.
pub struct DisabledRenderer;

#[async_trait]
impl PageRenderer for DisabledRenderer {
    async fn render(&self, _url: &str) -> Result<String, FetchError> {
        Err(FetchError::RendererUnavailable)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Launches a fresh headless Chromium per render. The blocking DevTools client runs on
/// tokio's blocking pool.
#[cfg(feature = "headless")]
pub struct HeadlessChromeRenderer {
    timeout: Duration,
}

#[cfg(feature = "headless")]
impl HeadlessChromeRenderer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn render_blocking(url: &str, timeout: Duration) -> anyhow::Result<String> {
        use headless_chrome::{Browser, LaunchOptions};

        let options = LaunchOptions::default_builder()
            .headless(true)
            .idle_browser_timeout(timeout + Duration::from_secs(5))
            .build()
            .map_err(|e| anyhow::anyhow!("launch options: {e}"))?;
        let browser = Browser::new(options)?;
        let tab = browser.new_tab()?;
        tab.set_default_timeout(timeout);
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;

        let settled = wait_for_settle(
            || {
                let out = tab.evaluate("document.body ? document.body.innerText.length : 0", false)?;
                Ok(out.value.as_ref().and_then(|v| v.as_u64()).unwrap_or(0))
            },
            SETTLE_POLL,
            SETTLE_MAX.min(timeout),
        )?;
        tracing::debug!(url, text_len = settled, "render settled");

        let html = tab.get_content()?;
        Ok(html)
    }
}

#[cfg(feature = "headless")]
#[async_trait]
impl PageRenderer for HeadlessChromeRenderer {
    async fn render(&self, url: &str) -> Result<String, FetchError> {
        let url = url.to_string();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || Self::render_blocking(&url, timeout))
            .await
            .map_err(|e| FetchError::Render(format!("render task: {e}")))?
            .map_err(|e| FetchError::Render(format!("{e:#}")))
    }

    fn name(&self) -> &'static str {
        "headless-chrome"
    }
}

/// After the load event, scripts may still be filling the page. Poll `read` (visible text
/// length) until two consecutive non-zero readings agree or `budget` runs out, and return
/// the last reading.
#[cfg_attr(not(feature = "headless"), allow(dead_code))]
fn wait_for_settle(
    mut read: impl FnMut() -> anyhow::Result<u64>,
    interval: Duration,
    budget: Duration,
) -> anyhow::Result<u64> {
    let deadline = Instant::now() + budget;
    let mut last = read()?;
    while Instant::now() < deadline {
        std::thread::sleep(interval);
        let next = read()?;
        if next == last && next > 0 {
            return Ok(next);
        }
        last = next;
    }
    Ok(last)
}

/// Best renderer available in this build.
pub fn default_renderer(enabled: bool, timeout: Duration) -> Arc<dyn PageRenderer> {
    if !enabled {
        return Arc::new(DisabledRenderer);
    }
    browser_renderer(timeout)
}

#[cfg(feature = "headless")]
fn browser_renderer(timeout: Duration) -> Arc<dyn PageRenderer> {
    Arc::new(HeadlessChromeRenderer::new(timeout))
}

#[cfg(not(feature = "headless"))]
fn browser_renderer(_timeout: Duration) -> Arc<dyn PageRenderer> {
    tracing::warn!("built without `headless` feature; render fallback disabled");
    Arc::new(DisabledRenderer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn readings(values: &[u64]) -> (impl FnMut() -> anyhow::Result<u64> + '_, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let read = move || {
            let i = counter.get();
            counter.set(i + 1);
            Ok(values[i.min(values.len() - 1)])
        };
        (read, calls)
    }

    #[test]
    fn settles_once_text_stops_growing() {
        let (read, calls) = readings(&[0, 0, 120, 900, 900, 900]);
        let got = wait_for_settle(read, Duration::ZERO, Duration::from_secs(5)).unwrap();
        assert_eq!(got, 900);
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn budget_bounds_a_page_that_keeps_changing() {
        let mut n = 0;
        let read = || -> anyhow::Result<u64> {
            n += 1;
            Ok(n)
        };
        let got = wait_for_settle(read, Duration::from_millis(20), Duration::from_millis(100)).unwrap();
        assert!(got > 1 && got < 20, "stopped at {got}");
    }

    #[test]
    fn read_errors_abort_the_wait() {
        let read = || -> anyhow::Result<u64> { Err(anyhow::anyhow!("tab closed")) };
        assert!(wait_for_settle(read, Duration::ZERO, Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn disabled_renderer_reports_unavailable() {
        let r = default_renderer(false, Duration::from_secs(1));
        assert_eq!(r.name(), "disabled");
        assert!(matches!(
            r.render("https://example.edu").await,
            Err(FetchError::RendererUnavailable)
        ));
    }
}
