//! Rendering collaborators for script-gated pages
//!
//! A [`Renderer`] loads a page in a scripted browsing context and hands back
//! the resulting markup. The default build has no browser and uses
//! [`UnavailableRenderer`]; the `browser` feature adds a headless Chrome
//! implementation.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

type Cleanup<T> = fn(T) -> Pin<Box<dyn Future<Output = ()> + Send>>;

/// Markup of a page after scripts have run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Serialized DOM
    pub html: String,

    /// URL the browser ended up on
    pub final_url: String,
}

/// Errors raised by a renderer
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no renderer available, build with the `browser` feature to resolve gated pages")]
    Unavailable,

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("rendering timed out after {0:?}")]
    Timeout(Duration),
}

/// Loads pages in a scripted browsing context
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError>;
}

/// Renderer used when no browser is compiled in
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRenderer;

#[async_trait]
impl Renderer for UnavailableRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        tracing::debug!("Cannot render {} without a browser", url);
        Err(RenderError::Unavailable)
    }
}

/// Owns a browser resource and releases it on a runtime task if dropped
///
/// A render future cancelled by a timeout drops its locals mid-await, so a
/// tab held by this guard is still closed. [`TabGuard::release`] disarms the
/// guard and hands the resource back for an orderly close.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) struct TabGuard<T: Send + 'static> {
    resource: Option<T>,
    cleanup: Cleanup<T>,
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
impl<T: Send + 'static> TabGuard<T> {
    pub(crate) fn new(resource: T, cleanup: Cleanup<T>) -> Self {
        Self {
            resource: Some(resource),
            cleanup,
        }
    }

    pub(crate) fn get(&self) -> Option<&T> {
        self.resource.as_ref()
    }

    pub(crate) fn release(mut self) -> Option<T> {
        self.resource.take()
    }
}

impl<T: Send + 'static> Drop for TabGuard<T> {
    fn drop(&mut self) {
        let Some(resource) = self.resource.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn((self.cleanup)(resource));
            }
            Err(_) => tracing::debug!("No runtime left to release a browser tab"),
        }
    }
}

#[cfg(feature = "browser")]
pub use chrome::ChromeRenderer;

#[cfg(feature = "browser")]
mod chrome {
    use super::{RenderError, RenderedPage, Renderer, TabGuard};
    use crate::legal::resolver::shows_status;
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use chromiumoxide::Page;
    use futures::StreamExt;
    use std::time::{Duration, Instant};
    use tokio::sync::OnceCell;
    use tokio::task::JoinHandle;

    const POLL_INTERVAL: Duration = Duration::from_millis(250);

    /// Headless Chrome renderer
    ///
    /// The browser process is started on the first render and shared by all
    /// later ones. Each render opens its own tab.
    pub struct ChromeRenderer {
        browser: OnceCell<(Browser, JoinHandle<()>)>,
        settle_timeout: Duration,
    }

    impl ChromeRenderer {
        /// Creates a renderer that waits up to `settle_timeout` for the status banner
        pub fn new(settle_timeout: Duration) -> Self {
            Self {
                browser: OnceCell::new(),
                settle_timeout,
            }
        }

        async fn browser(&self) -> Result<&Browser, RenderError> {
            let (browser, _) = self
                .browser
                .get_or_try_init(|| async {
                    let config = BrowserConfig::builder()
                        .request_timeout(self.settle_timeout)
                        .arg("--no-sandbox")
                        .arg("--disable-gpu")
                        .build()
                        .map_err(RenderError::Launch)?;

                    tracing::info!("Launching headless browser for gated pages");
                    let (browser, mut handler) = Browser::launch(config)
                        .await
                        .map_err(|e| RenderError::Launch(e.to_string()))?;

                    let handler_task = tokio::spawn(async move {
                        while let Some(event) = handler.next().await {
                            if let Err(e) = event {
                                tracing::trace!("Browser handler event error: {}", e);
                            }
                        }
                    });

                    Ok::<_, RenderError>((browser, handler_task))
                })
                .await?;

            Ok(browser)
        }

        /// Waits for the load and the status banner, then reads the page
        async fn settle(&self, page: &Page, url: &str) -> Result<RenderedPage, RenderError> {
            page.wait_for_navigation()
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;

            let deadline = Instant::now() + self.settle_timeout;
            let html = loop {
                let html = page
                    .content()
                    .await
                    .map_err(|e| RenderError::Navigation(e.to_string()))?;

                // The banner is filled in by scripts after the load event
                if shows_status(&html) || Instant::now() >= deadline {
                    break html;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            };

            let final_url = page
                .url()
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| url.to_string());

            Ok(RenderedPage { html, final_url })
        }
    }

    fn close_tab(page: Page) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async move {
            if let Err(e) = page.close().await {
                tracing::debug!("Failed to close browser tab: {}", e);
            }
        })
    }

    #[async_trait]
    impl Renderer for ChromeRenderer {
        async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
            let browser = self.browser().await?;

            let page = browser
                .new_page(url)
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            let tab = TabGuard::new(page, close_tab);

            let result = match tab.get() {
                Some(page) => self.settle(page, url).await,
                None => Err(RenderError::Navigation(format!("tab for {} is gone", url))),
            };

            if let Some(page) = tab.release() {
                close_tab(page).await;
            }
            result
        }
    }

    impl Drop for ChromeRenderer {
        fn drop(&mut self) {
            if let Some((_, handler_task)) = self.browser.get() {
                handler_task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn report_release(
        sender: mpsc::UnboundedSender<&'static str>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            let _ = sender.send("released");
        })
    }

    #[tokio::test]
    async fn test_tab_guard_releases_when_render_times_out() {
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let render = async move {
            let _tab = TabGuard::new(sender, report_release);
            std::future::pending::<()>().await;
        };
        let timed_out = tokio::time::timeout(Duration::from_millis(10), render).await;
        assert!(timed_out.is_err());

        assert_eq!(receiver.recv().await, Some("released"));
    }

    #[tokio::test]
    async fn test_tab_guard_release_disarms_cleanup() {
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let tab = TabGuard::new(sender, report_release);
        assert!(tab.get().is_some());
        let sender = tab.release().unwrap();
        tokio::task::yield_now().await;

        assert!(receiver.try_recv().is_err());
        drop(sender);
        assert_eq!(receiver.recv().await, None);
    }

    #[tokio::test]
    async fn test_unavailable_renderer_always_fails() {
        let result = UnavailableRenderer.render("https://www.fedlex.admin.ch/eli/cc/1/de").await;
        assert!(matches!(result, Err(RenderError::Unavailable)));
    }
}
