//! Page readiness and stability polling.
//!
//! Every wait is a bounded polling loop on the calling thread. Nothing here
//! raises on timeout: readiness and stability are soft signals, and a missing
//! element is reported as `None` so callers can skip, log or escalate.

use crate::driver::BrowserDriver;
use crate::element::Element;
use crate::{AutomationError, Selector};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// What must hold for a located element before it is handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Attached to the DOM
    Present,
    /// Attached and rendered
    Visible,
    /// Rendered and enabled
    Clickable,
}

/// Intervals and timeouts for the wait engine
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Tick between readiness/condition polls
    pub poll_interval: Duration,
    /// Interval between two content snapshots
    pub stability_interval: Duration,
    /// Consecutive identical snapshots required to call the page stable
    pub stable_snapshots: usize,
    pub stability_timeout: Duration,
    /// Timeout for element waits on an already loaded page
    pub short_timeout: Duration,
    /// Timeout for waits that follow a navigation
    pub page_load_timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            stability_interval: Duration::from_secs(1),
            stable_snapshots: 3,
            stability_timeout: Duration::from_secs(10),
            short_timeout: Duration::from_secs(10),
            page_load_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Clone)]
pub struct WaitEngine {
    driver: Arc<dyn BrowserDriver>,
    config: WaitConfig,
}

impl WaitEngine {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: WaitConfig) -> Self {
        Self { driver, config }
    }

    pub fn driver(&self) -> &Arc<dyn BrowserDriver> {
        &self.driver
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Poll `document.readyState` until it reports `complete`.
    ///
    /// Returns `false` when the timeout elapses; callers proceed cautiously.
    #[instrument(level = "debug", skip(self))]
    pub fn wait_until_document_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self
                .driver
                .execute_script("return document.readyState;", Vec::new())
            {
                Ok(state) if state.as_str() == Some("complete") => return true,
                Ok(state) => debug!(%state, "Document not ready yet"),
                Err(e) => debug!(error = %e, "Readiness probe failed"),
            }
            if Instant::now() >= deadline {
                debug!(?timeout, "Document never reported ready");
                return false;
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    /// Snapshot the rendered content until it stops changing.
    ///
    /// Stability means `stable_snapshots` consecutive identical snapshots
    /// taken `stability_interval` apart.
    #[instrument(level = "debug", skip(self))]
    pub fn wait_until_content_stable(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut last: Option<blake3::Hash> = None;
        let mut identical = 0usize;

        loop {
            match self.driver.page_source() {
                Ok(source) => {
                    let hash = blake3::hash(source.as_bytes());
                    if last == Some(hash) {
                        identical += 1;
                    } else {
                        last = Some(hash);
                        identical = 1;
                    }
                    if identical >= self.config.stable_snapshots {
                        debug!(snapshots = identical, "Page content is stable");
                        return true;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Content snapshot failed");
                    last = None;
                    identical = 0;
                }
            }
            if Instant::now() + self.config.stability_interval > deadline {
                break;
            }
            thread::sleep(self.config.stability_interval);
        }

        warn!(?timeout, "Page content did not stabilize; continuing anyway");
        false
    }

    /// Readiness followed by stability, with the page-load timeout
    pub fn wait_for_page(&self) -> bool {
        let ready = self.wait_until_document_ready(self.config.page_load_timeout);
        let stable = self.wait_until_content_stable(self.config.stability_timeout);
        ready && stable
    }

    /// Locate an element and wait for `condition` on it.
    ///
    /// A cheap existence probe runs first; the bounded wait only starts if
    /// something matched, so absent elements cost one round trip instead of
    /// the whole timeout. Returns `None` on timeout or when nothing matched.
    #[instrument(level = "debug", skip(self), fields(selector = %selector))]
    pub fn wait_for_element(
        &self,
        selector: &Selector,
        condition: Condition,
        timeout: Duration,
    ) -> Option<Element> {
        let mut candidate = match self.driver.find_elements(selector) {
            Ok(matches) => matches.into_iter().next()?,
            Err(e) => {
                debug!(error = %e, "Existence probe failed");
                return None;
            }
        };

        let deadline = Instant::now() + timeout;
        loop {
            match self.satisfies(&candidate, condition) {
                Ok(true) => {
                    return Some(Element::new(
                        self.driver.clone(),
                        candidate,
                        selector.clone(),
                    ))
                }
                Ok(false) => {}
                Err(e) if e.is_stale() => match self.driver.find_elements(selector) {
                    Ok(matches) => match matches.into_iter().next() {
                        Some(fresh) => candidate = fresh,
                        None => {
                            debug!("Element went stale and is no longer in the page");
                            return None;
                        }
                    },
                    Err(e) => debug!(error = %e, "Re-probe after stale reference failed"),
                },
                Err(e) => {
                    warn!(error = %e, "Condition check failed");
                    return None;
                }
            }
            if Instant::now() >= deadline {
                debug!(?condition, ?timeout, "Element never satisfied condition");
                return None;
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    /// `wait_for_element` with the short timeout
    pub fn element(&self, selector: &Selector, condition: Condition) -> Option<Element> {
        self.wait_for_element(selector, condition, self.config.short_timeout)
    }

    /// Existence probe only, no waiting
    pub fn find(&self, selector: &Selector) -> Option<Element> {
        self.find_all(selector).into_iter().next()
    }

    pub fn find_all(&self, selector: &Selector) -> Vec<Element> {
        match self.driver.find_elements(selector) {
            Ok(found) => found
                .into_iter()
                .map(|r| Element::new(self.driver.clone(), r, selector.clone()))
                .collect(),
            Err(e) => {
                debug!(error = %e, %selector, "Lookup failed");
                Vec::new()
            }
        }
    }

    fn satisfies(
        &self,
        element: &crate::driver::ElementRef,
        condition: Condition,
    ) -> Result<bool, AutomationError> {
        match condition {
            Condition::Present => Ok(true),
            Condition::Visible => self.driver.is_displayed(element),
            Condition::Clickable => {
                Ok(self.driver.is_displayed(element)? && self.driver.is_enabled(element)?)
            }
        }
    }
}
