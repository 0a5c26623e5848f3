use tracing::{debug, instrument};

use crate::element::Element;
use crate::errors::AutomationError;
use crate::selector::Selector;
use crate::wait::{Condition, WaitEngine};
use std::time::Duration;

/// A high-level API for finding elements on the current page.
///
/// Wraps a selector, a condition and a timeout around the [`WaitEngine`].
#[derive(Clone)]
pub struct Locator {
    waits: WaitEngine,
    selector: Selector,
    condition: Condition,
    timeout: Duration,
}

impl Locator {
    pub fn new(waits: WaitEngine, selector: impl Into<Selector>) -> Self {
        let timeout = waits.config().short_timeout;
        Self {
            waits,
            selector: selector.into(),
            condition: Condition::Present,
            timeout,
        }
    }

    /// Set the timeout used by [`Locator::first`] and [`Locator::wait`]
    pub fn set_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Require the element to be rendered
    pub fn visible(mut self) -> Self {
        self.condition = Condition::Visible;
        self
    }

    /// Require the element to be rendered and enabled
    pub fn clickable(mut self) -> Self {
        self.condition = Condition::Clickable;
        self
    }

    /// First matching element, or `None` when absent or the wait times out
    pub fn first(&self) -> Option<Element> {
        self.waits
            .wait_for_element(&self.selector, self.condition, self.timeout)
    }

    /// Like [`Locator::first`], but absence is an error.
    #[instrument(level = "debug", skip(self))]
    pub fn wait(&self) -> Result<Element, AutomationError> {
        debug!("Waiting for element matching selector: {}", self.selector);
        if let Selector::Invalid(reason) = &self.selector {
            return Err(AutomationError::InvalidSelector(reason.clone()));
        }
        self.first().ok_or_else(|| {
            AutomationError::Timeout(format!(
                "Timed out after {:?} waiting for {} to be {:?}",
                self.timeout, self.selector, self.condition
            ))
        })
    }

    /// All current matches, without waiting
    pub fn all(&self) -> Vec<Element> {
        self.waits.find_all(&self.selector)
    }

    /// Wait for the element to be clickable and click it
    pub fn click(&self) -> Result<(), AutomationError> {
        let mut clickable = self.clone();
        clickable.condition = Condition::Clickable;
        clickable.wait()?.click()
    }
}
