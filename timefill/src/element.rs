use crate::driver::{BrowserDriver, ElementRef};
use crate::{AutomationError, Selector};
use std::fmt;
use std::sync::Arc;

/// A located DOM element bound to the driver that found it.
///
/// Elements are short-lived: they are looked up for one operation and
/// dropped. Any call may fail with [`AutomationError::StaleElement`] if the
/// page re-rendered since the lookup.
#[derive(Clone)]
pub struct Element {
    driver: Arc<dyn BrowserDriver>,
    reference: ElementRef,
    selector: Selector,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("selector", &self.selector)
            .field("reference", &self.reference)
            .finish()
    }
}

impl Element {
    pub fn new(driver: Arc<dyn BrowserDriver>, reference: ElementRef, selector: Selector) -> Self {
        Self {
            driver,
            reference,
            selector,
        }
    }

    pub fn reference(&self) -> &ElementRef {
        &self.reference
    }

    /// The selector this element was found with
    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn value(&self) -> Result<String, AutomationError> {
        self.driver.value(&self.reference)
    }

    pub fn selected_text(&self) -> Result<String, AutomationError> {
        self.driver.selected_text(&self.reference)
    }

    pub fn text(&self) -> Result<String, AutomationError> {
        self.driver.text(&self.reference)
    }

    pub fn is_displayed(&self) -> Result<bool, AutomationError> {
        self.driver.is_displayed(&self.reference)
    }

    pub fn is_enabled(&self) -> Result<bool, AutomationError> {
        self.driver.is_enabled(&self.reference)
    }

    pub fn click(&self) -> Result<(), AutomationError> {
        self.driver.click(&self.reference)
    }

    /// Clear the control and type `text` into it
    pub fn set_text(&self, text: &str) -> Result<(), AutomationError> {
        self.driver.clear(&self.reference)?;
        self.driver.send_keys(&self.reference, text)
    }

    pub fn send_keys(&self, text: &str) -> Result<(), AutomationError> {
        self.driver.send_keys(&self.reference, text)
    }

    pub fn select_option(&self, visible_text: &str) -> Result<(), AutomationError> {
        self.driver.select_by_visible_text(&self.reference, visible_text)
    }
}
