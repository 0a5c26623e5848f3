use crate::{AutomationError, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod webdriver;

pub use webdriver::WebDriverClient;

/// Opaque handle to a rendered DOM node, owned by the browser driver.
///
/// A handle is only meaningful for the operation that produced it; once the
/// page re-renders the driver reports it as stale.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementRef({})", self.0)
    }
}

/// Configuration for connecting to a WebDriver remote end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Base URL of the WebDriver server (chromedriver, geckodriver, ...)
    pub webdriver_url: String,
    /// Browser name sent in the session capabilities
    pub browser: String,
    /// Run without a visible window
    pub headless: bool,
    /// Extra command-line arguments passed to the browser
    pub args: Vec<String>,
    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            browser: "chrome".to_string(),
            headless: false,
            args: Vec::new(),
            request_timeout_secs: 60,
        }
    }
}

/// The common trait every browser backend must implement.
///
/// All calls are blocking. Implementations map "the node went away under us"
/// to [`AutomationError::StaleElement`] and "nothing matches" to
/// [`AutomationError::ElementNotFound`] so the wait and fill engines can tell
/// transient failures from real ones.
pub trait BrowserDriver: Send + Sync {
    /// Load a URL in the current browsing context
    fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// Find all elements matching a selector. An empty result is not an error.
    fn find_elements(&self, selector: &Selector) -> Result<Vec<ElementRef>, AutomationError>;

    fn is_displayed(&self, element: &ElementRef) -> Result<bool, AutomationError>;

    fn is_enabled(&self, element: &ElementRef) -> Result<bool, AutomationError>;

    /// Current `value` property of a form control
    fn value(&self, element: &ElementRef) -> Result<String, AutomationError>;

    /// Visible text of the selected option of a `<select>`
    fn selected_text(&self, element: &ElementRef) -> Result<String, AutomationError>;

    /// Rendered text content of an element
    fn text(&self, element: &ElementRef) -> Result<String, AutomationError>;

    fn clear(&self, element: &ElementRef) -> Result<(), AutomationError>;

    fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), AutomationError>;

    fn click(&self, element: &ElementRef) -> Result<(), AutomationError>;

    /// Select the option whose visible text equals `text` exactly
    fn select_by_visible_text(&self, element: &ElementRef, text: &str)
        -> Result<(), AutomationError>;

    /// Run a synchronous script in the current browsing context
    fn execute_script(
        &self,
        script: &str,
        args: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, AutomationError>;

    /// Serialized DOM of the current browsing context
    fn page_source(&self) -> Result<String, AutomationError>;

    /// Switch into the iframe with the given name, or back to the top-level
    /// document when `None`
    fn switch_to_frame(&self, name: Option<&str>) -> Result<(), AutomationError>;

    /// Dismiss a native `alert()`/`confirm()` dialog if one is open.
    /// Returns the dialog text when there was one.
    fn dismiss_alert(&self) -> Result<Option<String>, AutomationError>;

    /// End the browser session
    fn quit(&self) -> Result<(), AutomationError>;
}

/// Create the WebDriver-backed driver for a configuration
pub fn create_driver(config: &DriverConfig) -> Result<Arc<dyn BrowserDriver>, AutomationError> {
    Ok(Arc::new(WebDriverClient::connect(config)?))
}

/// Scope guard owning the browser for one run.
///
/// The browser is closed when the session is dropped, on every exit path.
pub struct BrowserSession {
    driver: Arc<dyn BrowserDriver>,
    closed: bool,
}

impl BrowserSession {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            driver,
            closed: false,
        }
    }

    pub fn open(config: &DriverConfig) -> Result<Self, AutomationError> {
        Ok(Self::new(create_driver(config)?))
    }

    pub fn driver(&self) -> Arc<dyn BrowserDriver> {
        self.driver.clone()
    }

    /// Close the browser now instead of waiting for drop
    pub fn close(mut self) -> Result<(), AutomationError> {
        self.closed = true;
        self.driver.quit()
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        debug!("Closing browser session");
        if let Err(e) = self.driver.quit() {
            warn!(error = %e, "Failed to close browser session cleanly");
        }
    }
}
