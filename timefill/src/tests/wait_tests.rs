use super::{fast_wait_config, fast_waits, init_tracing, FakeBrowser};
use crate::driver::BrowserDriver;
use crate::locator::Locator;
use crate::wait::{Condition, WaitConfig, WaitEngine};
use crate::{AutomationError, Selector};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn document_ready_follows_ready_state() {
    let browser = FakeBrowser::new();
    let waits = fast_waits(&browser);
    assert!(waits.wait_until_document_ready(Duration::from_millis(20)));

    browser.state().ready_state = "loading".to_string();
    assert!(!waits.wait_until_document_ready(Duration::from_millis(20)));
}

#[test]
fn content_is_stable_after_three_identical_snapshots() {
    init_tracing();
    let browser = FakeBrowser::new();
    browser.state().page_sources =
        ["<a>", "<b>", "<c>", "<c>", "<c>"].iter().map(|s| s.to_string()).collect();
    let waits = WaitEngine::new(
        browser.clone(),
        WaitConfig {
            stability_timeout: Duration::from_secs(2),
            ..fast_wait_config()
        },
    );

    assert!(waits.wait_until_content_stable(Duration::from_secs(2)));
    assert!(browser.state().page_sources.len() <= 1);
}

#[test]
fn changing_content_never_stabilizes() {
    let browser = FakeBrowser::new();
    browser.state().page_sources = (0..10_000).map(|i| format!("<p>{i}</p>")).collect();
    let waits = fast_waits(&browser);

    assert!(!waits.wait_until_content_stable(Duration::from_millis(20)));
}

#[test]
fn absent_element_returns_without_waiting_out_the_timeout() {
    let browser = FakeBrowser::new();
    let waits = fast_waits(&browser);

    let started = Instant::now();
    let found = waits.wait_for_element(
        &Selector::id("nowhere"),
        Condition::Visible,
        Duration::from_secs(5),
    );
    assert!(found.is_none());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn element_removed_after_lookup_ends_the_wait() {
    init_tracing();
    let browser = FakeBrowser::new().with_element("ptModContent_0");
    browser.state().vanishing.insert("ptModContent_0".to_string());
    let waits = fast_waits(&browser);

    let started = Instant::now();
    let found = waits.wait_for_element(
        &Selector::id("ptModContent_0"),
        Condition::Visible,
        Duration::from_secs(5),
    );
    assert!(found.is_none());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn hidden_element_is_not_visible() {
    let browser = FakeBrowser::new().with_element("ptModContent_0");
    browser.state().hidden.insert("ptModContent_0".to_string());
    let waits = fast_waits(&browser);
    let selector = Selector::id("ptModContent_0");

    let timeout = Duration::from_millis(10);

    assert!(waits.wait_for_element(&selector, Condition::Present, timeout).is_some());
    assert!(waits.wait_for_element(&selector, Condition::Visible, timeout).is_none());
}

#[test]
fn locator_wait_reports_a_timeout() {
    let browser = FakeBrowser::new();
    let locator = Locator::new(fast_waits(&browser), "#PTS_CFG_CL_WRK_PTS_ADD_BTN").clickable();

    assert!(matches!(locator.wait(), Err(AutomationError::Timeout(_))));
    assert!(matches!(locator.click(), Err(AutomationError::Timeout(_))));
}

#[test]
fn locator_clicks_a_present_element() {
    let browser = FakeBrowser::new().with_element("EX_ICLIENT_WRK_SAVE_PB");
    let locator = Locator::new(fast_waits(&browser), Selector::id("EX_ICLIENT_WRK_SAVE_PB"));

    locator.click().unwrap();
    assert_eq!(browser.clicks(), vec!["EX_ICLIENT_WRK_SAVE_PB".to_string()]);
    assert_eq!(locator.all().len(), 1);
}

#[test]
fn invalid_selector_is_rejected_before_waiting() {
    let browser = FakeBrowser::new();
    let locator = Locator::new(fast_waits(&browser), "");
    assert!(matches!(locator.wait(), Err(AutomationError::InvalidSelector(_))));
}

#[test]
fn page_source_is_read_through_the_driver_trait() {
    let browser = FakeBrowser::new();
    let driver: Arc<dyn BrowserDriver> = browser.clone();
    assert_eq!(driver.page_source().unwrap(), "<html></html>");
}
