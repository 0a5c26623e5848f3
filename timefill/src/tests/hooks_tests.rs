use super::FakeBrowser;
use crate::driver::BrowserDriver;
use crate::hooks::{HookPoint, HookRegistry};
use std::sync::{Arc, Mutex};

fn recorder(
    log: &Arc<Mutex<Vec<String>>>,
    label: &'static str,
) -> impl FnMut(&dyn BrowserDriver) + Send {
    let log = log.clone();
    move |_driver: &dyn BrowserDriver| log.lock().unwrap().push(label.to_string())
}

#[test]
fn hooks_run_in_registration_order() {
    let browser = FakeBrowser::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut hooks = HookRegistry::new();
    hooks.register(HookPoint::AfterLogin, "first", recorder(&log, "first"));
    hooks.register(HookPoint::BeforeSave, "save", recorder(&log, "save"));
    hooks.register(HookPoint::AfterLogin, "second", recorder(&log, "second"));

    hooks.emit(HookPoint::AfterLogin, browser.as_ref());
    assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);

    hooks.emit(HookPoint::BeforeSave, browser.as_ref());
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "save"]);
}

#[test]
fn unregistered_hooks_do_not_run() {
    let browser = FakeBrowser::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut hooks = HookRegistry::new();
    let first = hooks.register(HookPoint::AfterLogin, "first", recorder(&log, "first"));
    hooks.register(HookPoint::AfterLogin, "second", recorder(&log, "second"));

    assert!(hooks.unregister(first));
    assert!(!hooks.unregister(first));
    assert_eq!(hooks.len(HookPoint::AfterLogin), 1);

    hooks.emit(HookPoint::AfterLogin, browser.as_ref());
    assert_eq!(*log.lock().unwrap(), vec!["second"]);
}

#[test]
fn hooks_can_drive_the_browser() {
    let browser = FakeBrowser::new();
    let mut hooks = HookRegistry::new();
    hooks.register(HookPoint::BeforeSave, "blank page", |driver: &dyn BrowserDriver| {
        driver.navigate("about:blank").unwrap();
    });

    hooks.emit(HookPoint::BeforeSave, browser.as_ref());
    assert_eq!(browser.state().navigations, vec!["about:blank".to_string()]);
}
