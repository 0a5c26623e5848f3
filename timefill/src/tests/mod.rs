mod fill_tests;
mod hooks_tests;
mod wait_tests;

use crate::driver::{BrowserDriver, ElementRef};
use crate::fill::FillConfig;
use crate::wait::{WaitConfig, WaitEngine};
use crate::{AutomationError, Selector};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_test_writer()
        .try_init();
}

/// Waits that give up almost immediately
pub fn fast_wait_config() -> WaitConfig {
    WaitConfig {
        poll_interval: Duration::from_millis(1),
        stability_interval: Duration::from_millis(1),
        stable_snapshots: 3,
        stability_timeout: Duration::from_millis(30),
        short_timeout: Duration::from_millis(20),
        page_load_timeout: Duration::from_millis(20),
    }
}

pub fn fast_fill_config() -> FillConfig {
    FillConfig {
        write_settle: Duration::ZERO,
        ..FillConfig::default()
    }
}

type ClickEffect = Box<dyn FnMut(&mut FakeState) + Send>;

/// Page state behind [`FakeBrowser`]
#[derive(Default)]
pub struct FakeState {
    /// Element id to current value (input value or selected option text)
    pub fields: HashMap<String, String>,
    /// Element id to rendered text, for non-form elements
    pub texts: HashMap<String, String>,
    pub hidden: HashSet<String>,
    /// Writes are accepted by the driver but never stick
    pub rejecting: HashSet<String>,
    /// Elements removed from the page right after their first lookup
    pub vanishing: HashSet<String>,
    /// Remaining reads that fail as stale, per element id
    pub stale_reads: HashMap<String, u32>,
    /// Every `send_keys`/`select` call as `(id, text)`
    pub writes: Vec<(String, String)>,
    pub clicks: Vec<String>,
    pub navigations: Vec<String>,
    pub frames: Vec<Option<String>>,
    pub alerts: VecDeque<String>,
    /// Successive page sources; the last one repeats
    pub page_sources: VecDeque<String>,
    pub ready_state: String,
    pub quit: bool,
    on_click: HashMap<String, ClickEffect>,
}

impl FakeState {
    pub fn add_element(&mut self, id: &str) {
        self.texts.entry(id.to_string()).or_default();
    }

    pub fn set_field(&mut self, id: &str, value: &str) {
        self.fields.insert(id.to_string(), value.to_string());
    }

    fn exists(&self, id: &str) -> bool {
        self.fields.contains_key(id) || self.texts.contains_key(id)
    }
}

/// In-memory scripted browser: elements are addressed by id (or name).
pub struct FakeBrowser {
    state: Mutex<FakeState>,
}

impl FakeBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                ready_state: "complete".to_string(),
                ..FakeState::default()
            }),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_field(self: Arc<Self>, id: &str, value: &str) -> Arc<Self> {
        self.state().set_field(id, value);
        self
    }

    pub fn with_element(self: Arc<Self>, id: &str) -> Arc<Self> {
        self.state().add_element(id);
        self
    }

    pub fn on_click<F>(&self, id: &str, effect: F)
    where
        F: FnMut(&mut FakeState) + Send + 'static,
    {
        let mut state = self.state();
        state.add_element(id);
        state.on_click.insert(id.to_string(), Box::new(effect));
    }

    pub fn value_of(&self, id: &str) -> Option<String> {
        self.state().fields.get(id).cloned()
    }

    pub fn writes_to(&self, id: &str) -> usize {
        self.state().writes.iter().filter(|(w, _)| w == id).count()
    }

    pub fn total_writes(&self) -> usize {
        self.state().writes.len()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state().clicks.clone()
    }

    fn key(selector: &Selector) -> Option<&str> {
        match selector {
            Selector::Id(id) | Selector::Name(id) => Some(id.as_str()),
            _ => None,
        }
    }

    fn existing(&self, element: &ElementRef) -> Result<MutexGuard<'_, FakeState>, AutomationError> {
        let state = self.state();
        if state.exists(element.as_str()) {
            Ok(state)
        } else {
            Err(AutomationError::StaleElement(element.as_str().to_string()))
        }
    }

    fn read(&self, element: &ElementRef) -> Result<String, AutomationError> {
        let mut state = self.existing(element)?;
        let id = element.as_str();
        if let Some(remaining) = state.stale_reads.get_mut(id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AutomationError::StaleElement(id.to_string()));
            }
        }
        Ok(state.fields.get(id).cloned().unwrap_or_default())
    }

    fn write(&self, element: &ElementRef, text: &str, append: bool) -> Result<(), AutomationError> {
        let mut state = self.existing(element)?;
        let id = element.as_str().to_string();
        state.writes.push((id.clone(), text.to_string()));
        if state.rejecting.contains(&id) {
            return Ok(());
        }
        let field = state.fields.entry(id).or_default();
        if append {
            field.push_str(text);
        } else {
            *field = text.to_string();
        }
        Ok(())
    }
}

impl BrowserDriver for FakeBrowser {
    fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.state().navigations.push(url.to_string());
        Ok(())
    }

    fn find_elements(&self, selector: &Selector) -> Result<Vec<ElementRef>, AutomationError> {
        let mut state = self.state();
        let Some(id) = Self::key(selector).filter(|id| state.exists(id)) else {
            return Ok(Vec::new());
        };
        if state.vanishing.remove(id) {
            state.fields.remove(id);
            state.texts.remove(id);
        }
        Ok(vec![ElementRef::new(id)])
    }

    fn is_displayed(&self, element: &ElementRef) -> Result<bool, AutomationError> {
        Ok(!self.existing(element)?.hidden.contains(element.as_str()))
    }

    fn is_enabled(&self, element: &ElementRef) -> Result<bool, AutomationError> {
        self.existing(element).map(|_| true)
    }

    fn value(&self, element: &ElementRef) -> Result<String, AutomationError> {
        self.read(element)
    }

    fn selected_text(&self, element: &ElementRef) -> Result<String, AutomationError> {
        self.read(element)
    }

    fn text(&self, element: &ElementRef) -> Result<String, AutomationError> {
        let state = self.existing(element)?;
        let id = element.as_str();
        Ok(state
            .texts
            .get(id)
            .filter(|t| !t.is_empty())
            .or_else(|| state.fields.get(id))
            .cloned()
            .unwrap_or_default())
    }

    fn clear(&self, element: &ElementRef) -> Result<(), AutomationError> {
        let mut state = self.existing(element)?;
        let id = element.as_str();
        if !state.rejecting.contains(id) {
            state.fields.insert(id.to_string(), String::new());
        }
        Ok(())
    }

    fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), AutomationError> {
        self.write(element, text, true)
    }

    fn click(&self, element: &ElementRef) -> Result<(), AutomationError> {
        let mut state = self.existing(element)?;
        let id = element.as_str().to_string();
        state.clicks.push(id.clone());
        if let Some(mut effect) = state.on_click.remove(&id) {
            effect(&mut *state);
            state.on_click.insert(id, effect);
        }
        Ok(())
    }

    fn select_by_visible_text(
        &self,
        element: &ElementRef,
        text: &str,
    ) -> Result<(), AutomationError> {
        self.write(element, text, false)
    }

    fn execute_script(&self, script: &str, _args: Vec<Value>) -> Result<Value, AutomationError> {
        if script.contains("readyState") {
            return Ok(Value::String(self.state().ready_state.clone()));
        }
        Ok(Value::Null)
    }

    fn page_source(&self) -> Result<String, AutomationError> {
        let mut state = self.state();
        let source = if state.page_sources.len() > 1 {
            state.page_sources.pop_front()
        } else {
            state.page_sources.front().cloned()
        };
        Ok(source.unwrap_or_else(|| "<html></html>".to_string()))
    }

    fn switch_to_frame(&self, name: Option<&str>) -> Result<(), AutomationError> {
        self.state().frames.push(name.map(str::to_string));
        Ok(())
    }

    fn dismiss_alert(&self) -> Result<Option<String>, AutomationError> {
        Ok(self.state().alerts.pop_front())
    }

    fn quit(&self) -> Result<(), AutomationError> {
        self.state().quit = true;
        Ok(())
    }
}

/// Wait engine over a fake browser with fast timings
pub fn fast_waits(browser: &Arc<FakeBrowser>) -> WaitEngine {
    let driver: Arc<dyn BrowserDriver> = browser.clone();
    WaitEngine::new(driver, fast_wait_config())
}
