use super::retry::{Attempt, RetryOutcome, RetryPolicy};
use crate::element::Element;
use crate::wait::{Condition, WaitEngine};
use crate::{AutomationError, Selector};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Attempts per field before it is abandoned
pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-text input
    Input,
    /// `<select>` matched by exact visible text
    Select,
}

/// One cell to reconcile. Built per call, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTarget {
    pub element_id: String,
    pub expected_value: String,
    pub kind: FieldKind,
}

impl FieldTarget {
    pub fn input(element_id: impl Into<String>, expected_value: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            expected_value: expected_value.into(),
            kind: FieldKind::Input,
        }
    }

    pub fn select(element_id: impl Into<String>, expected_value: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            expected_value: expected_value.into(),
            kind: FieldKind::Select,
        }
    }
}

/// What happened to one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillOutcome {
    /// The field already held the target; nothing was written
    AlreadyPresent,
    /// The target was written and read back
    Written { attempts: u32 },
    /// The field does not exist on this page variant
    NotFound,
    /// A free-text field already holds some other value and was left alone
    Occupied { current: String },
    /// Every attempt failed; the field was given up on
    Abandoned { attempts: u32, reason: String },
}

impl FillOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FillOutcome::AlreadyPresent | FillOutcome::Written { .. })
    }
}

/// Tuning for the field insertion engine
#[derive(Debug, Clone)]
pub struct FillConfig {
    pub max_attempts: u32,
    /// Pause after a write so the page can re-render before verification
    pub write_settle: Duration,
    /// Pause between two failed attempts
    pub retry_delay: Duration,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            write_settle: Duration::from_secs(1),
            retry_delay: Duration::ZERO,
        }
    }
}

/// Makes a field hold a target value, tolerating re-renders.
///
/// Per field: probe, compare, write, verify; stale references count as failed
/// attempts. After `max_attempts` the field is abandoned with a warning and
/// no error reaches the caller, since one unfillable field must not stop a run.
#[derive(Clone)]
pub struct FieldInserter {
    waits: WaitEngine,
    config: FillConfig,
}

impl FieldInserter {
    pub fn new(waits: WaitEngine, config: FillConfig) -> Self {
        Self { waits, config }
    }

    pub fn waits(&self) -> &WaitEngine {
        &self.waits
    }

    /// Make `target.element_id` hold `target.expected_value`.
    #[instrument(
        level = "debug",
        skip(self),
        fields(field = %target.element_id, value = %target.expected_value)
    )]
    pub fn reconcile(&self, target: &FieldTarget) -> FillOutcome {
        let selector = Selector::id(&target.element_id);
        if self.waits.element(&selector, Condition::Present).is_none() {
            warn!(
                field = %target.element_id,
                value = %target.expected_value,
                "Field not found; skipping"
            );
            return FillOutcome::NotFound;
        }

        let mut wrote = false;
        let policy =
            RetryPolicy::new(self.config.max_attempts).with_delay(self.config.retry_delay);
        let outcome = policy.run(|attempt| self.attempt(&selector, target, attempt, &mut wrote));

        match outcome {
            RetryOutcome::Succeeded { attempts, .. } if !wrote => {
                debug!(attempts, "Field already holds the target value");
                FillOutcome::AlreadyPresent
            }
            RetryOutcome::Succeeded { attempts, .. } => {
                info!(
                    field = %target.element_id,
                    value = %target.expected_value,
                    attempts,
                    "Field filled"
                );
                FillOutcome::Written { attempts }
            }
            RetryOutcome::Exhausted {
                attempts,
                last_reason,
            } => {
                warn!(
                    field = %target.element_id,
                    value = %target.expected_value,
                    attempts,
                    reason = %last_reason,
                    "Giving up on field after repeated failures"
                );
                FillOutcome::Abandoned {
                    attempts,
                    reason: last_reason,
                }
            }
            RetryOutcome::Abandoned { attempts, reason } => {
                warn!(
                    field = %target.element_id,
                    value = %target.expected_value,
                    attempts,
                    %reason,
                    "Giving up on field"
                );
                FillOutcome::Abandoned { attempts, reason }
            }
        }
    }

    /// Write a free-text field only when it is currently empty.
    pub fn fill_if_empty(&self, element_id: &str, value: &str) -> FillOutcome {
        let selector = Selector::id(element_id);
        let Some(element) = self.waits.element(&selector, Condition::Present) else {
            warn!(field = element_id, value, "Field not found; skipping");
            return FillOutcome::NotFound;
        };
        match read_value(&element, FieldKind::Input) {
            Ok(current) if values_match(&current, value) => FillOutcome::AlreadyPresent,
            Ok(current) if !current.trim().is_empty() => {
                debug!(field = element_id, %current, "Field already holds a value; leaving it");
                FillOutcome::Occupied { current }
            }
            _ => self.reconcile(&FieldTarget::input(element_id, value)),
        }
    }

    /// Pick the option with exactly this visible text in a `<select>`
    pub fn select(&self, element_id: &str, visible_text: &str) -> FillOutcome {
        self.reconcile(&FieldTarget::select(element_id, visible_text))
    }

    /// Current value of a field, or `None` when it cannot be read
    pub fn read(&self, element_id: &str, kind: FieldKind) -> Option<String> {
        let element = self.waits.find(&Selector::id(element_id))?;
        match read_value(&element, kind) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(field = element_id, error = %e, "Could not read field");
                None
            }
        }
    }

    fn attempt(
        &self,
        selector: &Selector,
        target: &FieldTarget,
        attempt: u32,
        wrote: &mut bool,
    ) -> Attempt<()> {
        let Some(element) = self.waits.find(selector) else {
            return Attempt::Retryable("field disappeared from the page".to_string());
        };

        match read_value(&element, target.kind) {
            Ok(current) if values_match(&current, &target.expected_value) => {
                return Attempt::Success(())
            }
            Ok(current) => debug!(attempt, %current, "Field differs from target"),
            Err(e) => return classify(e),
        }

        let written = match target.kind {
            FieldKind::Input => element.set_text(&target.expected_value),
            FieldKind::Select => element.select_option(&target.expected_value),
        };
        if let Err(e) = written {
            return classify(e);
        }
        *wrote = true;

        if !self.config.write_settle.is_zero() {
            thread::sleep(self.config.write_settle);
        }

        // The write may have re-rendered the cell, so look it up again.
        let Some(element) = self.waits.find(selector) else {
            return Attempt::Retryable("field disappeared after write".to_string());
        };
        match read_value(&element, target.kind) {
            Ok(current) if values_match(&current, &target.expected_value) => Attempt::Success(()),
            Ok(current) => Attempt::Retryable(format!("read back {current:?} after write")),
            Err(e) => classify(e),
        }
    }
}

fn read_value(element: &Element, kind: FieldKind) -> Result<String, AutomationError> {
    match kind {
        FieldKind::Input => element.value(),
        FieldKind::Select => element.selected_text(),
    }
}

fn classify(error: AutomationError) -> Attempt<()> {
    match error {
        AutomationError::StaleElement(msg) => Attempt::Retryable(format!("stale reference: {msg}")),
        AutomationError::ElementNotFound(msg) => Attempt::Retryable(format!("not found: {msg}")),
        AutomationError::Timeout(msg) => Attempt::Retryable(format!("timeout: {msg}")),
        other => Attempt::Abandoned(other.to_string()),
    }
}

/// Compare a field's content with a target.
///
/// Text is compared after trimming. When both sides are numbers the
/// comparison is numeric, because the grid reformats hours (`8` → `8,00`).
pub fn values_match(current: &str, expected: &str) -> bool {
    let (current, expected) = (current.trim(), expected.trim());
    if current == expected {
        return true;
    }
    match (parse_number(current), parse_number(expected)) {
        (Some(a), Some(b)) => (a - b).abs() < 1e-9,
        _ => false,
    }
}

pub(crate) fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.replace(',', ".").parse::<f64>().ok()
}
