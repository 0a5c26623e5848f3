//! The fixed navigation path through the timesheet application.
//!
//! `LoggingIn → SelectingDate → (DateConflict | FillingSchedule) →
//! FillingAdditionalInfo → Saving → (SaveWarning* | Done)`, with `FatalAbort`
//! entered on a date conflict or when credentials cannot be obtained.

pub mod additional;
pub mod dialogs;
pub mod prompt;

pub use additional::{fill_additional_information, SupplementaryItem, SupplementaryOutcome};
pub use dialogs::{classify_dialog, is_date_conflict, SaveWarning};
pub use prompt::{AutoConfirm, OperatorPrompt, TerminalPrompt};

use crate::calendar::{is_auto_date, next_saturday};
use crate::config::AutomationContext;
use crate::credentials::{CredentialHandoff, Credentials};
use crate::driver::BrowserDriver;
use crate::errors::AutomationError;
use crate::fill::{
    DuplicateDay, FieldInserter, FieldKind, FieldTarget, FillSession, WeekFillReport, WeekFiller,
};
use crate::hooks::{HookPoint, HookRegistry};
use crate::locator::Locator;
use crate::wait::{Condition, WaitEngine};
use crate::{dom, Selector};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Post-save dialogs acknowledged before giving up on draining them
const MAX_SAVE_DIALOGS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    LoggingIn,
    SelectingDate,
    DateConflict,
    FillingSchedule,
    FillingAdditionalInfo,
    Saving,
    SaveWarning,
    Done,
    FatalAbort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// A timesheet already exists for the selected period
    DateConflict { period_end: String, message: String },
    /// Credentials could not be retrieved or decrypted
    Credentials(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::DateConflict { period_end, message } => write!(
                f,
                "a timesheet already exists for the period ending {period_end} ({message}); \
                 change settings.target_date and run again"
            ),
            AbortReason::Credentials(reason) => write!(f, "credentials unavailable: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Aborted(AbortReason),
}

/// A dialog acknowledged after saving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveDialog {
    pub kind: SaveWarning,
    pub message: String,
}

/// What a run did, state by state
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub states: Vec<RunState>,
    pub period_end: Option<String>,
    pub schedule: WeekFillReport,
    pub additional: Vec<SupplementaryOutcome>,
    pub duplicates: Vec<DuplicateDay>,
    pub save_dialogs: Vec<SaveDialog>,
    pub warnings: Vec<String>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            outcome: RunOutcome::Completed,
            states: Vec::new(),
            period_end: None,
            schedule: WeekFillReport::default(),
            additional: Vec::new(),
            duplicates: Vec::new(),
            save_dialogs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn enter(&mut self, state: RunState) {
        info!(?state, "Entering state");
        self.states.push(state);
    }

    fn abort(mut self, reason: AbortReason) -> Self {
        error!(%reason, "Run aborted");
        self.enter(RunState::FatalAbort);
        self.outcome = RunOutcome::Aborted(reason);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    pub fn is_date_conflict(&self) -> bool {
        matches!(
            self.outcome,
            RunOutcome::Aborted(AbortReason::DateConflict { .. })
        )
    }
}

/// Where the login secrets come from
pub trait CredentialSource {
    fn credentials(&self, context: &AutomationContext) -> Result<Credentials, AutomationError>;
}

impl CredentialSource for CredentialHandoff {
    fn credentials(&self, context: &AutomationContext) -> Result<Credentials, AutomationError> {
        self.retrieve_credentials(&context.credentials.fallback()?)
    }
}

impl CredentialSource for Credentials {
    fn credentials(&self, _context: &AutomationContext) -> Result<Credentials, AutomationError> {
        Ok(self.clone())
    }
}

enum DateSelection {
    Selected(String),
    Conflict { period_end: String, message: String },
}

/// Drives one run against an open browser session
pub struct Orchestrator {
    context: AutomationContext,
    waits: WaitEngine,
    inserter: FieldInserter,
    hooks: HookRegistry,
    prompt: Box<dyn OperatorPrompt>,
}

impl Orchestrator {
    pub fn new(driver: Arc<dyn BrowserDriver>, context: AutomationContext) -> Self {
        let waits = WaitEngine::new(driver, context.timeouts.wait_config());
        let inserter = FieldInserter::new(waits.clone(), context.timeouts.fill_config());
        Self {
            context,
            waits,
            inserter,
            hooks: HookRegistry::new(),
            prompt: Box::new(AutoConfirm),
        }
    }

    pub fn with_prompt(mut self, prompt: Box<dyn OperatorPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    pub fn context(&self) -> &AutomationContext {
        &self.context
    }

    fn driver(&self) -> &dyn BrowserDriver {
        self.waits.driver().as_ref()
    }

    fn locate(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.waits.clone(), selector)
    }

    /// Run the whole path. Driver failures surface as `Err`; a date conflict
    /// or missing credentials end in an `Aborted` report.
    #[instrument(skip_all, fields(url = %self.context.settings.url))]
    pub fn run(&mut self, source: &dyn CredentialSource) -> Result<RunReport, AutomationError> {
        let mut report = RunReport::new();
        report.warnings = self.context.validate()?;

        report.enter(RunState::LoggingIn);
        let credentials = match source.credentials(&self.context) {
            Ok(credentials) => credentials,
            Err(e) => return Ok(report.abort(AbortReason::Credentials(e.to_string()))),
        };
        self.log_in(&credentials)?;
        drop(credentials);
        self.hooks.emit(HookPoint::AfterLogin, self.waits.driver().as_ref());

        report.enter(RunState::SelectingDate);
        match self.select_date()? {
            DateSelection::Selected(period_end) => report.period_end = Some(period_end),
            DateSelection::Conflict {
                period_end,
                message,
            } => {
                report.enter(RunState::DateConflict);
                report.period_end = Some(period_end.clone());
                return Ok(report.abort(AbortReason::DateConflict {
                    period_end,
                    message,
                }));
            }
        }

        report.enter(RunState::FillingSchedule);
        let (schedule, duplicates) = self.fill_schedule();
        report.schedule = schedule;
        report.duplicates = duplicates;

        report.enter(RunState::FillingAdditionalInfo);
        report.additional = self.fill_additional_info(&mut report.warnings);

        report.enter(RunState::Saving);
        self.save(&mut report)?;

        report.enter(RunState::Done);
        info!(
            filled = report.schedule.filled().count(),
            failed = report.schedule.failed().count(),
            duplicates = report.duplicates.len(),
            save_dialogs = report.save_dialogs.len(),
            "Run completed"
        );
        Ok(report)
    }

    fn log_in(&self, credentials: &Credentials) -> Result<(), AutomationError> {
        self.driver().navigate(&self.context.settings.url)?;
        self.waits.wait_for_page();

        // Written directly so the secrets never reach the field logs.
        self.locate(Selector::id(dom::LOGIN_USERNAME))
            .visible()
            .wait()?
            .set_text(&credentials.username)?;
        self.locate(Selector::id(dom::LOGIN_PASSWORD))
            .visible()
            .wait()?
            .set_text(&credentials.password)?;
        self.locate(Selector::Name(dom::LOGIN_SUBMIT.to_string()))
            .clickable()
            .click()?;

        let config = self.waits.config();
        self.waits.wait_until_document_ready(config.page_load_timeout);
        self.waits.wait_until_content_stable(config.stability_timeout);
        info!("Logged in");
        Ok(())
    }

    fn select_date(&self) -> Result<DateSelection, AutomationError> {
        self.driver().switch_to_frame(Some(dom::MAIN_FRAME))?;
        self.waits.wait_for_page();

        let configured = self.context.settings.target_date.as_deref();
        let period_end = if is_auto_date(configured) {
            let current = self
                .inserter
                .read(dom::DATE_FIELD, FieldKind::Input)
                .ok_or_else(|| AutomationError::ElementNotFound(dom::DATE_FIELD.to_string()))?;
            let saturday = next_saturday(&current)?;
            debug!(%current, %saturday, "Using the next Saturday as period end");
            saturday
        } else {
            configured.unwrap_or_default().trim().to_string()
        };

        let outcome = self
            .inserter
            .reconcile(&FieldTarget::input(dom::DATE_FIELD, &period_end));
        if !outcome.is_success() {
            warn!(%period_end, ?outcome, "Period end date could not be confirmed");
        }

        self.locate(Selector::id(dom::ADD_BUTTON)).clickable().click()?;
        self.waits.wait_for_page();

        if let Some(message) = self.take_dialog() {
            if is_date_conflict(&message) {
                return Ok(DateSelection::Conflict {
                    period_end,
                    message,
                });
            }
            warn!(%message, "Unexpected dialog after selecting the period");
        }
        info!(%period_end, "Period selected");
        Ok(DateSelection::Selected(period_end))
    }

    fn fill_schedule(&self) -> (WeekFillReport, Vec<DuplicateDay>) {
        let filler = WeekFiller::new(&self.inserter)
            .with_mission_descriptions(&self.context.settings.mission_descriptions)
            .with_row_codes(self.context.project.row_codes());
        let mut session = FillSession::new();

        let schedule = &self.context.work_schedule;
        let mut report = filler.fill_standard_days(&mut session, schedule);
        report.merge(filler.fill_mission_days(&mut session, schedule));
        let duplicates = filler.detect_duplicate_days();
        (report, duplicates)
    }

    fn fill_additional_info(&self, warnings: &mut Vec<String>) -> Vec<SupplementaryOutcome> {
        let info = &self.context.additional_information;
        let location = &self.context.location;
        if additional::planned_cells(info, location).is_empty() {
            debug!("No supplementary information configured");
            return Vec::new();
        }

        if let Err(e) = self.locate(Selector::id(dom::ADDITIONAL_INFO_LINK)).clickable().click() {
            let message = format!("Additional information modal could not be opened: {e}");
            warn!("{message}");
            warnings.push(message);
            return Vec::new();
        }
        self.waits.wait_for_page();

        let outcomes = match self.enter_modal_frame() {
            Ok(()) => {
                let outcomes = fill_additional_information(&self.inserter, info, location);
                if let Err(e) = self.locate(dom::ADDITIONAL_INFO_SAVE).clickable().click() {
                    let message = format!("Additional information modal could not be closed: {e}");
                    warn!("{message}");
                    warnings.push(message);
                }
                outcomes
            }
            Err(e) => {
                let message = format!("Additional information frame unavailable: {e}");
                warn!("{message}");
                warnings.push(message);
                Vec::new()
            }
        };

        if let Err(e) = self.return_to_main_frame() {
            warn!(error = %e, "Could not return to the main frame");
        }
        self.waits.wait_for_page();

        for failed in outcomes.iter().filter(|o| !o.outcome.is_success()) {
            warnings.push(format!(
                "{} for {} was not applied: {:?}",
                failed.item.name(),
                failed.day,
                failed.outcome
            ));
        }
        outcomes
    }

    fn enter_modal_frame(&self) -> Result<(), AutomationError> {
        self.driver().switch_to_frame(None)?;
        self.driver().switch_to_frame(Some(dom::ADDITIONAL_INFO_FRAME))
    }

    fn return_to_main_frame(&self) -> Result<(), AutomationError> {
        self.driver().switch_to_frame(None)?;
        self.driver().switch_to_frame(Some(dom::MAIN_FRAME))
    }

    fn save(&mut self, report: &mut RunReport) -> Result<(), AutomationError> {
        self.hooks.emit(HookPoint::BeforeSave, self.waits.driver().as_ref());

        self.locate(Selector::id(dom::SAVE_DRAFT_BUTTON))
            .clickable()
            .click()?;
        self.waits.wait_for_page();

        for _ in 0..MAX_SAVE_DIALOGS {
            let Some(message) = self.take_dialog() else {
                break;
            };
            // The inline message stays on the page once shown.
            if report.save_dialogs.last().is_some_and(|d| d.message == message) {
                break;
            }
            let kind = classify_dialog(&message);
            report.enter(RunState::SaveWarning);
            warn!(%kind, %message, "Save raised a warning");
            if self.context.settings.pause_on_warnings {
                self.prompt.acknowledge(kind, &message);
            }
            report.save_dialogs.push(SaveDialog { kind, message });
            self.waits.wait_for_page();
        }
        info!("Draft saved");
        Ok(())
    }

    /// Read and acknowledge the dialog currently shown, if any: a native
    /// alert first, then the in-page modal, then the inline alert message.
    fn take_dialog(&self) -> Option<String> {
        match self.driver().dismiss_alert() {
            Ok(Some(text)) => return Some(text),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Alert probe failed"),
        }

        if let Some(modal) = self.waits.find(&Selector::id(dom::MODAL_MESSAGE)) {
            if modal.is_displayed().unwrap_or(false) {
                let text = modal.text().unwrap_or_default();
                if let Err(e) = self.locate(dom::MODAL_OK_BUTTON).clickable().click() {
                    warn!(error = %e, "Could not acknowledge modal dialog");
                }
                return Some(text.trim().to_string());
            }
        }

        let inline = self.waits.find(&Selector::id(dom::ALERT_MESSAGE))?;
        if !inline.is_displayed().unwrap_or(false) {
            return None;
        }
        let text = inline.text().ok()?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}
