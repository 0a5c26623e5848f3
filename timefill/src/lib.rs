//! Automated entry of a weekly timesheet into a fixed-layout web application
//!
//! A W3C WebDriver session drives the browser. A wait engine decides when the
//! page is safe to touch, a retrying field inserter reconciles cell values
//! against the configured schedule, and login secrets travel from the
//! producer to the run through encrypted shared memory segments.

pub mod calendar;
pub mod config;
pub mod credentials;
pub mod dom;
pub mod driver;
pub mod element;
pub mod errors;
pub mod fill;
pub mod hooks;
pub mod locator;
pub mod orchestrator;
pub mod selector;
#[cfg(test)]
mod tests;
pub mod wait;

pub use calendar::{next_saturday, PerWeekday, Weekday};
pub use config::AutomationContext;
pub use credentials::{CredentialHandoff, Credentials, ErasureGuard};
pub use driver::{create_driver, BrowserDriver, BrowserSession, DriverConfig, ElementRef};
pub use element::Element;
pub use errors::{AutomationError, CredentialError};
pub use fill::{FieldInserter, FillConfig, FillOutcome};
pub use hooks::{HookId, HookPoint, HookRegistry};
pub use locator::Locator;
pub use orchestrator::{AbortReason, Orchestrator, RunOutcome, RunReport, RunState};
pub use selector::Selector;
pub use wait::{Condition, WaitConfig, WaitEngine};
