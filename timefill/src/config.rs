//! Run configuration

use crate::calendar::PerWeekday;
use crate::credentials::{CredentialFallback, EncryptedCredentialBlob};
use crate::driver::DriverConfig;
use crate::errors::AutomationError;
use crate::fill::{FillConfig, RowCodes, WeekSchedule};
use crate::wait::WaitConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variables that override file values
pub const ENV_URL: &str = "TIMEFILL_URL";
pub const ENV_TARGET_DATE: &str = "TIMEFILL_TARGET_DATE";
pub const ENV_WEBDRIVER_URL: &str = "TIMEFILL_WEBDRIVER_URL";
pub const ENV_BROWSER: &str = "TIMEFILL_BROWSER";
pub const ENV_HEADLESS: &str = "TIMEFILL_HEADLESS";
pub const ENV_RUN_ID: &str = "TIMEFILL_RUN_ID";
pub const ENV_PAUSE_ON_WARNINGS: &str = "TIMEFILL_PAUSE_ON_WARNINGS";

/// Everything one run needs, minus the decrypted credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationContext {
    pub credentials: CredentialsSection,
    pub settings: Settings,
    pub driver: DriverConfig,
    pub timeouts: Timeouts,
    pub project: ProjectSection,
    pub work_schedule: WeekSchedule,
    pub additional_information: AdditionalInformation,
    pub location: LocationSection,
    pub dropdown_options: DropdownOptions,
}

/// Pre-encrypted secrets, base64 `iv || ciphertext`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsSection {
    pub login: Option<String>,
    pub password: Option<String>,
}

impl CredentialsSection {
    pub fn fallback(&self) -> Result<CredentialFallback, AutomationError> {
        type Decoded = Result<Option<EncryptedCredentialBlob>, AutomationError>;
        let decode = |value: &Option<String>| -> Decoded {
            match value.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(encoded) => Ok(Some(EncryptedCredentialBlob::from_base64(encoded)?)),
            }
        };
        Ok(CredentialFallback {
            login: decode(&self.login)?,
            password: decode(&self.password)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Login page of the timesheet application
    pub url: String,
    /// `dd/mm/yyyy`, or blank/"none" for the next Saturday
    pub target_date: Option<String>,
    pub headless: bool,
    /// Ask the operator before continuing past a post-save warning
    pub pause_on_warnings: bool,
    /// Descriptions routed to the mission cells instead of a grid row
    pub mission_descriptions: Vec<String>,
    /// Scopes the shared memory segment names; generated when absent
    pub run_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: String::new(),
            target_date: None,
            headless: false,
            pause_on_warnings: false,
            mission_descriptions: vec!["Mission".to_string()],
            run_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub poll_interval_ms: u64,
    pub stability_interval_ms: u64,
    pub stable_snapshots: usize,
    pub stability_timeout_secs: u64,
    pub short_timeout_secs: u64,
    pub page_load_timeout_secs: u64,
    pub max_attempts: u32,
    pub write_settle_ms: u64,
    pub retry_delay_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        let wait = WaitConfig::default();
        let fill = FillConfig::default();
        Self {
            poll_interval_ms: wait.poll_interval.as_millis() as u64,
            stability_interval_ms: wait.stability_interval.as_millis() as u64,
            stable_snapshots: wait.stable_snapshots,
            stability_timeout_secs: wait.stability_timeout.as_secs(),
            short_timeout_secs: wait.short_timeout.as_secs(),
            page_load_timeout_secs: wait.page_load_timeout.as_secs(),
            max_attempts: fill.max_attempts,
            write_settle_ms: fill.write_settle.as_millis() as u64,
            retry_delay_ms: fill.retry_delay.as_millis() as u64,
        }
    }
}

impl Timeouts {
    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stability_interval: Duration::from_millis(self.stability_interval_ms),
            stable_snapshots: self.stable_snapshots.max(1),
            stability_timeout: Duration::from_secs(self.stability_timeout_secs),
            short_timeout: Duration::from_secs(self.short_timeout_secs),
            page_load_timeout: Duration::from_secs(self.page_load_timeout_secs),
        }
    }

    pub fn fill_config(&self) -> FillConfig {
        FillConfig {
            max_attempts: self.max_attempts.max(1),
            write_settle: Duration::from_millis(self.write_settle_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    pub project_code: Option<String>,
    pub activity_code: Option<String>,
    pub billing_action: Option<String>,
}

impl ProjectSection {
    pub fn row_codes(&self) -> RowCodes {
        let non_blank = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();
        RowCodes {
            project_code: non_blank(&self.project_code),
            activity_code: non_blank(&self.activity_code),
            billing_action: non_blank(&self.billing_action),
        }
    }
}

/// Supplementary line-items of the additional information modal
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalInformation {
    /// Whether the daily rest period was respected
    pub rest_period: PerWeekday<Option<String>>,
    pub work_time_range: PerWeekday<Option<String>>,
    pub half_day_worked: PerWeekday<Option<String>>,
    pub lunch_break: PerWeekday<Option<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationSection {
    pub morning: PerWeekday<Option<String>>,
    pub afternoon: PerWeekday<Option<String>>,
}

/// Values each dropdown accepts; an empty list disables the check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DropdownOptions {
    pub rest_period: Vec<String>,
    pub work_time_range: Vec<String>,
    pub half_day_worked: Vec<String>,
    pub lunch_break: Vec<String>,
    pub location: Vec<String>,
}

fn parse_bool(name: &str, value: &str) -> Result<bool, AutomationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(AutomationError::Config(format!(
            "{name} must be a boolean, got {other:?}"
        ))),
    }
}

fn unknown_values(
    section: &str,
    values: &PerWeekday<Option<String>>,
    options: &[String],
) -> Vec<String> {
    if options.is_empty() {
        return Vec::new();
    }
    values
        .iter()
        .filter_map(|(day, value)| {
            let value = value.as_deref()?.trim();
            (!value.is_empty() && !options.iter().any(|o| o.trim() == value)).then(|| {
                format!("{section}.{}: {value:?} is not one of the dropdown options", day.name())
            })
        })
        .collect()
}

impl AutomationContext {
    /// Read a TOML file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self, AutomationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        let mut context = Self::from_toml_str(&content)?;
        context.apply_env_overrides(|name| std::env::var(name).ok())?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(context)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, AutomationError> {
        toml::from_str(content)
            .map_err(|e| AutomationError::Config(format!("Invalid configuration: {e}")))
    }

    pub fn to_toml_string(&self) -> Result<String, AutomationError> {
        toml::to_string_pretty(self)
            .map_err(|e| AutomationError::Config(format!("Cannot serialize configuration: {e}")))
    }

    /// Overwrite file values with variables found through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), AutomationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.settings.url = url;
        }
        if let Some(date) = lookup(ENV_TARGET_DATE) {
            self.settings.target_date = Some(date);
        }
        if let Some(url) = lookup(ENV_WEBDRIVER_URL) {
            self.driver.webdriver_url = url;
        }
        if let Some(browser) = lookup(ENV_BROWSER) {
            self.driver.browser = browser;
        }
        if let Some(value) = lookup(ENV_HEADLESS) {
            self.settings.headless = parse_bool(ENV_HEADLESS, &value)?;
        }
        if let Some(run_id) = lookup(ENV_RUN_ID) {
            self.settings.run_id = Some(run_id);
        }
        if let Some(value) = lookup(ENV_PAUSE_ON_WARNINGS) {
            self.settings.pause_on_warnings = parse_bool(ENV_PAUSE_ON_WARNINGS, &value)?;
        }
        Ok(())
    }

    /// Driver settings with the `[settings]` headless flag folded in
    pub fn driver_config(&self) -> DriverConfig {
        let mut driver = self.driver.clone();
        driver.headless |= self.settings.headless;
        driver
    }

    /// Reject configurations a run cannot start with. Returns the soft
    /// problems (unknown dropdown values) as warnings.
    pub fn validate(&self) -> Result<Vec<String>, AutomationError> {
        if self.settings.url.trim().is_empty() {
            return Err(AutomationError::Config(format!(
                "settings.url is empty (set it in the file or through {ENV_URL})"
            )));
        }
        if let Some(date) = self.settings.target_date.as_deref() {
            if !crate::calendar::is_auto_date(Some(date)) {
                chrono::NaiveDate::parse_from_str(date.trim(), crate::calendar::DATE_FORMAT)
                    .map_err(|e| {
                        AutomationError::Config(format!(
                            "settings.target_date {date:?} is not dd/mm/yyyy: {e}"
                        ))
                    })?;
            }
        }
        self.credentials.fallback()?;

        let info = &self.additional_information;
        let options = &self.dropdown_options;
        let mut warnings = Vec::new();
        warnings.extend(unknown_values("rest_period", &info.rest_period, &options.rest_period));
        warnings.extend(unknown_values(
            "work_time_range",
            &info.work_time_range,
            &options.work_time_range,
        ));
        warnings.extend(unknown_values(
            "half_day_worked",
            &info.half_day_worked,
            &options.half_day_worked,
        ));
        warnings.extend(unknown_values("lunch_break", &info.lunch_break, &options.lunch_break));
        warnings.extend(unknown_values(
            "location.morning",
            &self.location.morning,
            &options.location,
        ));
        warnings.extend(unknown_values(
            "location.afternoon",
            &self.location.afternoon,
            &options.location,
        ));
        for warning in &warnings {
            warn!("{warning}");
        }
        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Weekday;
    use crate::fill::ScheduleEntry;

    const SAMPLE: &str = r#"
[settings]
url = "https://timesheet.example.com/login"
target_date = "none"
mission_descriptions = ["Mission client"]

[driver]
browser = "firefox"

[timeouts]
short_timeout_secs = 3
write_settle_ms = 0

[project]
project_code = "PRJ-042"
activity_code = ""

[work_schedule]
lundi = "Développement,8"
mardi = "Mission client,7.5"

[additional_information.rest_period]
lundi = "Oui"
mardi = "Peut-être"

[location.morning]
lundi = "Bureau"

[dropdown_options]
rest_period = ["Oui", "Non"]
location = ["Bureau", "Domicile"]
"#;

    #[test]
    fn parses_sections_with_defaults() {
        let context = AutomationContext::from_toml_str(SAMPLE).unwrap();
        assert_eq!(context.settings.url, "https://timesheet.example.com/login");
        assert_eq!(context.driver.browser, "firefox");
        assert_eq!(context.driver.webdriver_url, "http://localhost:9515");
        assert_eq!(
            context.work_schedule.get(Weekday::Monday),
            &Some(ScheduleEntry::new("Développement", "8"))
        );
        assert_eq!(context.work_schedule.get(Weekday::Sunday), &None);
        assert_eq!(context.timeouts.wait_config().short_timeout, Duration::from_secs(3));
        assert_eq!(context.timeouts.wait_config().stable_snapshots, 3);
        assert!(context.timeouts.fill_config().write_settle.is_zero());
    }

    #[test]
    fn blank_project_codes_are_dropped() {
        let context = AutomationContext::from_toml_str(SAMPLE).unwrap();
        let codes = context.project.row_codes();
        assert_eq!(codes.project_code.as_deref(), Some("PRJ-042"));
        assert_eq!(codes.activity_code, None);
    }

    #[test]
    fn malformed_schedule_entry_is_a_config_error() {
        let err = AutomationContext::from_toml_str("[work_schedule]\nlundi = \"no hours\"\n")
            .unwrap_err();
        assert!(matches!(err, AutomationError::Config(_)));
    }

    #[test]
    fn env_overrides_win() {
        let mut context = AutomationContext::from_toml_str(SAMPLE).unwrap();
        context
            .apply_env_overrides(|name| match name {
                ENV_URL => Some("https://other.example.com".to_string()),
                ENV_HEADLESS => Some("yes".to_string()),
                ENV_TARGET_DATE => Some("06/07/2024".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(context.settings.url, "https://other.example.com");
        assert_eq!(context.settings.target_date.as_deref(), Some("06/07/2024"));
        assert!(context.driver_config().headless);
        assert_eq!(context.driver.browser, "firefox");
    }

    #[test]
    fn bad_boolean_override_is_rejected() {
        let mut context = AutomationContext::default();
        let result = context.apply_env_overrides(|name| {
            (name == ENV_PAUSE_ON_WARNINGS).then(|| "maybe".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn unknown_dropdown_values_are_warnings() {
        let context = AutomationContext::from_toml_str(SAMPLE).unwrap();
        let warnings = context.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("rest_period.mardi"));
    }

    #[test]
    fn missing_url_fails_validation() {
        assert!(AutomationContext::default().validate().is_err());
    }

    #[test]
    fn serializes_back_to_toml() {
        let context = AutomationContext::from_toml_str(SAMPLE).unwrap();
        let text = context.to_toml_string().unwrap();
        let again = AutomationContext::from_toml_str(&text).unwrap();
        assert_eq!(again.work_schedule, context.work_schedule);
    }
}
