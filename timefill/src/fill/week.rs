use super::field::{parse_number, FieldInserter, FieldKind, FieldTarget, FillOutcome};
use crate::calendar::{PerWeekday, Weekday};
use crate::{dom, AutomationError, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// One configured day: `description,hours`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScheduleEntry {
    pub description: String,
    pub hours: String,
}

impl ScheduleEntry {
    pub fn new(description: impl Into<String>, hours: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            hours: hours.into(),
        }
    }

    /// Entries with no hours (or zero hours) leave the day untouched
    pub fn has_hours(&self) -> bool {
        match parse_number(&self.hours) {
            Some(h) => h > 0.0,
            None => !self.hours.trim().is_empty(),
        }
    }
}

impl FromStr for ScheduleEntry {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (description, hours) = s.rsplit_once(',').ok_or_else(|| {
            AutomationError::Config(format!(
                "Schedule entry {s:?} must be formatted as \"description,hours\""
            ))
        })?;
        let description = description.trim();
        let hours = hours.trim();
        if description.is_empty() {
            return Err(AutomationError::Config(format!(
                "Schedule entry {s:?} has an empty description"
            )));
        }
        if !hours.is_empty() && parse_number(hours).is_none() {
            return Err(AutomationError::Config(format!(
                "Schedule entry {s:?} has non-numeric hours {hours:?}"
            )));
        }
        Ok(Self::new(description, hours))
    }
}

impl TryFrom<String> for ScheduleEntry {
    type Error = AutomationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleEntry> for String {
    fn from(entry: ScheduleEntry) -> Self {
        format!("{},{}", entry.description, entry.hours)
    }
}

/// Configured schedule for a week: one optional entry per day
pub type WeekSchedule = PerWeekday<Option<ScheduleEntry>>;

/// Days that already received a confirmed value during this run.
///
/// A day, once recorded, is never revisited or overwritten in the same run.
#[derive(Debug, Default, Clone)]
pub struct FillSession {
    filled_days: BTreeSet<Weekday>,
}

impl FillSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_filled(&self, day: Weekday) -> bool {
        self.filled_days.contains(&day)
    }

    /// Returns `false` if the day was already recorded
    pub fn mark_filled(&mut self, day: Weekday) -> bool {
        self.filled_days.insert(day)
    }

    pub fn filled_days(&self) -> impl Iterator<Item = Weekday> + '_ {
        self.filled_days.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.filled_days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filled_days.is_empty()
    }
}

/// Per-day results of one weekly pass
#[derive(Debug, Default, Clone)]
pub struct WeekFillReport {
    pub outcomes: Vec<(Weekday, FillOutcome)>,
    /// Days skipped because the session already had them
    pub skipped: Vec<Weekday>,
    /// Days with an entry but no grid row to put it in
    pub unplaced: Vec<Weekday>,
}

impl WeekFillReport {
    pub fn filled(&self) -> impl Iterator<Item = Weekday> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_success())
            .map(|(d, _)| *d)
    }

    pub fn failed(&self) -> impl Iterator<Item = &(Weekday, FillOutcome)> + '_ {
        self.outcomes.iter().filter(|(_, o)| !o.is_success())
    }

    pub fn merge(&mut self, other: WeekFillReport) {
        self.outcomes.extend(other.outcomes);
        self.skipped.extend(other.skipped);
        self.unplaced.extend(other.unplaced);
    }
}

/// Project codes written next to a newly claimed description row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowCodes {
    pub project_code: Option<String>,
    pub activity_code: Option<String>,
    /// Visible text of the billing dropdown
    pub billing_action: Option<String>,
}

/// Contents of one grid row, as read from the page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSnapshot {
    pub row: usize,
    pub description: String,
    pub cells: PerWeekday<String>,
}

/// A weekday filled by more than one description row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateDay {
    pub day: Weekday,
    pub rows: Vec<usize>,
}

fn cell_is_filled(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Weekdays holding a value in more than one row, one entry per weekday.
pub fn find_duplicate_days(rows: &[RowSnapshot]) -> Vec<DuplicateDay> {
    Weekday::ALL
        .into_iter()
        .filter_map(|day| {
            let filled: Vec<usize> = rows
                .iter()
                .filter(|r| cell_is_filled(r.cells.get(day)))
                .map(|r| r.row)
                .collect();
            (filled.len() > 1).then_some(DuplicateDay { day, rows: filled })
        })
        .collect()
}

/// Composes the field insertion engine across the seven days of the grid
pub struct WeekFiller<'a> {
    inserter: &'a FieldInserter,
    mission_descriptions: Vec<String>,
    codes: RowCodes,
}

impl<'a> WeekFiller<'a> {
    pub fn new(inserter: &'a FieldInserter) -> Self {
        Self {
            inserter,
            mission_descriptions: Vec::new(),
            codes: RowCodes::default(),
        }
    }

    /// Descriptions that mark an out-of-office/mission day
    pub fn with_mission_descriptions(mut self, descriptions: &[String]) -> Self {
        self.mission_descriptions = descriptions.iter().map(|d| normalize(d)).collect();
        self
    }

    pub fn with_row_codes(mut self, codes: RowCodes) -> Self {
        self.codes = codes;
        self
    }

    pub fn is_mission(&self, entry: &ScheduleEntry) -> bool {
        let description = normalize(&entry.description);
        self.mission_descriptions.iter().any(|m| *m == description)
    }

    /// Fill regular activity rows: find (or claim) the row for each entry's
    /// description, then reconcile that row's day cell.
    #[instrument(level = "debug", skip_all)]
    pub fn fill_standard_days(
        &self,
        session: &mut FillSession,
        schedule: &WeekSchedule,
    ) -> WeekFillReport {
        let mut report = WeekFillReport::default();
        for (day, entry) in schedule.iter() {
            let Some(entry) = entry else { continue };
            if self.is_mission(entry) || !entry.has_hours() {
                continue;
            }
            if session.is_filled(day) {
                debug!(%day, "Day already filled in this run; skipping");
                report.skipped.push(day);
                continue;
            }
            let Some(row) = self.row_for(&entry.description) else {
                warn!(%day, description = %entry.description, "No grid row available for entry");
                report.unplaced.push(day);
                continue;
            };
            let outcome = self
                .inserter
                .reconcile(&FieldTarget::input(dom::day_cell(row, day), &entry.hours));
            if outcome.is_success() {
                session.mark_filled(day);
            }
            report.outcomes.push((day, outcome));
        }
        report
    }

    /// Fill mission/out-of-office days into their row-independent cells
    #[instrument(level = "debug", skip_all)]
    pub fn fill_mission_days(
        &self,
        session: &mut FillSession,
        schedule: &WeekSchedule,
    ) -> WeekFillReport {
        let mut report = WeekFillReport::default();
        for (day, entry) in schedule.iter() {
            let Some(entry) = entry else { continue };
            if !self.is_mission(entry) || !entry.has_hours() {
                continue;
            }
            if session.is_filled(day) {
                debug!(%day, "Day already filled in this run; skipping mission entry");
                report.skipped.push(day);
                continue;
            }
            let outcome = self
                .inserter
                .reconcile(&FieldTarget::input(dom::mission_cell(day), &entry.hours));
            if outcome.is_success() {
                session.mark_filled(day);
            }
            report.outcomes.push((day, outcome));
        }
        report
    }

    /// Read every description row and its seven day cells
    pub fn snapshot_rows(&self) -> Vec<RowSnapshot> {
        let mut rows = Vec::new();
        for row in 0..dom::MAX_ROWS {
            let description_id = dom::description_cell(row);
            let Some(description) = self.inserter.read(&description_id, FieldKind::Input) else {
                break;
            };
            let cells = PerWeekday::from_fn(|day| {
                self.inserter
                    .read(&dom::day_cell(row, day), FieldKind::Input)
                    .unwrap_or_default()
            });
            rows.push(RowSnapshot {
                row,
                description,
                cells,
            });
        }
        rows
    }

    /// Report weekdays filled by more than one row.
    ///
    /// A duplicate points at a configuration mistake upstream; it is logged
    /// and never blocks the run.
    pub fn detect_duplicate_days(&self) -> Vec<DuplicateDay> {
        let duplicates = find_duplicate_days(&self.snapshot_rows());
        for duplicate in &duplicates {
            warn!(
                day = %duplicate.day,
                rows = ?duplicate.rows,
                "Weekday is filled by more than one row; check the schedule configuration"
            );
        }
        duplicates
    }

    fn row_for(&self, description: &str) -> Option<usize> {
        let wanted = normalize(description);
        let mut first_empty = None;

        for row in 0..dom::MAX_ROWS {
            let id = dom::description_cell(row);
            if self.inserter.waits().find(&Selector::id(&id)).is_none() {
                break;
            }
            let current = self.inserter.read(&id, FieldKind::Input).unwrap_or_default();
            if normalize(&current) == wanted {
                return Some(row);
            }
            if current.trim().is_empty() && first_empty.is_none() {
                first_empty = Some(row);
            }
        }

        let row = first_empty?;
        if !self.inserter.fill_if_empty(&dom::description_cell(row), description).is_success() {
            return None;
        }
        info!(row, %description, "Claimed empty row for description");
        if let Some(code) = &self.codes.project_code {
            self.inserter.fill_if_empty(&dom::project_cell(row), code);
        }
        if let Some(code) = &self.codes.activity_code {
            self.inserter.fill_if_empty(&dom::activity_cell(row), code);
        }
        if let Some(action) = &self.codes.billing_action {
            self.inserter.select(&dom::billing_action_cell(row), action);
        }
        Some(row)
    }
}

fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
