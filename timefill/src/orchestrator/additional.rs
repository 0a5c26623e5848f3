//! The five supplementary line-items of the additional information modal.

use crate::calendar::{PerWeekday, Weekday};
use crate::config::{AdditionalInformation, LocationSection};
use crate::dom;
use crate::fill::{FieldInserter, FillOutcome};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplementaryItem {
    RestPeriod,
    WorkTimeRange,
    HalfDayWorked,
    LunchBreak,
    Location,
}

impl SupplementaryItem {
    pub const ALL: [SupplementaryItem; 5] = [
        SupplementaryItem::RestPeriod,
        SupplementaryItem::WorkTimeRange,
        SupplementaryItem::HalfDayWorked,
        SupplementaryItem::LunchBreak,
        SupplementaryItem::Location,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SupplementaryItem::RestPeriod => "rest_period",
            SupplementaryItem::WorkTimeRange => "work_time_range",
            SupplementaryItem::HalfDayWorked => "half_day_worked",
            SupplementaryItem::LunchBreak => "lunch_break",
            SupplementaryItem::Location => "location",
        }
    }
}

/// Result for one cell of the modal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplementaryOutcome {
    pub item: SupplementaryItem,
    pub day: Weekday,
    pub field: String,
    pub outcome: FillOutcome,
}

fn configured(values: &PerWeekday<Option<String>>, day: Weekday) -> Option<&str> {
    values
        .get(day)
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `(cell id, visible text)` pairs to select, item by item in modal order
pub fn planned_cells(
    info: &AdditionalInformation,
    location: &LocationSection,
) -> Vec<(SupplementaryItem, Weekday, String, String)> {
    let per_line = [
        (SupplementaryItem::RestPeriod, &info.rest_period),
        (SupplementaryItem::WorkTimeRange, &info.work_time_range),
        (SupplementaryItem::HalfDayWorked, &info.half_day_worked),
        (SupplementaryItem::LunchBreak, &info.lunch_break),
    ];

    let mut cells = Vec::new();
    for (line, (item, values)) in per_line.into_iter().enumerate() {
        for day in Weekday::ALL {
            if let Some(value) = configured(values, day) {
                cells.push((item, day, dom::additional_info_cell(line, day), value.to_string()));
            }
        }
    }
    for (half, values) in [&location.morning, &location.afternoon].into_iter().enumerate() {
        for day in Weekday::ALL {
            if let Some(value) = configured(values, day) {
                cells.push((
                    SupplementaryItem::Location,
                    day,
                    dom::location_cell(half, day),
                    value.to_string(),
                ));
            }
        }
    }
    cells
}

/// Select every configured value in the modal
#[instrument(level = "debug", skip_all)]
pub fn fill_additional_information(
    inserter: &FieldInserter,
    info: &AdditionalInformation,
    location: &LocationSection,
) -> Vec<SupplementaryOutcome> {
    planned_cells(info, location)
        .into_iter()
        .map(|(item, day, field, value)| {
            let outcome = inserter.select(&field, &value);
            debug!(item = item.name(), %day, %field, ?outcome, "Supplementary item applied");
            SupplementaryOutcome {
                item,
                day,
                field,
                outcome,
            }
        })
        .collect()
}
