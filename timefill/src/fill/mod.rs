//! Field insertion engine: make cells hold target values on a page that
//! keeps re-rendering under us.

pub mod field;
pub mod retry;
pub mod week;

pub use field::{
    values_match, FieldInserter, FieldKind, FieldTarget, FillConfig, FillOutcome, MAX_ATTEMPTS,
};
pub use retry::{Attempt, RetryOutcome, RetryPolicy};
pub use week::{
    find_duplicate_days, DuplicateDay, FillSession, RowCodes, RowSnapshot, ScheduleEntry,
    WeekFillReport, WeekFiller, WeekSchedule,
};
