//! Fixed calendar mapping used by the timesheet grid.
//!
//! The grid numbers its day columns from Sunday (1) to Saturday (7) and the
//! configuration names days in French.

use crate::AutomationError;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Date format of the timesheet's date field
pub const DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "dimanche")]
    Sunday,
    #[serde(rename = "lundi")]
    Monday,
    #[serde(rename = "mardi")]
    Tuesday,
    #[serde(rename = "mercredi")]
    Wednesday,
    #[serde(rename = "jeudi")]
    Thursday,
    #[serde(rename = "vendredi")]
    Friday,
    #[serde(rename = "samedi")]
    Saturday,
}

/// Column index and display name of one weekday
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayDescriptor {
    pub weekday_index: u8,
    pub weekday_name: &'static str,
}

impl Weekday {
    /// Grid order, Sunday first
    pub const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    /// Column index in the grid, 1 (Sunday) through 7 (Saturday)
    pub fn index(self) -> u8 {
        match self {
            Weekday::Sunday => 1,
            Weekday::Monday => 2,
            Weekday::Tuesday => 3,
            Weekday::Wednesday => 4,
            Weekday::Thursday => 5,
            Weekday::Friday => 6,
            Weekday::Saturday => 7,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Sunday => "dimanche",
            Weekday::Monday => "lundi",
            Weekday::Tuesday => "mardi",
            Weekday::Wednesday => "mercredi",
            Weekday::Thursday => "jeudi",
            Weekday::Friday => "vendredi",
            Weekday::Saturday => "samedi",
        }
    }

    pub fn descriptor(self) -> DayDescriptor {
        DayDescriptor {
            weekday_index: self.index(),
            weekday_name: self.name(),
        }
    }

    pub fn from_index(index: u8) -> Option<Weekday> {
        Weekday::ALL.get(usize::from(index).checked_sub(1)?).copied()
    }

    pub fn from_name(name: &str) -> Option<Weekday> {
        let name = name.trim().to_lowercase();
        Weekday::ALL.into_iter().find(|d| d.name() == name)
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per weekday, with all seven days always present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerWeekday<T> {
    #[serde(rename = "dimanche")]
    pub sunday: T,
    #[serde(rename = "lundi")]
    pub monday: T,
    #[serde(rename = "mardi")]
    pub tuesday: T,
    #[serde(rename = "mercredi")]
    pub wednesday: T,
    #[serde(rename = "jeudi")]
    pub thursday: T,
    #[serde(rename = "vendredi")]
    pub friday: T,
    #[serde(rename = "samedi")]
    pub saturday: T,
}

impl<T> PerWeekday<T> {
    pub fn from_fn(mut f: impl FnMut(Weekday) -> T) -> Self {
        Self {
            sunday: f(Weekday::Sunday),
            monday: f(Weekday::Monday),
            tuesday: f(Weekday::Tuesday),
            wednesday: f(Weekday::Wednesday),
            thursday: f(Weekday::Thursday),
            friday: f(Weekday::Friday),
            saturday: f(Weekday::Saturday),
        }
    }

    pub fn get(&self, day: Weekday) -> &T {
        match day {
            Weekday::Sunday => &self.sunday,
            Weekday::Monday => &self.monday,
            Weekday::Tuesday => &self.tuesday,
            Weekday::Wednesday => &self.wednesday,
            Weekday::Thursday => &self.thursday,
            Weekday::Friday => &self.friday,
            Weekday::Saturday => &self.saturday,
        }
    }

    pub fn get_mut(&mut self, day: Weekday) -> &mut T {
        match day {
            Weekday::Sunday => &mut self.sunday,
            Weekday::Monday => &mut self.monday,
            Weekday::Tuesday => &mut self.tuesday,
            Weekday::Wednesday => &mut self.wednesday,
            Weekday::Thursday => &mut self.thursday,
            Weekday::Friday => &mut self.friday,
            Weekday::Saturday => &mut self.saturday,
        }
    }

    /// Days in grid order with their values
    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &T)> {
        Weekday::ALL.into_iter().map(move |d| (d, self.get(d)))
    }
}

/// The Saturday on or after `date` (`dd/mm/yyyy`).
///
/// A date that already falls on a Saturday is returned unchanged.
pub fn next_saturday(date: &str) -> Result<String, AutomationError> {
    let parsed = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|e| {
        AutomationError::InvalidArgument(format!(
            "Invalid date {date:?} (expected dd/mm/yyyy): {e}"
        ))
    })?;
    let from_sunday = i64::from(parsed.weekday().num_days_from_sunday());
    let days_ahead = (6 - from_sunday).rem_euclid(7);
    Ok((parsed + Duration::days(days_ahead))
        .format(DATE_FORMAT)
        .to_string())
}

/// Whether a configured date means "pick the next Saturday automatically"
pub fn is_auto_date(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None => true,
        Some(v) => v.is_empty() || v.eq_ignore_ascii_case("none"),
    }
}
