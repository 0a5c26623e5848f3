//! Classification of the message dialogs the application raises.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

static CONFLICT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(existe\s+d[ée]j[àa]|already\s+exists|d[ée]j[àa]\s+une\s+feuille)")
        .expect("static conflict pattern")
});

static DATE_WARNING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(date\s+(de\s+fin\s+)?(est\s+)?(dans\s+le\s+futur|future|ant[ée]rieure|pass[ée]e)|period\s+end\s+date|date\s+is\s+in\s+the\s+(future|past))")
        .expect("static date pattern")
});

static HOLIDAY_WEEK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(jours?\s+f[ée]ri[ée]s?|public\s+holiday|holiday\s+week)")
        .expect("static holiday pattern")
});

static LEAVE_DISCREPANCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(cong[ée]s?|absences?|leave\s+(request|balance|discrepancy)|time\s+off)")
        .expect("static leave pattern")
});

/// Non-fatal dialogs raised after saving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SaveWarning {
    /// The period end date looks wrong for the current week
    DateWarning,
    /// The week contains a public holiday
    HolidayWeek,
    /// Declared hours disagree with registered leave
    LeaveDiscrepancy,
    Unrecognized,
}

impl fmt::Display for SaveWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SaveWarning::DateWarning => "date warning",
            SaveWarning::HolidayWeek => "holiday week",
            SaveWarning::LeaveDiscrepancy => "leave discrepancy",
            SaveWarning::Unrecognized => "unrecognized dialog",
        };
        f.write_str(name)
    }
}

/// Whether a dialog says a timesheet already exists for the period
pub fn is_date_conflict(text: &str) -> bool {
    CONFLICT.is_match(text)
}

/// Holiday and leave checks run before the date check: their messages
/// usually mention the date too.
pub fn classify_dialog(text: &str) -> SaveWarning {
    if HOLIDAY_WEEK.is_match(text) {
        SaveWarning::HolidayWeek
    } else if LEAVE_DISCREPANCY.is_match(text) {
        SaveWarning::LeaveDiscrepancy
    } else if DATE_WARNING.is_match(text) {
        SaveWarning::DateWarning
    } else {
        SaveWarning::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_conflicts() {
        assert!(is_date_conflict(
            "Une feuille de temps existe déjà pour cette période."
        ));
        assert!(is_date_conflict("A timesheet already exists for 06/07/2024"));
        assert!(!is_date_conflict("Sauvegarde effectuée"));
    }

    #[test]
    fn classifies_save_dialogs() {
        assert_eq!(
            classify_dialog("La date de fin est dans le futur (13/07/2024)."),
            SaveWarning::DateWarning
        );
        assert_eq!(
            classify_dialog("Cette semaine contient un jour férié le 14/07/2024."),
            SaveWarning::HolidayWeek
        );
        assert_eq!(
            classify_dialog("Les heures saisies ne correspondent pas aux congés posés."),
            SaveWarning::LeaveDiscrepancy
        );
        assert_eq!(classify_dialog("Erreur inattendue 42"), SaveWarning::Unrecognized);
    }
}
