//! Element identifiers of the timesheet application.
//!
//! These are the whole contract with the target pages and must stay
//! bit-exact. Templates take a 0-based row index and the 1-based weekday
//! column (Sunday = 1).

use crate::calendar::Weekday;

// Login page
pub const LOGIN_USERNAME: &str = "userid";
pub const LOGIN_PASSWORD: &str = "pwd";
pub const LOGIN_SUBMIT: &str = "Submit";

/// Frame holding the application pages once logged in
pub const MAIN_FRAME: &str = "main_target_win0";

// Period selection
pub const DATE_FIELD: &str = "EX_TIME_ADD_VW_PERIOD_END_DT";
pub const ADD_BUTTON: &str = "PTS_CFG_CL_WRK_PTS_ADD_BTN";

// Modal dialogs (conflict and post-save messages)
pub const MODAL_MESSAGE: &str = "ptModContent_0";
pub const MODAL_OK_BUTTON: &str = "#ICOK";
pub const ALERT_MESSAGE: &str = "alertmsg";

// Schedule grid
/// Rows the grid shows at most
pub const MAX_ROWS: usize = 20;

pub fn description_cell(row: usize) -> String {
    format!("POL_DESCR${row}")
}

pub fn day_cell(row: usize, day: Weekday) -> String {
    format!("POL_TIME{}${row}", day.index())
}

pub fn project_cell(row: usize) -> String {
    format!("PROJECT_CODE${row}")
}

pub fn activity_cell(row: usize) -> String {
    format!("ACTIVITY_CODE${row}")
}

pub fn billing_action_cell(row: usize) -> String {
    format!("BILLING_ACTION${row}")
}

/// Row-independent cell holding out-of-office/mission hours
pub fn mission_cell(day: Weekday) -> String {
    format!("UC_TIME_LIN_WRK_UC_MISSION{}$0", day.index())
}

// Additional information modal
pub const ADDITIONAL_INFO_LINK: &str = "UC_EX_WRK_UC_TI_FRA_LINK";
pub const ADDITIONAL_INFO_FRAME: &str = "ptModFrame_0";
pub const ADDITIONAL_INFO_SAVE: &str = "#ICSave";

/// Supplementary line-item cell: `item_row` selects the line in the modal
pub fn additional_info_cell(item_row: usize, day: Weekday) -> String {
    format!("UC_TIME_LIN_WRK_UC_DAILYREST{}${item_row}", day.index())
}

/// Work location cell; morning is line 0, afternoon line 1
pub fn location_cell(half_day_row: usize, day: Weekday) -> String {
    format!("UC_LOCATION_A{}${half_day_row}", day.index())
}

// Saving
pub const SAVE_DRAFT_BUTTON: &str = "EX_ICLIENT_WRK_SAVE_PB";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_use_grid_columns() {
        assert_eq!(day_cell(2, Weekday::Monday), "POL_TIME2$2");
        assert_eq!(description_cell(0), "POL_DESCR$0");
        assert_eq!(mission_cell(Weekday::Saturday), "UC_TIME_LIN_WRK_UC_MISSION7$0");
        assert_eq!(
            additional_info_cell(3, Weekday::Sunday),
            "UC_TIME_LIN_WRK_UC_DAILYREST1$3"
        );
        assert_eq!(location_cell(1, Weekday::Friday), "UC_LOCATION_A6$1");
    }
}
