use super::{fast_fill_config, fast_waits, init_tracing, FakeBrowser};
use crate::calendar::Weekday;
use crate::dom;
use crate::fill::{
    FieldInserter, FieldTarget, FillOutcome, FillSession, RowCodes, ScheduleEntry, WeekFiller,
    WeekSchedule, MAX_ATTEMPTS,
};
use std::sync::Arc;

fn inserter(browser: &Arc<FakeBrowser>) -> FieldInserter {
    FieldInserter::new(fast_waits(browser), fast_fill_config())
}

/// A grid with `rows` empty description rows and their day cells
fn grid(rows: usize) -> Arc<FakeBrowser> {
    let browser = FakeBrowser::new();
    {
        let mut state = browser.state();
        for row in 0..rows {
            state.set_field(&dom::description_cell(row), "");
            state.set_field(&dom::project_cell(row), "");
            state.set_field(&dom::activity_cell(row), "");
            for day in Weekday::ALL {
                state.set_field(&dom::day_cell(row, day), "");
            }
        }
        for day in Weekday::ALL {
            state.set_field(&dom::mission_cell(day), "");
        }
    }
    browser
}

fn entry(text: &str) -> Option<ScheduleEntry> {
    Some(text.parse().unwrap())
}

#[test]
fn reconcile_is_idempotent() {
    init_tracing();
    let browser = FakeBrowser::new().with_field("POL_TIME2$0", "8,00");
    let inserter = inserter(&browser);
    let target = FieldTarget::input("POL_TIME2$0", "8");

    assert_eq!(inserter.reconcile(&target), FillOutcome::AlreadyPresent);
    assert_eq!(inserter.reconcile(&target), FillOutcome::AlreadyPresent);
    assert_eq!(browser.total_writes(), 0);
}

#[test]
fn writes_and_verifies_an_empty_field() {
    let browser = FakeBrowser::new().with_field("POL_TIME2$0", "");
    let inserter = inserter(&browser);

    let outcome = inserter.reconcile(&FieldTarget::input("POL_TIME2$0", "7.5"));
    assert_eq!(outcome, FillOutcome::Written { attempts: 1 });
    assert_eq!(browser.value_of("POL_TIME2$0").as_deref(), Some("7.5"));
    assert_eq!(browser.writes_to("POL_TIME2$0"), 1);
}

#[test]
fn never_verifying_field_is_abandoned_after_five_attempts() {
    init_tracing();
    let browser = FakeBrowser::new().with_field("POL_TIME4$1", "");
    browser.state().rejecting.insert("POL_TIME4$1".to_string());
    let inserter = inserter(&browser);

    let outcome = inserter.reconcile(&FieldTarget::input("POL_TIME4$1", "8"));
    assert!(matches!(
        outcome,
        FillOutcome::Abandoned { attempts, .. } if attempts == MAX_ATTEMPTS
    ));
    assert_eq!(browser.writes_to("POL_TIME4$1"), MAX_ATTEMPTS as usize);
}

#[test]
fn stale_reads_count_as_failed_attempts() {
    let browser = FakeBrowser::new().with_field("POL_TIME3$0", "");
    browser.state().stale_reads.insert("POL_TIME3$0".to_string(), 2);
    let inserter = inserter(&browser);

    let outcome = inserter.reconcile(&FieldTarget::input("POL_TIME3$0", "8"));
    assert_eq!(outcome, FillOutcome::Written { attempts: 3 });
    assert_eq!(browser.writes_to("POL_TIME3$0"), 1);
}

#[test]
fn missing_field_is_skipped_without_writes() {
    let browser = FakeBrowser::new();
    let inserter = inserter(&browser);

    assert_eq!(
        inserter.reconcile(&FieldTarget::input("POL_TIME9$0", "8")),
        FillOutcome::NotFound
    );
    assert_eq!(browser.total_writes(), 0);
}

#[test]
fn selects_dropdown_by_visible_text() {
    let browser = FakeBrowser::new().with_field("UC_LOCATION_A2$0", "Domicile");
    let inserter = inserter(&browser);

    assert!(inserter.select("UC_LOCATION_A2$0", "Bureau").is_success());
    assert_eq!(browser.value_of("UC_LOCATION_A2$0").as_deref(), Some("Bureau"));
}

#[test]
fn fill_if_empty_leaves_other_values_alone() {
    let browser = FakeBrowser::new().with_field("POL_DESCR$0", "Réunion");
    let inserter = inserter(&browser);

    assert_eq!(
        inserter.fill_if_empty("POL_DESCR$0", "Développement"),
        FillOutcome::Occupied {
            current: "Réunion".to_string()
        }
    );
    assert_eq!(browser.total_writes(), 0);
}

#[test]
fn fills_standard_and_mission_days() {
    init_tracing();
    let browser = grid(3);
    let inserter = inserter(&browser);
    let filler = WeekFiller::new(&inserter)
        .with_mission_descriptions(&["Mission client".to_string()])
        .with_row_codes(RowCodes {
            project_code: Some("PRJ-042".to_string()),
            activity_code: Some("DEV".to_string()),
            billing_action: None,
        });

    let mut schedule = WeekSchedule::default();
    schedule.monday = entry("Développement,8");
    schedule.wednesday = entry("Développement,7.5");
    schedule.thursday = entry("Formation,4");
    schedule.friday = entry("Mission client,6");
    schedule.saturday = entry("Développement,0");

    let mut session = FillSession::new();
    let mut report = filler.fill_standard_days(&mut session, &schedule);
    report.merge(filler.fill_mission_days(&mut session, &schedule));

    assert_eq!(browser.value_of("POL_DESCR$0").as_deref(), Some("Développement"));
    assert_eq!(browser.value_of("POL_DESCR$1").as_deref(), Some("Formation"));
    assert_eq!(browser.value_of("PROJECT_CODE$0").as_deref(), Some("PRJ-042"));
    assert_eq!(browser.value_of("ACTIVITY_CODE$1").as_deref(), Some("DEV"));
    assert_eq!(browser.value_of("POL_TIME2$0").as_deref(), Some("8"));
    assert_eq!(browser.value_of("POL_TIME4$0").as_deref(), Some("7.5"));
    assert_eq!(browser.value_of("POL_TIME5$1").as_deref(), Some("4"));
    assert_eq!(
        browser.value_of("UC_TIME_LIN_WRK_UC_MISSION6$0").as_deref(),
        Some("6")
    );
    assert_eq!(browser.writes_to("POL_TIME7$0"), 0);

    let filled: Vec<Weekday> = session.filled_days().collect();
    assert_eq!(
        filled,
        vec![
            Weekday::Monday,
            Weekday::Wednesday,
            Weekday::Thursday,
            Weekday::Friday
        ]
    );
    assert_eq!(report.filled().count(), 4);
    assert_eq!(report.failed().count(), 0);
}

#[test]
fn days_already_filled_in_the_session_get_no_writes() {
    let browser = grid(2);
    let inserter = inserter(&browser);
    let filler = WeekFiller::new(&inserter);

    let mut schedule = WeekSchedule::default();
    schedule.tuesday = entry("Développement,8");

    let mut session = FillSession::new();
    session.mark_filled(Weekday::Tuesday);
    let report = filler.fill_standard_days(&mut session, &schedule);

    assert_eq!(report.skipped, vec![Weekday::Tuesday]);
    assert!(report.outcomes.is_empty());
    assert_eq!(browser.total_writes(), 0);
}

#[test]
fn entries_without_a_free_row_are_unplaced() {
    let browser = grid(1);
    browser.state().set_field(&dom::description_cell(0), "Support");
    let inserter = inserter(&browser);
    let filler = WeekFiller::new(&inserter);

    let mut schedule = WeekSchedule::default();
    schedule.monday = entry("Développement,8");
    let mut session = FillSession::new();
    let report = filler.fill_standard_days(&mut session, &schedule);

    assert_eq!(report.unplaced, vec![Weekday::Monday]);
    assert!(session.is_empty());
}

#[test]
fn detects_weekdays_filled_by_two_rows() {
    let browser = grid(3);
    {
        let mut state = browser.state();
        state.set_field(&dom::description_cell(0), "Développement");
        state.set_field(&dom::description_cell(1), "Support");
        state.set_field(&dom::day_cell(0, Weekday::Monday), "8");
        state.set_field(&dom::day_cell(1, Weekday::Monday), "2");
        state.set_field(&dom::day_cell(1, Weekday::Tuesday), "8");
    }
    let inserter = inserter(&browser);
    let duplicates = WeekFiller::new(&inserter).detect_duplicate_days();

    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].day, Weekday::Monday);
    assert_eq!(duplicates[0].rows, vec![0, 1]);
}
