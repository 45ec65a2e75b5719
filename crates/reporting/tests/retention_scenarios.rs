//! End-to-end checks of the dashboard payload built from raw session JSON.

use std::collections::HashSet;

use engagement_core::types::parse_start_time;
use engagement_core::{CohortBasis, SessionRecord};
use engagement_reporting::{assemble, distinct_users, plan, AssembleRequest, GranularityMode};
use serde_json::Value;

const SESSIONS: &str = r#"[
    {"userId": "A", "startTime": "2024-01-01T10:00", "country": "US", "pagesViewed": 3},
    {"userId": "B", "startTime": "2024-01-01T11:00", "country": "GB", "isBounce": true},
    {"userId": "A", "startTime": "2024-01-08T10:00", "country": "US"},
    {"startTime": "2024-01-08T12:00", "country": "FR"}
]"#;

fn sessions() -> Vec<SessionRecord> {
    serde_json::from_str(SESSIONS).expect("fixture parses")
}

#[test]
fn daily_cohort_retention_after_one_week() {
    let payload = assemble(&sessions(), &AssembleRequest::new(GranularityMode::Last7Days)).unwrap();
    let json = serde_json::to_value(&payload).unwrap();

    let first = &json["cohortTable"][0];
    assert_eq!(first["periodLabel"], "Jan 1, 2024");
    assert_eq!(first["initialUsers"], 2);
    assert_eq!(first["retentionByOffset"][0]["returningUsers"], 2);
    assert_eq!(first["retentionByOffset"][0]["retentionPercent"], "100.0");
    assert_eq!(first["retentionByOffset"][7]["offset"], 7);
    assert_eq!(first["retentionByOffset"][7]["returningUsers"], 1);
    assert_eq!(first["retentionByOffset"][7]["retentionPercent"], "50.0");

    let later = &json["cohortTable"][1];
    assert_eq!(later["retentionByOffset"][1]["returningUsers"], Value::Null);
    assert_eq!(later["retentionByOffset"][1]["retentionPercent"], Value::Null);
}

#[test]
fn distinct_users_windows() {
    let sessions = sessions();
    let jan1 = distinct_users(
        &sessions,
        parse_start_time("2024-01-01T00:00").unwrap(),
        parse_start_time("2024-01-01T23:59").unwrap(),
    );
    assert_eq!(jan1, HashSet::from(["A", "B"]));

    let gap = distinct_users(
        &sessions,
        parse_start_time("2024-01-02T00:00").unwrap(),
        parse_start_time("2024-01-07T23:59").unwrap(),
    );
    assert!(gap.is_empty());
}

#[test]
fn payload_shape_for_presentation_layer() {
    let payload = assemble(&sessions(), &AssembleRequest::new(GranularityMode::LastMonth)).unwrap();
    let json = serde_json::to_value(&payload).unwrap();

    assert_eq!(json["mode"], "lastMonth");
    let point = &json["timeSeries"][0];
    for key in ["periodLabel", "DAU", "WAU", "MAU"] {
        assert!(point.get(key).is_some(), "missing {key}");
    }
    let card = &json["summaryCards"][0];
    for key in ["title", "value", "country", "flag"] {
        assert!(card.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["engagement"]["totalSessions"], 4);
    assert_eq!(json["engagement"]["uniqueUsers"], 2);
    assert_eq!(json["engagement"]["bounceRatePercent"], 25.0);

    // Jan 1 and Jan 8 2024 are both Mondays: two weekly cohorts.
    assert_eq!(json["cohortTable"][0]["periodLabel"], "Week of Jan 1, 2024");
    assert_eq!(json["cohortTable"][0]["retentionByOffset"][1]["retentionPercent"], "50.0");
    assert_eq!(json["cohortTable"].as_array().unwrap().len(), 2);
}

#[test]
fn empty_input_never_yields_empty_arrays() {
    for mode in GranularityMode::ALL {
        let payload = assemble(&[], &AssembleRequest::new(mode)).unwrap();
        assert_eq!(payload.time_series.len(), 1);
        assert_eq!(payload.time_series[0].period_label, "No Data");
        assert_eq!(payload.cohort_table.len(), 1);
        assert_eq!(payload.cohort_table[0].initial_user_count, 0);
        let expected_cells = plan(mode).period_count as usize + 1;
        assert_eq!(payload.cohort_table[0].retention_by_offset.len(), expected_cells);
    }
}

#[test]
fn unknown_mode_is_rejected() {
    let err = "last14days".parse::<GranularityMode>().unwrap_err();
    assert!(err.to_string().contains("last14days"));
}

#[test]
fn first_seen_basis_through_payload() {
    let request = AssembleRequest::new(GranularityMode::Last7Days).with_basis(CohortBasis::FirstSeen);
    let payload = assemble(&sessions(), &request).unwrap();
    assert_eq!(payload.cohort_table.len(), 1);
    assert_eq!(payload.cohort_table[0].period_label, "Jan 1, 2024");
}

#[test]
fn offset_timestamps_stay_on_their_local_day() {
    let raw = r#"[
        {"userId": "A", "startTime": "2024-01-01T20:00:00-05:00", "durationSeconds": null, "isBounce": null}
    ]"#;
    let sessions: Vec<SessionRecord> = serde_json::from_str(raw).unwrap();
    let payload = assemble(&sessions, &AssembleRequest::new(GranularityMode::Last7Days)).unwrap();
    let json = serde_json::to_value(&payload).unwrap();

    assert_eq!(json["timeSeries"][0]["periodLabel"], "2024-01-01");
    assert_eq!(json["cohortTable"][0]["periodLabel"], "Jan 1, 2024");
    assert_eq!(json["cohortTable"][0]["initialUsers"], 1);
}
