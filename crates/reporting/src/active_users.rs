//! Active-user aggregation — distinct users over inclusive date windows,
//! the primitive behind DAU/WAU/MAU and cohort membership.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use engagement_core::SessionRecord;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::periods::PeriodDefinition;

pub const DAILY_WINDOW_DAYS: u64 = 1;
pub const WEEKLY_WINDOW_DAYS: u64 = 7;
pub const MONTHLY_WINDOW_DAYS: u64 = 30;

/// Inclusive `[start, end]` datetime window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Midnight of `first` through the last instant of `last`.
    pub fn days(first: NaiveDate, last: NaiveDate) -> Self {
        Self {
            start: first.and_time(NaiveTime::MIN),
            end: last.and_time(end_of_day()),
        }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self::days(date, date)
    }

    /// `days` calendar days ending with `as_of`, inclusive.
    pub fn trailing_days(as_of: NaiveDate, days: u64) -> Self {
        let back = days.saturating_sub(1);
        let first = as_of
            .checked_sub_days(Days::new(back))
            .unwrap_or(NaiveDate::MIN);
        Self::days(first, as_of)
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        at >= self.start && at <= self.end
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

/// Users with at least one session starting in `[start, end]`.
/// Sessions without a user id are skipped.
pub fn distinct_users(
    sessions: &[SessionRecord],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> HashSet<&str> {
    distinct_users_in(sessions, &TimeWindow::new(start, end))
}

pub fn distinct_users_in<'a>(sessions: &'a [SessionRecord], window: &TimeWindow) -> HashSet<&'a str> {
    sessions
        .iter()
        .filter(|s| window.contains(s.start_time))
        .filter_map(SessionRecord::user_id)
        .collect()
}

/// Earliest and latest session start, or `None` for an empty collection.
pub fn session_span(sessions: &[SessionRecord]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let first = sessions.iter().map(|s| s.start_time).min()?;
    let last = sessions.iter().map(|s| s.start_time).max()?;
    Some((first, last))
}

/// Distinct calendar dates present in the sessions, ascending.
pub fn active_dates(sessions: &[SessionRecord]) -> Vec<NaiveDate> {
    sessions
        .iter()
        .map(SessionRecord::date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Identified users bucketed by the start of the period they were active
/// in. Built in one pass so per-period lookups never rescan the sessions.
#[derive(Debug, Clone, Default)]
pub struct ActivityIndex<'a> {
    buckets: HashMap<NaiveDate, HashSet<&'a str>>,
    first_seen: HashMap<&'a str, NaiveDateTime>,
}

impl<'a> ActivityIndex<'a> {
    /// Buckets keyed by `definition`'s period start, with first-seen times.
    pub fn build(sessions: &'a [SessionRecord], definition: &PeriodDefinition) -> Self {
        Self::bucketed(sessions, |date| definition.period_start(date), true)
    }

    /// One bucket per calendar day. First-seen times are not tracked.
    pub fn daily(sessions: &'a [SessionRecord]) -> Self {
        Self::bucketed(sessions, |date| date, false)
    }

    fn bucketed(
        sessions: &'a [SessionRecord],
        period_key: impl Fn(NaiveDate) -> NaiveDate,
        track_first_seen: bool,
    ) -> Self {
        let mut index = ActivityIndex::default();
        for session in sessions {
            let Some(user) = session.user_id() else {
                continue;
            };
            let key = period_key(session.date());
            index.buckets.entry(key).or_default().insert(user);
            if !track_first_seen {
                continue;
            }
            index
                .first_seen
                .entry(user)
                .and_modify(|seen| {
                    if session.start_time < *seen {
                        *seen = session.start_time;
                    }
                })
                .or_insert(session.start_time);
        }
        index
    }

    /// Users active in the period starting at `period_start`.
    pub fn users(&self, period_start: NaiveDate) -> Option<&HashSet<&'a str>> {
        self.buckets.get(&period_start)
    }

    /// Time of the user's earliest session.
    pub fn first_seen(&self, user: &str) -> Option<NaiveDateTime> {
        self.first_seen.get(user).copied()
    }

    /// Union of the buckets for `count` consecutive periods ending at
    /// `last_start`, stepping back with `step_back`.
    fn union_back(
        &self,
        last_start: NaiveDate,
        count: u64,
        step_back: impl Fn(NaiveDate) -> Option<NaiveDate>,
    ) -> HashSet<&'a str> {
        let mut users = HashSet::new();
        let mut cursor = Some(last_start);
        for _ in 0..count {
            let Some(start) = cursor else { break };
            if let Some(bucket) = self.buckets.get(&start) {
                users.extend(bucket.iter().copied());
            }
            cursor = step_back(start);
        }
        users
    }
}

/// Distinct active users for the daily, weekly and monthly windows ending
/// at one date. Counts are independent, never cumulative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUserSnapshot {
    #[serde(rename = "periodLabel")]
    pub period_label: String,
    #[serde(rename = "DAU")]
    pub daily_active_users: usize,
    #[serde(rename = "WAU")]
    pub weekly_active_users: usize,
    #[serde(rename = "MAU")]
    pub monthly_active_users: usize,
}

impl ActiveUserSnapshot {
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            period_label: label.into(),
            daily_active_users: 0,
            weekly_active_users: 0,
            monthly_active_users: 0,
        }
    }
}

/// The three trailing user sets behind a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotUsers<'a> {
    pub daily: HashSet<&'a str>,
    pub weekly: HashSet<&'a str>,
    pub monthly: HashSet<&'a str>,
}

impl<'a> SnapshotUsers<'a> {
    /// Single pass over the sessions filling all three windows.
    pub fn collect(sessions: &'a [SessionRecord], as_of: NaiveDate) -> Self {
        let daily_window = TimeWindow::day(as_of);
        let weekly_window = TimeWindow::trailing_days(as_of, WEEKLY_WINDOW_DAYS);
        let monthly_window = TimeWindow::trailing_days(as_of, MONTHLY_WINDOW_DAYS);

        let mut users = SnapshotUsers::default();
        for session in sessions {
            if !monthly_window.contains(session.start_time) {
                continue;
            }
            let Some(user) = session.user_id() else {
                continue;
            };
            users.monthly.insert(user);
            if weekly_window.contains(session.start_time) {
                users.weekly.insert(user);
            }
            if daily_window.contains(session.start_time) {
                users.daily.insert(user);
            }
        }
        users
    }

    /// Same sets, assembled from a daily index instead of the raw sessions.
    pub fn from_daily_index(index: &ActivityIndex<'a>, as_of: NaiveDate) -> Self {
        let back = |d: NaiveDate| d.pred_opt();
        Self {
            daily: index.union_back(as_of, DAILY_WINDOW_DAYS, back),
            weekly: index.union_back(as_of, WEEKLY_WINDOW_DAYS, back),
            monthly: index.union_back(as_of, MONTHLY_WINDOW_DAYS, back),
        }
    }

    pub fn to_snapshot(&self, label: impl Into<String>) -> ActiveUserSnapshot {
        ActiveUserSnapshot {
            period_label: label.into(),
            daily_active_users: self.daily.len(),
            weekly_active_users: self.weekly.len(),
            monthly_active_users: self.monthly.len(),
        }
    }
}

/// DAU/WAU/MAU for the windows ending at `as_of`. Empty input yields zeros.
pub fn compute_snapshot(sessions: &[SessionRecord], as_of: NaiveDate) -> ActiveUserSnapshot {
    SnapshotUsers::collect(sessions, as_of).to_snapshot(as_of.format("%Y-%m-%d").to_string())
}

/// Where a reported active-user figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountSource {
    Window,
    AllTimeFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUserCount {
    pub count: usize,
    pub source: CountSource,
}

/// Report a window count, substituting the distinct size of an externally
/// supplied all-time user list only when the window is empty. Summary cards
/// only; cohort computation never goes through here.
pub fn count_with_fallback(window_count: usize, all_time_users: Option<&[String]>) -> ActiveUserCount {
    if window_count > 0 {
        return ActiveUserCount {
            count: window_count,
            source: CountSource::Window,
        };
    }
    match all_time_users {
        Some(users) if !users.is_empty() => {
            let count = users
                .iter()
                .map(|u| u.trim())
                .filter(|u| !u.is_empty())
                .collect::<HashSet<_>>()
                .len();
            warn!(count, "window empty, reporting all-time user total");
            ActiveUserCount {
                count,
                source: CountSource::AllTimeFallback,
            }
        }
        _ => ActiveUserCount {
            count: 0,
            source: CountSource::Window,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periods::{plan, GranularityMode};

    fn at(raw: &str) -> NaiveDateTime {
        engagement_core::types::parse_start_time(raw).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn scenario() -> Vec<SessionRecord> {
        vec![
            SessionRecord::new("A", at("2024-01-01T10:00")),
            SessionRecord::new("B", at("2024-01-01T11:00")),
            SessionRecord::new("A", at("2024-01-08T10:00")),
        ]
    }

    #[test]
    fn test_distinct_users_inclusive_window() {
        let sessions = scenario();
        let day_one = distinct_users(&sessions, at("2024-01-01T00:00"), at("2024-01-01T23:59"));
        assert_eq!(day_one, HashSet::from(["A", "B"]));

        let gap = distinct_users(&sessions, at("2024-01-02T00:00"), at("2024-01-07T23:59"));
        assert!(gap.is_empty());

        let edge = distinct_users(&sessions, at("2024-01-08T10:00"), at("2024-01-08T10:00"));
        assert_eq!(edge, HashSet::from(["A"]));
    }

    #[test]
    fn test_distinct_users_is_pure() {
        let sessions = scenario();
        let first = distinct_users(&sessions, at("2024-01-01T00:00"), at("2024-01-31T00:00"));
        let second = distinct_users(&sessions, at("2024-01-01T00:00"), at("2024-01-31T00:00"));
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_missing_user_ids_are_excluded() {
        let mut anonymous = SessionRecord::new("", at("2024-01-01T09:00"));
        anonymous.user_id = None;
        let sessions = vec![anonymous, SessionRecord::new("C", at("2024-01-01T09:30"))];
        let users = distinct_users_in(&sessions, &TimeWindow::day(date(2024, 1, 1)));
        assert_eq!(users, HashSet::from(["C"]));
    }

    #[test]
    fn test_snapshot_windows() {
        let sessions = vec![
            SessionRecord::new("today", at("2024-01-30T08:00")),
            SessionRecord::new("week", at("2024-01-24T00:00")),
            SessionRecord::new("month", at("2024-01-01T00:00")),
            SessionRecord::new("too-old", at("2023-12-31T23:59")),
            SessionRecord::new("future", at("2024-01-31T00:00")),
        ];
        let snapshot = compute_snapshot(&sessions, date(2024, 1, 30));
        assert_eq!(snapshot.period_label, "2024-01-30");
        assert_eq!(snapshot.daily_active_users, 1);
        assert_eq!(snapshot.weekly_active_users, 2);
        assert_eq!(snapshot.monthly_active_users, 3);
    }

    #[test]
    fn test_snapshot_of_empty_input_is_zero() {
        let snapshot = compute_snapshot(&[], date(2024, 1, 1));
        assert_eq!(snapshot.daily_active_users, 0);
        assert_eq!(snapshot.weekly_active_users, 0);
        assert_eq!(snapshot.monthly_active_users, 0);
    }

    #[test]
    fn test_daily_index_matches_direct_scan() {
        let sessions = vec![
            SessionRecord::new("a", at("2024-03-01T08:00")),
            SessionRecord::new("b", at("2024-03-05T08:00")),
            SessionRecord::new("c", at("2024-03-09T08:00")),
            SessionRecord::new("a", at("2024-03-10T08:00")),
            SessionRecord::new("d", at("2024-02-10T08:00")),
        ];
        let index = ActivityIndex::daily(&sessions);
        for as_of in active_dates(&sessions) {
            let direct = SnapshotUsers::collect(&sessions, as_of);
            let indexed = SnapshotUsers::from_daily_index(&index, as_of);
            assert_eq!(direct.daily, indexed.daily, "daily {as_of}");
            assert_eq!(direct.weekly, indexed.weekly, "weekly {as_of}");
            assert_eq!(direct.monthly, indexed.monthly, "monthly {as_of}");
        }
    }

    #[test]
    fn test_daily_index_buckets_by_date_only() {
        let sessions = vec![
            SessionRecord::new("a", at("2024-03-01T08:00")),
            SessionRecord::new("b", at("2024-03-01T23:59")),
            SessionRecord::new("a", at("2024-03-02T00:00")),
        ];
        let index = ActivityIndex::daily(&sessions);
        assert_eq!(index.users(date(2024, 3, 1)), Some(&HashSet::from(["a", "b"])));
        assert_eq!(index.users(date(2024, 3, 2)), Some(&HashSet::from(["a"])));
        assert_eq!(index.first_seen("a"), None);

        let daily_plan = ActivityIndex::build(&sessions, &plan(GranularityMode::Last7Days));
        assert_eq!(daily_plan.users(date(2024, 3, 1)), index.users(date(2024, 3, 1)));
    }

    #[test]
    fn test_activity_index_first_seen() {
        let sessions = vec![
            SessionRecord::new("a", at("2024-03-10T08:00")),
            SessionRecord::new("a", at("2024-03-01T08:00")),
        ];
        let index = ActivityIndex::build(&sessions, &plan(GranularityMode::LastMonth));
        assert_eq!(index.first_seen("a"), Some(at("2024-03-01T08:00")));
        assert_eq!(index.first_seen("z"), None);
        assert!(index.users(date(2024, 2, 26)).unwrap().contains("a"));
    }

    #[test]
    fn test_active_dates_sorted_unique() {
        let sessions = vec![
            SessionRecord::new("a", at("2024-01-03T08:00")),
            SessionRecord::new("b", at("2024-01-01T08:00")),
            SessionRecord::new("c", at("2024-01-03T20:00")),
        ];
        assert_eq!(active_dates(&sessions), vec![date(2024, 1, 1), date(2024, 1, 3)]);
        assert_eq!(
            session_span(&sessions),
            Some((at("2024-01-01T08:00"), at("2024-01-03T20:00")))
        );
        assert_eq!(session_span(&[]), None);
    }

    #[test]
    fn test_fallback_only_when_window_empty() {
        let all_time = vec!["x".to_string(), "y".to_string(), "x".to_string()];
        let direct = count_with_fallback(4, Some(&all_time));
        assert_eq!(direct, ActiveUserCount { count: 4, source: CountSource::Window });

        let fallback = count_with_fallback(0, Some(&all_time));
        assert_eq!(fallback.count, 2);
        assert_eq!(fallback.source, CountSource::AllTimeFallback);

        let none = count_with_fallback(0, None);
        assert_eq!(none, ActiveUserCount { count: 0, source: CountSource::Window });
    }
}
