//! Engagement dashboard — assembles summary cards, the DAU/WAU/MAU series,
//! the cohort table and the engagement summary into one payload.

use std::borrow::Cow;
use std::collections::HashSet;
use std::time::Instant;

use engagement_core::config::ReportingConfig;
use engagement_core::{CohortBasis, DateRange, EngagementError, EngagementResult, SessionRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::active_users::{
    active_dates, count_with_fallback, ActiveUserSnapshot, ActivityIndex, CountSource,
    SnapshotUsers,
};
use crate::cohort::{CohortAnalyzer, CohortRow};
use crate::engagement::{summarize, EngagementSummary};
use crate::periods::{plan, GranularityMode, PeriodDefinition};
use crate::segments::{top_country_labeled, GLOBE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardWindow {
    Daily,
    Weekly,
    Monthly,
}

impl CardWindow {
    pub fn title(&self) -> &'static str {
        match self {
            CardWindow::Daily => "Daily Active Users",
            CardWindow::Weekly => "Weekly Active Users",
            CardWindow::Monthly => "Monthly Active Users",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCard {
    pub title: String,
    pub window: CardWindow,
    pub value: usize,
    /// `all_time_fallback` when `value` is not a window count.
    pub source: CountSource,
    pub country: String,
    pub flag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPayload {
    pub mode: GranularityMode,
    pub summary_cards: Vec<SummaryCard>,
    pub time_series: Vec<ActiveUserSnapshot>,
    pub cohort_table: Vec<CohortRow>,
    pub engagement: EngagementSummary,
}

/// Explicit inputs for one dashboard computation.
#[derive(Debug, Clone)]
pub struct AssembleRequest {
    pub mode: GranularityMode,
    pub range: Option<DateRange>,
    pub cohort_basis: CohortBasis,
    /// All-time distinct users from the session store, used only for
    /// summary cards whose window is empty.
    pub all_time_users: Option<Vec<String>>,
    pub unknown_country_label: String,
    pub no_data_label: String,
}

impl AssembleRequest {
    pub fn new(mode: GranularityMode) -> Self {
        let defaults = ReportingConfig::default();
        Self {
            mode,
            range: None,
            cohort_basis: defaults.cohort_basis,
            all_time_users: None,
            unknown_country_label: defaults.unknown_country_label,
            no_data_label: defaults.no_data_label,
        }
    }

    /// Request seeded from configuration. Fails on an unknown `default_mode`.
    pub fn from_config(config: &ReportingConfig) -> EngagementResult<Self> {
        let mode = config.default_mode.parse()?;
        Ok(Self {
            mode,
            range: None,
            cohort_basis: config.cohort_basis,
            all_time_users: None,
            unknown_country_label: config.unknown_country_label.clone(),
            no_data_label: config.no_data_label.clone(),
        })
    }

    pub fn with_mode(mut self, mode: GranularityMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_basis(mut self, basis: CohortBasis) -> Self {
        self.cohort_basis = basis;
        self
    }

    pub fn with_all_time_users(mut self, users: Vec<String>) -> Self {
        self.all_time_users = Some(users);
        self
    }

    pub fn definition(&self) -> PeriodDefinition {
        plan(self.mode)
    }
}

/// Stateless assembler; every call recomputes from the sessions it is given.
pub struct EngagementDashboard {
    request: AssembleRequest,
}

impl EngagementDashboard {
    pub fn new(request: AssembleRequest) -> EngagementResult<Self> {
        if let Some(range) = request.range {
            if range.start > range.end {
                return Err(EngagementError::InvalidDateRange {
                    start: range.start,
                    end: range.end,
                });
            }
        }
        Ok(Self { request })
    }

    pub fn request(&self) -> &AssembleRequest {
        &self.request
    }

    fn scoped<'a>(&self, sessions: &'a [SessionRecord]) -> Cow<'a, [SessionRecord]> {
        match self.request.range {
            None => Cow::Borrowed(sessions),
            Some(range) => Cow::Owned(
                sessions
                    .iter()
                    .filter(|s| range.contains(s.start_time))
                    .cloned()
                    .collect(),
            ),
        }
    }

    /// DAU/WAU/MAU cards as of the latest active date, each with the top
    /// country of its window.
    pub fn summary_cards(&self, sessions: &[SessionRecord]) -> Vec<SummaryCard> {
        let sessions = self.scoped(sessions);
        self.cards_for(&sessions)
    }

    fn cards_for(&self, sessions: &[SessionRecord]) -> Vec<SummaryCard> {
        let users = match sessions.iter().map(SessionRecord::date).max() {
            Some(as_of) => SnapshotUsers::collect(sessions, as_of),
            None => SnapshotUsers::default(),
        };
        let all_time = self.request.all_time_users.as_deref();

        [
            (CardWindow::Daily, &users.daily),
            (CardWindow::Weekly, &users.weekly),
            (CardWindow::Monthly, &users.monthly),
        ]
        .into_iter()
        .map(|(window, set)| {
            let count = count_with_fallback(set.len(), all_time);
            if count.source == CountSource::AllTimeFallback {
                metrics::counter!("engagement.fallback_cards").increment(1);
            }
            self.card(window, count.count, count.source, set, sessions)
        })
        .collect()
    }

    fn card(
        &self,
        window: CardWindow,
        value: usize,
        source: CountSource,
        users: &HashSet<&str>,
        sessions: &[SessionRecord],
    ) -> SummaryCard {
        let label = &self.request.unknown_country_label;
        let (country, flag) = match top_country_labeled(users, sessions, label) {
            Some(top) => (top.display_label, top.flag),
            None => (label.clone(), GLOBE.to_string()),
        };
        SummaryCard {
            title: window.title().to_string(),
            window,
            value,
            source,
            country,
            flag,
        }
    }

    /// One snapshot per active calendar date, ascending. Never empty.
    pub fn time_series(&self, sessions: &[SessionRecord]) -> Vec<ActiveUserSnapshot> {
        let sessions = self.scoped(sessions);
        self.series_for(&sessions)
    }

    fn series_for(&self, sessions: &[SessionRecord]) -> Vec<ActiveUserSnapshot> {
        let dates = active_dates(sessions);
        if dates.is_empty() {
            return vec![ActiveUserSnapshot::empty(self.request.no_data_label.clone())];
        }
        let index = ActivityIndex::daily(sessions);
        dates
            .into_iter()
            .map(|date| {
                SnapshotUsers::from_daily_index(&index, date)
                    .to_snapshot(date.format("%Y-%m-%d").to_string())
            })
            .collect()
    }

    pub fn cohort_table(&self, sessions: &[SessionRecord]) -> Vec<CohortRow> {
        let sessions = self.scoped(sessions);
        self.cohorts_for(&sessions)
    }

    fn cohorts_for(&self, sessions: &[SessionRecord]) -> Vec<CohortRow> {
        CohortAnalyzer::new(self.request.definition())
            .with_basis(self.request.cohort_basis)
            .with_placeholder_label(self.request.no_data_label.clone())
            .analyze(sessions)
    }

    pub fn assemble(&self, sessions: &[SessionRecord]) -> DashboardPayload {
        let started = Instant::now();
        let sessions = self.scoped(sessions);
        debug!(sessions = sessions.len(), mode = %self.request.mode, "assembling dashboard");

        let payload = DashboardPayload {
            mode: self.request.mode,
            summary_cards: self.cards_for(&sessions),
            time_series: self.series_for(&sessions),
            cohort_table: self.cohorts_for(&sessions),
            engagement: summarize(&sessions),
        };

        metrics::counter!("engagement.payloads_assembled").increment(1);
        metrics::counter!("engagement.sessions_processed").increment(sessions.len() as u64);
        metrics::histogram!("engagement.cohort_rows").record(payload.cohort_table.len() as f64);
        info!(
            mode = %self.request.mode,
            sessions = sessions.len(),
            series_points = payload.time_series.len(),
            cohort_rows = payload.cohort_table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dashboard assembled"
        );
        payload
    }
}

/// Full payload for `sessions` under `request`.
pub fn assemble(sessions: &[SessionRecord], request: &AssembleRequest) -> EngagementResult<DashboardPayload> {
    Ok(EngagementDashboard::new(request.clone())?.assemble(sessions))
}
