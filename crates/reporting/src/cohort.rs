//! Cohort analysis — retention tables tracking how many of a period's users
//! come back in each of the following periods.

use std::collections::HashSet;

use chrono::NaiveDate;
use engagement_core::{CohortBasis, SessionRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::active_users::{session_span, ActivityIndex};
use crate::periods::PeriodDefinition;

pub const PLACEHOLDER_LABEL: &str = "No Data";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortRow {
    pub period_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    #[serde(rename = "initialUsers")]
    pub initial_user_count: usize,
    pub retention_by_offset: Vec<RetentionCell>,
}

/// Retention for one offset. `None` means the period is not observable yet,
/// which is distinct from zero returning users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionCell {
    pub offset: u32,
    pub returning_users: Option<usize>,
    pub retention_percent: Option<String>,
}

impl RetentionCell {
    fn observed(offset: u32, returning: usize, initial: usize) -> Self {
        Self {
            offset,
            returning_users: Some(returning),
            retention_percent: Some(format_percent(returning, initial)),
        }
    }

    fn unobserved(offset: u32) -> Self {
        Self {
            offset,
            returning_users: None,
            retention_percent: None,
        }
    }
}

impl CohortRow {
    /// Row emitted when there are no sessions at all.
    pub fn placeholder(label: impl Into<String>, period_count: u32) -> Self {
        Self {
            period_label: label.into(),
            period_start: None,
            initial_user_count: 0,
            retention_by_offset: (0..=period_count).map(RetentionCell::unobserved).collect(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.initial_user_count == 0
    }
}

/// `returning / initial * 100` with one fractional digit, halves rounded up.
/// Callers guarantee `initial > 0`.
pub fn format_percent(returning: usize, initial: usize) -> String {
    let (returning, initial) = (returning as u64, initial.max(1) as u64);
    let tenths = (returning * 2000 + initial) / (2 * initial);
    format!("{}.{}", tenths / 10, tenths % 10)
}

/// Builds retention tables for one period definition.
pub struct CohortAnalyzer {
    definition: PeriodDefinition,
    basis: CohortBasis,
    placeholder_label: String,
}

impl CohortAnalyzer {
    pub fn new(definition: PeriodDefinition) -> Self {
        Self {
            definition,
            basis: CohortBasis::default(),
            placeholder_label: PLACEHOLDER_LABEL.to_string(),
        }
    }

    pub fn with_basis(mut self, basis: CohortBasis) -> Self {
        self.basis = basis;
        self
    }

    pub fn with_placeholder_label(mut self, label: impl Into<String>) -> Self {
        self.placeholder_label = label.into();
        self
    }

    pub fn definition(&self) -> &PeriodDefinition {
        &self.definition
    }

    /// One row per period with at least one member, in chronological order.
    /// Each row carries offsets `0..=period_count`.
    pub fn analyze(&self, sessions: &[SessionRecord]) -> Vec<CohortRow> {
        let def = &self.definition;
        let Some((first, last)) = session_span(sessions) else {
            return vec![CohortRow::placeholder(
                self.placeholder_label.clone(),
                def.period_count,
            )];
        };

        let index = ActivityIndex::build(sessions, def);
        let last_date = last.date();
        let mut rows = Vec::new();
        let mut start = def.period_start(first.date());

        while start <= last_date {
            let members = self.members(&index, start);
            if members.is_empty() {
                debug!(period = %start, "no cohort members, skipping period");
            } else {
                rows.push(self.row(&index, start, &members, last_date));
            }

            let next = def.next_period_start(start);
            if next <= start {
                break;
            }
            start = next;
        }

        if rows.is_empty() {
            // Only anonymous sessions: nothing to retain.
            rows.push(CohortRow::placeholder(
                self.placeholder_label.clone(),
                def.period_count,
            ));
        }
        rows
    }

    fn members<'a>(&self, index: &ActivityIndex<'a>, start: NaiveDate) -> HashSet<&'a str> {
        let Some(active) = index.users(start) else {
            return HashSet::new();
        };
        match self.basis {
            CohortBasis::Active => active.clone(),
            CohortBasis::FirstSeen => active
                .iter()
                .copied()
                .filter(|user| {
                    index
                        .first_seen(user)
                        .is_some_and(|seen| self.definition.period_start(seen.date()) == start)
                })
                .collect(),
        }
    }

    fn row(
        &self,
        index: &ActivityIndex<'_>,
        start: NaiveDate,
        members: &HashSet<&str>,
        last_date: NaiveDate,
    ) -> CohortRow {
        let def = &self.definition;
        let initial = members.len();
        let mut cells = Vec::with_capacity(def.period_count as usize + 1);
        cells.push(RetentionCell::observed(0, initial, initial));

        let mut sub_start = start;
        for offset in 1..=def.period_count {
            sub_start = def.next_period_start(sub_start);
            if sub_start > last_date {
                cells.push(RetentionCell::unobserved(offset));
                continue;
            }
            let returning = index.users(sub_start).map_or(0, |active| {
                members.iter().filter(|user| active.contains(*user)).count()
            });
            cells.push(RetentionCell::observed(offset, returning, initial));
        }

        debug!(
            period = %start,
            initial_users = initial,
            "cohort computed"
        );

        CohortRow {
            period_label: def.format_label(start),
            period_start: Some(start),
            initial_user_count: initial,
            retention_by_offset: cells,
        }
    }
}

/// Retention table for `sessions` under `definition`.
pub fn build(
    sessions: &[SessionRecord],
    definition: &PeriodDefinition,
    basis: CohortBasis,
) -> Vec<CohortRow> {
    CohortAnalyzer::new(*definition)
        .with_basis(basis)
        .analyze(sessions)
}
