//! Period planning — maps a granularity selector to aligned period
//! boundaries, a label formatter, and a stepper to the next period.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};
use engagement_core::{EngagementError, EngagementResult};
use serde::{Deserialize, Serialize};

use crate::active_users::TimeWindow;

/// Reporting resolution picked by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GranularityMode {
    #[serde(rename = "last7days")]
    Last7Days,
    #[serde(rename = "lastMonth")]
    LastMonth,
    #[serde(rename = "last3Months")]
    Last3Months,
    #[serde(rename = "lastYear")]
    LastYear,
}

impl GranularityMode {
    pub const ALL: [GranularityMode; 4] = [
        GranularityMode::Last7Days,
        GranularityMode::LastMonth,
        GranularityMode::Last3Months,
        GranularityMode::LastYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GranularityMode::Last7Days => "last7days",
            GranularityMode::LastMonth => "lastMonth",
            GranularityMode::Last3Months => "last3Months",
            GranularityMode::LastYear => "lastYear",
        }
    }
}

impl fmt::Display for GranularityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GranularityMode {
    type Err = EngagementError;

    /// Accepts the canonical selectors case-insensitively, ignoring `_`/`-`.
    /// Anything else is rejected rather than mapped to a default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "last7days" => Ok(GranularityMode::Last7Days),
            "lastmonth" => Ok(GranularityMode::LastMonth),
            "last3months" => Ok(GranularityMode::Last3Months),
            "lastyear" => Ok(GranularityMode::LastYear),
            _ => Err(EngagementError::UnknownGranularityMode(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodGranularity {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentRule {
    /// Periods start at local midnight.
    Midnight,
    /// Periods start on the Monday of the ISO week.
    IsoWeekMonday,
    /// Periods start on the first day of the calendar month.
    FirstOfMonth,
}

/// Boundaries and labelling for one granularity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeriodDefinition {
    pub mode: GranularityMode,
    pub granularity: PeriodGranularity,
    /// Number of subsequent periods tracked per cohort row.
    pub period_count: u32,
    pub alignment: AlignmentRule,
    /// `chrono` format string applied to the period start.
    pub label_format: &'static str,
}

/// Period definition for a granularity mode.
pub fn plan(mode: GranularityMode) -> PeriodDefinition {
    let (granularity, period_count) = match mode {
        GranularityMode::Last7Days => (PeriodGranularity::Daily, 7),
        GranularityMode::LastMonth => (PeriodGranularity::Weekly, 4),
        GranularityMode::Last3Months => (PeriodGranularity::Monthly, 3),
        GranularityMode::LastYear => (PeriodGranularity::Monthly, 12),
    };
    let (alignment, label_format) = match granularity {
        PeriodGranularity::Daily => (AlignmentRule::Midnight, "%b %-d, %Y"),
        PeriodGranularity::Weekly => (AlignmentRule::IsoWeekMonday, "Week of %b %-d, %Y"),
        PeriodGranularity::Monthly => (AlignmentRule::FirstOfMonth, "%b %Y"),
    };
    PeriodDefinition {
        mode,
        granularity,
        period_count,
        alignment,
        label_format,
    }
}

/// Parse a raw selector and plan it.
pub fn plan_str(mode: &str) -> EngagementResult<PeriodDefinition> {
    Ok(plan(mode.parse()?))
}

impl PeriodDefinition {
    /// First day of the period containing `date`.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self.alignment {
            AlignmentRule::Midnight => date,
            AlignmentRule::IsoWeekMonday => {
                let back = u64::from(date.weekday().num_days_from_monday());
                date.checked_sub_days(Days::new(back)).unwrap_or(NaiveDate::MIN)
            }
            AlignmentRule::FirstOfMonth => date.with_day(1).unwrap_or(date),
        }
    }

    /// First day of the period after the one containing `date`.
    /// Saturates at `NaiveDate::MAX`.
    pub fn next_period_start(&self, date: NaiveDate) -> NaiveDate {
        let start = self.period_start(date);
        let next = match self.alignment {
            AlignmentRule::Midnight => start.checked_add_days(Days::new(1)),
            AlignmentRule::IsoWeekMonday => start.checked_add_days(Days::new(7)),
            AlignmentRule::FirstOfMonth => start.checked_add_months(Months::new(1)),
        };
        next.unwrap_or(NaiveDate::MAX)
    }

    /// Last calendar day (inclusive) of the period containing `date`.
    pub fn period_end(&self, date: NaiveDate) -> NaiveDate {
        let next = self.next_period_start(date);
        if next == NaiveDate::MAX {
            return next;
        }
        next.pred_opt().unwrap_or(next)
    }

    /// Start of the `n`-th period after the one containing `date`.
    pub fn nth_period_start(&self, date: NaiveDate, n: u32) -> NaiveDate {
        (0..n).fold(self.period_start(date), |start, _| {
            self.next_period_start(start)
        })
    }

    /// Inclusive datetime window covering the period containing `date`.
    pub fn window(&self, date: NaiveDate) -> TimeWindow {
        TimeWindow::days(self.period_start(date), self.period_end(date))
    }

    pub fn format_label(&self, date: NaiveDate) -> String {
        self.period_start(date).format(self.label_format).to_string()
    }
}
