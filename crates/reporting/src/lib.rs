//! Engagement and retention reporting — active-user windows, period
//! planning, cohort retention tables, top segments, and dashboard assembly.
//!
//! Every entry point is a pure function of the sessions passed in; nothing
//! is cached between calls.

pub mod active_users;
pub mod cohort;
pub mod dashboard;
pub mod engagement;
pub mod periods;
pub mod segments;

pub use active_users::{compute_snapshot, distinct_users, ActiveUserSnapshot, TimeWindow};
pub use cohort::{CohortAnalyzer, CohortRow, RetentionCell};
pub use dashboard::{assemble, AssembleRequest, DashboardPayload, EngagementDashboard, SummaryCard};
pub use engagement::{summarize, EngagementSummary};
pub use periods::{plan, GranularityMode, PeriodDefinition, PeriodGranularity};
pub use segments::{top_country, TopSegment};
