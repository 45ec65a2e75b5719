use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{EngagementError, EngagementResult};

/// One recorded visit, as exported by the session store.
///
/// `start_time` is the site's local wall-clock time. Every day/week/month
/// boundary the engine computes is aligned on this clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "deserialize_start_time")]
    pub start_time: NaiveDateTime,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration_seconds: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_bounce: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pages_viewed: u32,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub wallet_info: Option<WalletInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    #[serde(rename = "type")]
    pub wallet_type: String,
    pub address: String,
}

impl SessionRecord {
    /// Minimal record for a user active at `start_time`.
    pub fn new(user_id: impl Into<String>, start_time: NaiveDateTime) -> Self {
        Self {
            user_id: Some(user_id.into()),
            start_time,
            duration_seconds: 0.0,
            is_bounce: false,
            pages_viewed: 1,
            country: None,
            wallet_info: None,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// The identifying user, if any. Blank ids count as missing.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    pub fn date(&self) -> NaiveDate {
        self.start_time.date()
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> EngagementResult<Self> {
        if start > end {
            return Err(EngagementError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        let day = at.date();
        day >= self.start && day <= self.end
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a session timestamp. RFC 3339 values keep the wall-clock time of
/// their own offset; naive values are taken as-is.
pub fn parse_start_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Explicit `null` reads as the field's default, like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_start_time<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_start_time(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid startTime: {raw}")))
}
