//! Top-segment resolution — the most common country among a user set.

use std::collections::{HashMap, HashSet};

use engagement_core::SessionRecord;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_COUNTRY: &str = "Unknown";
pub const GLOBE: &str = "\u{1F310}";

/// ISO 3166-1 alpha-2 codes with display names.
const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("AE", "United Arab Emirates"),
    ("AR", "Argentina"),
    ("AT", "Austria"),
    ("AU", "Australia"),
    ("BD", "Bangladesh"),
    ("BE", "Belgium"),
    ("BR", "Brazil"),
    ("CA", "Canada"),
    ("CH", "Switzerland"),
    ("CL", "Chile"),
    ("CN", "China"),
    ("CO", "Colombia"),
    ("CZ", "Czechia"),
    ("DE", "Germany"),
    ("DK", "Denmark"),
    ("EG", "Egypt"),
    ("ES", "Spain"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("GR", "Greece"),
    ("HK", "Hong Kong"),
    ("ID", "Indonesia"),
    ("IE", "Ireland"),
    ("IL", "Israel"),
    ("IN", "India"),
    ("IT", "Italy"),
    ("JP", "Japan"),
    ("KE", "Kenya"),
    ("KR", "South Korea"),
    ("MX", "Mexico"),
    ("MY", "Malaysia"),
    ("NG", "Nigeria"),
    ("NL", "Netherlands"),
    ("NO", "Norway"),
    ("NZ", "New Zealand"),
    ("PH", "Philippines"),
    ("PK", "Pakistan"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("RU", "Russia"),
    ("SA", "Saudi Arabia"),
    ("SE", "Sweden"),
    ("SG", "Singapore"),
    ("TH", "Thailand"),
    ("TR", "Turkey"),
    ("TW", "Taiwan"),
    ("UA", "Ukraine"),
    ("US", "United States"),
    ("VN", "Vietnam"),
    ("ZA", "South Africa"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopSegment {
    /// Raw attribute value as it appears in the sessions (e.g. `"US"`).
    pub attribute_value: String,
    pub display_label: String,
    pub flag: String,
    /// Distinct users of the set in this segment.
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryDisplay {
    pub name: String,
    pub flag: String,
}

/// Display name and flag for a country code. Unmapped values keep the raw
/// code and get the globe marker.
pub fn country_display(code: &str) -> CountryDisplay {
    let normalized = normalize_country(code);
    match COUNTRY_NAMES.iter().find(|(c, _)| *c == normalized) {
        Some((c, name)) => CountryDisplay {
            name: (*name).to_string(),
            flag: flag_emoji(c).unwrap_or_else(|| GLOBE.to_string()),
        },
        None => CountryDisplay {
            name: code.trim().to_string(),
            flag: GLOBE.to_string(),
        },
    }
}

fn normalize_country(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.len() == 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        trimmed.to_ascii_uppercase()
    } else {
        trimmed.to_string()
    }
}

/// Regional-indicator pair for a two-letter code.
fn flag_emoji(code: &str) -> Option<String> {
    if code.len() != 2 {
        return None;
    }
    code.chars()
        .map(|c| {
            let offset = u32::from(c.to_ascii_uppercase()).checked_sub(u32::from('A'))?;
            if offset >= 26 {
                return None;
            }
            char::from_u32(0x1F1E6 + offset)
        })
        .collect()
}

/// Country with the most distinct users from `user_ids`, labelling missing
/// countries `Unknown`.
pub fn top_country(user_ids: &HashSet<&str>, sessions: &[SessionRecord]) -> Option<TopSegment> {
    top_country_labeled(user_ids, sessions, UNKNOWN_COUNTRY)
}

/// Like [`top_country`] with a custom label for sessions without a country.
/// Ties go to the country seen first in session order. `None` when no
/// session belongs to the set.
pub fn top_country_labeled(
    user_ids: &HashSet<&str>,
    sessions: &[SessionRecord],
    unknown_label: &str,
) -> Option<TopSegment> {
    if user_ids.is_empty() {
        return None;
    }

    let mut order: Vec<(String, HashSet<&str>)> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();

    for session in sessions {
        let Some(user) = session.user_id() else {
            continue;
        };
        if !user_ids.contains(user) {
            continue;
        }
        let key = session
            .country
            .as_deref()
            .map(normalize_country)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| unknown_label.to_string());
        let slot = match position.get(&key) {
            Some(&slot) => slot,
            None => {
                order.push((key.clone(), HashSet::new()));
                position.insert(key, order.len() - 1);
                order.len() - 1
            }
        };
        order[slot].1.insert(user);
    }

    let mut best: Option<&(String, HashSet<&str>)> = None;
    for entry in &order {
        if best.map_or(true, |b| entry.1.len() > b.1.len()) {
            best = Some(entry);
        }
    }

    best.map(|(country, users)| {
        let display = if country == unknown_label {
            CountryDisplay {
                name: country.clone(),
                flag: GLOBE.to_string(),
            }
        } else {
            country_display(country)
        };
        TopSegment {
            attribute_value: country.clone(),
            display_label: display.name,
            flag: display.flag,
            count: users.len(),
        }
    })
}
