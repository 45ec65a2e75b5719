//! Session engagement summary — bounce rate, durations, depth, and wallet
//! activity across the whole session set.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use engagement_core::SessionRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementSummary {
    pub total_sessions: usize,
    /// Sessions carrying a user id.
    pub identified_sessions: usize,
    pub unique_users: usize,
    pub bounce_rate_percent: f64,
    pub avg_duration_seconds: f64,
    pub avg_pages_per_session: f64,
    /// Distinct users that connected any wallet.
    pub wallet_users: usize,
    pub wallet_types: Vec<WalletTypeCount>,
    /// Mean over active days of distinct wallet addresses seen that day.
    pub avg_daily_active_wallets: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTypeCount {
    pub wallet_type: String,
    pub users: usize,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        round2(total / count as f64)
    }
}

pub fn summarize(sessions: &[SessionRecord]) -> EngagementSummary {
    let total = sessions.len();
    let mut users = HashSet::new();
    let mut wallet_users = HashSet::new();
    let mut by_type: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut wallets_by_day: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();
    let mut identified = 0usize;
    let mut bounces = 0usize;
    let mut duration = 0.0f64;
    let mut pages = 0u64;

    for session in sessions {
        if session.is_bounce {
            bounces += 1;
        }
        duration += session.duration_seconds.max(0.0);
        pages += u64::from(session.pages_viewed);

        if let Some(wallet) = &session.wallet_info {
            let address = wallet.address.trim();
            if !address.is_empty() {
                wallets_by_day
                    .entry(session.date())
                    .or_default()
                    .insert(address);
            }
        }

        let Some(user) = session.user_id() else {
            continue;
        };
        identified += 1;
        users.insert(user);
        if let Some(wallet) = &session.wallet_info {
            wallet_users.insert(user);
            by_type
                .entry(wallet.wallet_type.trim())
                .or_default()
                .insert(user);
        }
    }

    let mut wallet_types: Vec<WalletTypeCount> = by_type
        .into_iter()
        .map(|(wallet_type, users)| WalletTypeCount {
            wallet_type: if wallet_type.is_empty() {
                "unknown".to_string()
            } else {
                wallet_type.to_string()
            },
            users: users.len(),
        })
        .collect();
    wallet_types.sort_by(|a, b| b.users.cmp(&a.users).then_with(|| a.wallet_type.cmp(&b.wallet_type)));

    let daily_wallet_total: usize = wallets_by_day.values().map(HashSet::len).sum();

    EngagementSummary {
        total_sessions: total,
        identified_sessions: identified,
        unique_users: users.len(),
        bounce_rate_percent: mean(bounces as f64 * 100.0, total),
        avg_duration_seconds: mean(duration, total),
        avg_pages_per_session: mean(pages as f64, total),
        wallet_users: wallet_users.len(),
        wallet_types,
        avg_daily_active_wallets: mean(daily_wallet_total as f64, wallets_by_day.len()),
    }
}
