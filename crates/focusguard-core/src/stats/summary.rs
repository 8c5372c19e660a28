//! Dashboard figures derived from the ledger.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ledger::{parse_date_key, StatsLedger};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub today_minutes: u64,
    /// Today and the six days before it.
    pub week_minutes: u64,
    pub total_minutes: u64,
    pub focus_days: usize,
    pub best_day_minutes: u64,
    /// Mean over the days of the past week that had any focus.
    pub avg_daily_minutes: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl StatsSummary {
    /// Summarize `ledger`, counting `live_minutes` of the running session
    /// towards `today`.
    pub fn compute(ledger: &StatsLedger, live_minutes: u64, today: NaiveDate) -> Self {
        let mut days: BTreeMap<NaiveDate, u64> = ledger
            .daily
            .iter()
            .filter_map(|(k, m)| Some((parse_date_key(k)?, *m)))
            .filter(|(_, m)| *m > 0)
            .collect();
        if live_minutes > 0 {
            *days.entry(today).or_insert(0) += live_minutes;
        }

        let minutes_on = |d: NaiveDate| days.get(&d).copied().unwrap_or(0);
        let week: Vec<u64> = (0..7)
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .map(minutes_on)
            .collect();
        let week_minutes: u64 = week.iter().sum();
        let week_days = week.iter().filter(|m| **m > 0).count() as u64;

        Self {
            today_minutes: minutes_on(today),
            week_minutes,
            total_minutes: ledger.total_minutes.saturating_add(live_minutes),
            focus_days: days.len(),
            best_day_minutes: days.values().copied().max().unwrap_or(0),
            avg_daily_minutes: if week_days > 0 {
                (week_minutes + week_days / 2) / week_days
            } else {
                0
            },
            current_streak: current_streak(&days, today),
            longest_streak: longest_streak(&days),
        }
    }
}

/// Consecutive focus days ending today, or ending yesterday when today has
/// nothing yet.
fn current_streak(days: &BTreeMap<NaiveDate, u64>, today: NaiveDate) -> u32 {
    let mut cursor = if days.contains_key(&today) {
        Some(today)
    } else {
        today.pred_opt()
    };
    let mut streak = 0;
    while let Some(day) = cursor.filter(|d| days.contains_key(d)) {
        streak += 1;
        cursor = day.pred_opt();
    }
    streak
}

fn longest_streak(days: &BTreeMap<NaiveDate, u64>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for &day in days.keys() {
        run = match prev {
            Some(p) if p.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(day);
    }
    longest
}
