// Dashboard read model: zone breakdowns, current day, personal records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{IntradaySample, ZoneName, ZoneSummary};

/// Totals for one zone over a period, with its share of all zone minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneBreakdown {
    pub zone: ZoneName,
    pub minutes: u32,
    pub calories: f64,
    /// Rounded to a whole percent; 0 when no minutes were recorded at all.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayValue {
    pub date: NaiveDate,
    pub value: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentDay {
    pub resting: Option<u32>,
    pub high: Option<IntradaySample>,
    pub low: Option<IntradaySample>,
    pub zones: Vec<ZoneBreakdown>,
    pub heart_rates: Vec<IntradaySample>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalRecords {
    pub top10_heart_rates: Vec<DayValue>,
    pub bottom10_heart_rates: Vec<DayValue>,
    pub max_resting: Option<DayValue>,
    pub min_resting: Option<DayValue>,
    /// Per zone, the day with the most minutes in it.
    pub most_minutes_by_zone: Vec<ZoneSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub backfiller_running: bool,
    pub backfiller_last_run: Option<DateTime<Utc>>,
    pub current_day: CurrentDay,
    pub last7_days_zones: Vec<ZoneBreakdown>,
    pub last30_days_zones: Vec<ZoneBreakdown>,
    pub personal_records: PersonalRecords,
}

/// Sums minutes and calories per zone and converts minutes to percentages.
/// Always returns all four zones in `ZoneName::ALL` order.
pub fn zone_breakdown(zones: &[ZoneSummary]) -> Vec<ZoneBreakdown> {
    let total: u64 = zones.iter().map(|z| z.minutes as u64).sum();
    ZoneName::ALL
        .into_iter()
        .map(|zone| {
            let (minutes, calories) = zones
                .iter()
                .filter(|z| z.zone == zone)
                .fold((0u32, 0.0f64), |(m, c), z| (m + z.minutes, c + z.calories));
            let percent = if total == 0 {
                0.0
            } else {
                (minutes as f64 / total as f64 * 100.0).round()
            };
            ZoneBreakdown {
                zone,
                minutes,
                calories,
                percent,
            }
        })
        .collect()
}
