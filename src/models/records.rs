// Persisted heart-rate records and the validated per-day payload the writer consumes.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Heart-rate intensity bucket reported per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoneName {
    OutOfRange,
    FatBurn,
    Cardio,
    Peak,
}

impl ZoneName {
    pub const ALL: [ZoneName; 4] = [
        ZoneName::OutOfRange,
        ZoneName::FatBurn,
        ZoneName::Cardio,
        ZoneName::Peak,
    ];

    /// Vendor spelling; also the value stored in `heart_zone.zone`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneName::OutOfRange => "Out of Range",
            ZoneName::FatBurn => "Fat Burn",
            ZoneName::Cardio => "Cardio",
            ZoneName::Peak => "Peak",
        }
    }

    /// Case-insensitive match against the vendor spelling.
    pub fn from_vendor(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|z| z.as_str().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub account_id: String,
    pub date: NaiveDate,
    pub resting_heart_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSummary {
    pub account_id: String,
    pub date: NaiveDate,
    pub zone: ZoneName,
    pub minutes: u32,
    pub calories: f64,
    pub min_bpm: u32,
    pub max_bpm: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntradaySample {
    pub account_id: String,
    pub timestamp: NaiveDateTime,
    pub value: u32,
}

/// One day as returned by the fetcher: parsed, but not yet deduplicated or filtered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayPayload {
    pub overviews: Vec<DayOverview>,
    pub samples: Vec<HeartSample>,
}

impl DayPayload {
    /// No overview rows and no intraday samples. Zero values still count as data.
    pub fn is_empty(&self) -> bool {
        self.overviews.is_empty() && self.samples.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayOverview {
    pub date: NaiveDate,
    /// 0 = not yet known.
    pub resting_heart_rate: u32,
    pub zones: Vec<ZoneEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneEntry {
    pub zone: ZoneName,
    pub minutes: u32,
    pub calories: f64,
    pub min_bpm: u32,
    pub max_bpm: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartSample {
    pub time: NaiveTime,
    pub value: u32,
}
